use tokio::sync::broadcast;

/// Outward notifications from the session layer.
///
/// Implemented by whatever owns navigation: a teardown should send the user
/// back to login, an eviction lets the login screen carry on.
pub trait SessionListener: Send + Sync {
    /// The session could not be renewed and the stored credential is gone.
    fn on_session_expired(&self) {}

    /// Another device's session was logged out to make room for this one.
    fn on_device_evicted(&self, _session_id: &str) {}
}

/// A listener that ignores everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;

impl SessionListener for NoopListener {}

/// Events published by [`EventListener`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Expired,
    DeviceEvicted(String),
}

/// Re-publishes listener callbacks on a broadcast channel so several parts
/// of an application can react to them.
#[derive(Clone, Debug)]
pub struct EventListener {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventListener {
    pub fn new(capacity: usize) -> EventListener {
        let (tx, _) = broadcast::channel(capacity);
        EventListener { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        if self.tx.send(event).is_err() {
            tracing::trace!("session event dropped, nobody is subscribed");
        }
    }
}

impl Default for EventListener {
    fn default() -> Self {
        EventListener::new(16)
    }
}

impl SessionListener for EventListener {
    fn on_session_expired(&self) {
        self.publish(SessionEvent::Expired);
    }

    fn on_device_evicted(&self, session_id: &str) {
        self.publish(SessionEvent::DeviceEvicted(session_id.to_string()));
    }
}
