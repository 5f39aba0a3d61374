//! Single-flight token refresh.
//!
//! The first caller to ask for a refresh while the coordinator is idle
//! starts a cycle; everyone who asks before that cycle settles is queued
//! behind it. A cycle makes exactly one call to the [`TokenRefresher`] and
//! hands its outcome, success or failure, to every queued caller in the
//! order they arrived.
//!
//! ```text
//!            refresh()                     settle
//!   Idle ───────────────► Refreshing ─────────────────► Idle
//!                          │   ▲
//!                refresh() │   │ queued
//!                          └───┘
//! ```
//!
//! The idle/refreshing flag and the queue sit behind one mutex, so checking
//! the phase and joining the queue is a single step even on a multi-threaded
//! runtime. The mutex is never held across an `.await`.
//!
//! The exchange itself runs on its own task. Dropping a caller's future
//! only drops that caller's place in line; the cycle carries on for the
//! others.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use strongbox::TokenStore;
use tokio::sync::oneshot;

use crate::{RefreshFailure, SessionListener};

/// A successful answer from the refresh endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    /// `None` when the server keeps the current refresh token
    pub refresh_token: Option<String>,
    /// Seconds until the new access token expires
    pub expires_in: Option<i64>,
}

/// Performs the network exchange of a refresh token for new tokens
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshFailure>;
}

type Outcome = Result<String, RefreshFailure>;
type Waiter = oneshot::Sender<Outcome>;

enum RefreshState {
    Idle,
    Refreshing { waiters: VecDeque<Waiter> },
}

/// Observable phase of a [`RefreshCoordinator`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
}

/// Keeps one access/refresh token pair valid for many concurrent callers.
///
/// Create one per process and share it behind an [`Arc`].
pub struct RefreshCoordinator {
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    listener: Arc<dyn SessionListener>,
    state: Mutex<RefreshState>,
    cycles: AtomicU64,
}

impl RefreshCoordinator {
    pub const fn new(
        store: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        listener: Arc<dyn SessionListener>,
    ) -> RefreshCoordinator {
        RefreshCoordinator {
            store,
            refresher,
            listener,
            state: Mutex::new(RefreshState::Idle),
            cycles: AtomicU64::new(0),
        }
    }

    /// Obtains a new access token, sharing the in-flight refresh if there is
    /// one.
    ///
    /// On failure the stored credential has already been cleared and the
    /// listener told that the session expired, once per cycle. A cycle whose
    /// exchange panics counts as failed with [`RefreshFailure::Abandoned`].
    pub async fn refresh(self: &Arc<Self>) -> Result<String, RefreshFailure> {
        let (tx, rx) = oneshot::channel();
        let starts_cycle = {
            let mut state = self.lock_state();
            match &mut *state {
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing {
                        waiters: VecDeque::from([tx]),
                    };
                    true
                }
                RefreshState::Refreshing { waiters } => {
                    waiters.push_back(tx);
                    tracing::debug!(position = waiters.len(), "refresh in flight, queued");
                    false
                }
            }
        };

        if starts_cycle {
            let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(cycle, "starting token refresh");
            let this = Arc::clone(self);
            tokio::spawn(async move { this.run_cycle().await });
        }

        rx.await.unwrap_or(Err(RefreshFailure::Abandoned))
    }

    pub fn phase(&self) -> RefreshPhase {
        match &*self.lock_state() {
            RefreshState::Idle => RefreshPhase::Idle,
            RefreshState::Refreshing { .. } => RefreshPhase::Refreshing,
        }
    }

    /// Number of callers waiting on the current cycle
    pub fn waiting(&self) -> usize {
        match &*self.lock_state() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Number of refresh cycles started so far
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Tears the session down outside of a refresh cycle: clears the stored
    /// credential and tells the listener.
    pub fn expire_session(&self) {
        self.clear_store();
        self.listener.on_session_expired();
    }

    async fn run_cycle(self: Arc<Self>) {
        let mut guard = SettleGuard {
            coordinator: &self,
            settled: false,
        };
        let outcome = self.exchange().await;
        guard.settle(outcome);
    }

    async fn exchange(&self) -> Outcome {
        let current = self.store.get();
        let Some(refresh_token) = current.refresh_token() else {
            tracing::debug!("no refresh token stored");
            return Err(RefreshFailure::NoRefreshToken);
        };

        let tokens = self.refresher.refresh(refresh_token).await?;
        if tokens.access_token.is_empty() {
            return Err(RefreshFailure::Malformed("access_token is empty".to_string()));
        }

        let next = current
            .refreshed(
                tokens.access_token.clone(),
                tokens.refresh_token,
                tokens.expires_in,
                Utc::now(),
            )
            .map_err(|err| RefreshFailure::Malformed(err.to_string()))?;
        self.store
            .set(next)
            .map_err(|err| RefreshFailure::Store(err.to_string()))?;
        Ok(tokens.access_token)
    }

    fn finish(&self, outcome: Outcome) {
        match &outcome {
            Ok(_) => tracing::debug!("token refresh succeeded"),
            Err(failure) => {
                tracing::warn!(%failure, "token refresh failed, ending session");
                self.clear_store();
            }
        }

        let waiters = self.drain();
        tracing::debug!(waiters = waiters.len(), "settling refresh cycle");
        for waiter in waiters {
            // the receiver is gone if that caller was dropped while waiting
            let _ = waiter.send(outcome.clone());
        }

        if outcome.is_err() {
            self.listener.on_session_expired();
        }
    }

    fn abandon(&self) {
        tracing::error!("token refresh stopped before settling");
        self.finish(Err(RefreshFailure::Abandoned));
    }

    // Returning to idle and taking the queue happen under one lock, so a
    // caller either made it into this cycle or starts the next one.
    fn drain(&self) -> VecDeque<Waiter> {
        let mut state = self.lock_state();
        match std::mem::replace(&mut *state, RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => VecDeque::new(),
        }
    }

    fn clear_store(&self) {
        if let Err(err) = self.store.clear() {
            tracing::error!(%err, "could not clear the stored credential");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Puts the coordinator back to idle even if the exchange panics.
struct SettleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl SettleGuard<'_> {
    fn settle(&mut self, outcome: Outcome) {
        self.settled = true;
        self.coordinator.finish(outcome);
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.abandon();
        }
    }
}
