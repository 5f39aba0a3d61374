//! Device admission.
//!
//! An account may only hold a fixed number of active device sessions. A
//! login past that limit is refused with the list of active sessions; the
//! user picks one to log out, and the original login is submitted once
//! more. A second refusal is reported as an ordinary login error so a stale
//! server-side count cannot trap the user in a loop.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strongbox::{Credential, TokenStore};

use crate::{EvictionFailure, LoginFailure, SessionListener};

/// What the user typed into the login form
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> LoginCredentials {
        LoginCredentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// One device session as reported in a device-limit refusal
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ActiveSession {
    pub session_id: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub login_time: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// Body of a login refused because the account is at its device limit
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLimit {
    pub active_devices: Vec<ActiveSession>,
    #[serde(default)]
    pub max_devices: u32,
    #[serde(default)]
    pub current_devices: u32,
    #[serde(default)]
    pub message: Option<String>,
}

impl DeviceLimit {
    /// The server's message, or a generic one when it sent none
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or("this account is signed in on too many devices")
    }

    pub fn find(&self, session_id: &str) -> Option<&ActiveSession> {
        self.active_devices
            .iter()
            .find(|session| session.session_id == session_id)
    }
}

/// Where an [`AdmissionDialog`] is
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogState {
    /// Waiting for the user to pick a session. `error` is shown inline after
    /// a failed eviction or a bad pick.
    Choosing { error: Option<String> },
    /// A device logout is in flight
    Evicting { session_id: String },
    Evicted { session_id: String },
    Abandoned,
}

/// Why the dialog refused a selection
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DialogError {
    #[error("a device is already being logged out")]
    Busy,

    #[error("session '{0}' is not one of the active devices")]
    UnknownSession(String),

    #[error("the dialog is closed")]
    Closed,
}

/// What should be rendered for an [`AdmissionDialog`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdmissionView<'a> {
    Devices {
        sessions: &'a [ActiveSession],
        max_devices: u32,
        current_devices: u32,
        message: &'a str,
        error: Option<&'a str>,
    },
    /// The server refused the login for the device limit but listed no
    /// devices. The only way out is to dismiss.
    NoActiveDevices { message: &'a str },
    Evicting { session_id: &'a str },
    Closed,
}

/// The device-limit dialog as a plain state machine.
///
/// Only one eviction may be in flight at a time, and dismissing while one
/// is in flight is ignored.
#[derive(Clone, Debug)]
pub struct AdmissionDialog {
    limit: DeviceLimit,
    state: DialogState,
}

impl AdmissionDialog {
    pub const fn open(limit: DeviceLimit) -> AdmissionDialog {
        AdmissionDialog {
            limit,
            state: DialogState::Choosing { error: None },
        }
    }

    pub const fn limit(&self) -> &DeviceLimit {
        &self.limit
    }

    pub const fn state(&self) -> &DialogState {
        &self.state
    }

    pub const fn is_open(&self) -> bool {
        matches!(
            self.state,
            DialogState::Choosing { .. } | DialogState::Evicting { .. }
        )
    }

    pub fn view(&self) -> AdmissionView<'_> {
        match &self.state {
            DialogState::Choosing { .. } if self.limit.active_devices.is_empty() => {
                AdmissionView::NoActiveDevices {
                    message: self.limit.message(),
                }
            }
            DialogState::Choosing { error } => AdmissionView::Devices {
                sessions: &self.limit.active_devices,
                max_devices: self.limit.max_devices,
                current_devices: self.limit.current_devices,
                message: self.limit.message(),
                error: error.as_deref(),
            },
            DialogState::Evicting { session_id } => AdmissionView::Evicting { session_id },
            DialogState::Evicted { .. } | DialogState::Abandoned => AdmissionView::Closed,
        }
    }

    /// Starts evicting `session_id`
    pub fn select(&mut self, session_id: &str) -> Result<(), DialogError> {
        match &self.state {
            DialogState::Evicting { .. } => Err(DialogError::Busy),
            DialogState::Evicted { .. } | DialogState::Abandoned => Err(DialogError::Closed),
            DialogState::Choosing { .. } => {
                if self.limit.find(session_id).is_none() {
                    let err = DialogError::UnknownSession(session_id.to_string());
                    self.state = DialogState::Choosing {
                        error: Some(err.to_string()),
                    };
                    return Err(err);
                }
                self.state = DialogState::Evicting {
                    session_id: session_id.to_string(),
                };
                Ok(())
            }
        }
    }

    /// Closes the dialog without evicting. Returns `false` when the request
    /// was ignored.
    pub fn dismiss(&mut self) -> bool {
        match self.state {
            DialogState::Choosing { .. } => {
                self.state = DialogState::Abandoned;
                true
            }
            _ => false,
        }
    }

    /// Returns to choosing with `message` shown inline
    pub fn eviction_failed(&mut self, message: impl Into<String>) {
        if let DialogState::Evicting { .. } = self.state {
            self.state = DialogState::Choosing {
                error: Some(message.into()),
            };
        }
    }

    /// Closes the dialog and returns the evicted session id
    pub fn eviction_succeeded(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.state, DialogState::Abandoned) {
            DialogState::Evicting { session_id } => {
                self.state = DialogState::Evicted {
                    session_id: session_id.clone(),
                };
                Some(session_id)
            }
            other => {
                self.state = other;
                None
            }
        }
    }
}

/// The user's answer to an [`AdmissionView`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceChoice {
    Evict(String),
    Dismiss,
}

/// Presents the device-limit dialog to a user
#[async_trait]
pub trait DevicePicker: Send {
    async fn choose(&mut self, view: AdmissionView<'_>) -> DeviceChoice;
}

/// The unauthenticated endpoints used while logging in
#[async_trait]
pub trait LoginApi: Send + Sync {
    async fn login(&self, credentials: &LoginCredentials) -> Result<Credential, LoginFailure>;

    /// Logs out another device's session. Sent without credentials.
    async fn logout_device(&self, session_id: &str) -> Result<(), EvictionFailure>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Logged in; the credential has been stored
    Admitted(Credential),
    /// The user closed the device-limit dialog
    Abandoned,
}

/// Runs a login through the device-limit dialog when needed
#[derive(Clone)]
pub struct AdmissionFlow {
    api: Arc<dyn LoginApi>,
    store: Arc<dyn TokenStore>,
    listener: Arc<dyn SessionListener>,
}

impl AdmissionFlow {
    pub const fn new(
        api: Arc<dyn LoginApi>,
        store: Arc<dyn TokenStore>,
        listener: Arc<dyn SessionListener>,
    ) -> AdmissionFlow {
        AdmissionFlow {
            api,
            store,
            listener,
        }
    }

    pub async fn login(
        &self,
        credentials: &LoginCredentials,
        picker: &mut dyn DevicePicker,
    ) -> Result<AdmissionOutcome, LoginFailure> {
        tracing::debug!(username = %credentials.username, "logging in");
        match self.api.login(credentials).await {
            Ok(credential) => self.admit(credential),
            Err(LoginFailure::DeviceLimit { limit, .. }) => {
                self.negotiate(credentials, limit, picker).await
            }
            Err(err) => Err(err),
        }
    }

    async fn negotiate(
        &self,
        credentials: &LoginCredentials,
        limit: DeviceLimit,
        picker: &mut dyn DevicePicker,
    ) -> Result<AdmissionOutcome, LoginFailure> {
        tracing::info!(
            current = limit.current_devices,
            max = limit.max_devices,
            listed = limit.active_devices.len(),
            "device limit reached"
        );
        let mut dialog = AdmissionDialog::open(limit);

        while dialog.is_open() {
            let session_id = match picker.choose(dialog.view()).await {
                DeviceChoice::Dismiss => {
                    dialog.dismiss();
                    continue;
                }
                DeviceChoice::Evict(session_id) => session_id,
            };
            if let Err(err) = dialog.select(&session_id) {
                tracing::debug!(%err, "selection refused");
                continue;
            }

            match self.api.logout_device(&session_id).await {
                Ok(()) => {
                    dialog.eviction_succeeded();
                    tracing::info!(session_id, "device logged out");
                    self.listener.on_device_evicted(&session_id);
                }
                Err(err) => {
                    tracing::warn!(session_id, %err, "device logout failed");
                    dialog.eviction_failed(err.to_string());
                }
            }
        }

        if let DialogState::Abandoned = dialog.state() {
            tracing::debug!("device-limit dialog dismissed");
            return Ok(AdmissionOutcome::Abandoned);
        }

        match self.api.login(credentials).await {
            Ok(credential) => self.admit(credential),
            Err(LoginFailure::DeviceLimit { status, limit }) => Err(LoginFailure::Rejected {
                status,
                message: limit.message().to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    fn admit(&self, credential: Credential) -> Result<AdmissionOutcome, LoginFailure> {
        self.store.set(credential.clone())?;
        tracing::info!("logged in");
        Ok(AdmissionOutcome::Admitted(credential))
    }
}
