//! Session and credential resilience for the Forma API.
//!
//! Every authenticated call goes through one [`AuthLayer`] pipeline. It
//! attaches the stored token, retries a rejected bearer header in raw form,
//! and on a 401 hands over to the shared [`RefreshCoordinator`], which runs
//! at most one refresh at a time and gives every waiting caller the same
//! outcome.
//!
//! Logins that hit the account's device limit go through the admission
//! flow instead: the user picks an active session to evict and the original
//! login is submitted once more.
//!
//! ```text
//! caller ──► AuthLayer ──► HttpService
//!               │ 401
//!               ▼
//!        RefreshCoordinator ──► TokenRefresher (refresh endpoint)
//!               │
//!               ▼
//!           TokenStore
//! ```

mod admission;
mod api;
pub mod auth_header;
mod client;
mod config;
mod error;
mod interceptor;
mod listener;
mod refresh;

pub use admission::{
    ActiveSession, AdmissionDialog, AdmissionFlow, AdmissionOutcome, AdmissionView,
    DeviceChoice, DeviceLimit, DevicePicker, DialogError, DialogState, LoginApi,
    LoginCredentials,
};
pub use api::SessionApi;
pub use auth_header::{AuthHeaderOptions, HeaderStyle};
pub use client::{SessionClient, SessionService};
pub use config::{Endpoints, SessionConfig};
pub use error::{EvictionFailure, LoginFailure, RefreshFailure, SessionError};
pub use interceptor::{AuthLayer, Authenticated, Replayed};
pub use listener::{EventListener, NoopListener, SessionEvent, SessionListener};
pub use refresh::{RefreshCoordinator, RefreshPhase, RefreshedTokens, TokenRefresher};
