//! Error taxonomy for the session layer.

use forma_http::HttpServiceError;
use http::StatusCode;
use strongbox::StrongboxProblem;

use crate::DeviceLimit;

/// Why a refresh cycle ended without a new access token.
///
/// Every caller waiting on the same cycle receives a clone of the same
/// value, so this type carries messages rather than source errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    #[error("no refresh token is stored")]
    NoRefreshToken,

    #[error("refresh was rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("refresh response was malformed: {0}")]
    Malformed(String),

    #[error("refresh could not reach the server: {0}")]
    Transport(String),

    #[error("refreshed credential could not be saved: {0}")]
    Store(String),

    #[error("refresh stopped before it settled")]
    Abandoned,
}

/// Failures surfaced to callers of the authenticated pipeline.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// The request never got a response. Callers may retry; the pipeline
    /// does not.
    #[error(transparent)]
    Transport(#[from] HttpServiceError),

    /// A 401 arrived and there was no refresh token to recover with.
    #[error("the server rejected the session and there is no refresh token to renew it")]
    AuthRejected,

    #[error("could not renew the session: {0}")]
    RefreshFailed(RefreshFailure),

    /// The request was rejected again after being replayed with a
    /// freshly refreshed token.
    #[error("the server rejected the request again after the session was renewed")]
    ReplayRejected,

    #[error("could not build auth headers: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    #[error(transparent)]
    Store(#[from] StrongboxProblem),
}

impl From<RefreshFailure> for SessionError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::NoRefreshToken => SessionError::AuthRejected,
            other => SessionError::RefreshFailed(other),
        }
    }
}

/// Why a login did not produce a session.
#[derive(thiserror::Error, Debug)]
pub enum LoginFailure {
    /// The account already has its maximum number of active devices.
    #[error("{}", .limit.message())]
    DeviceLimit { status: StatusCode, limit: DeviceLimit },

    #[error("login was rejected with status {status}: {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("login response was malformed: {0}")]
    Malformed(String),

    #[error(transparent)]
    Transport(#[from] HttpServiceError),

    #[error(transparent)]
    Store(#[from] StrongboxProblem),
}

/// Why a device could not be logged out.
#[derive(thiserror::Error, Debug)]
pub enum EvictionFailure {
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("session '{0}' is not one of the active devices")]
    UnknownSession(String),

    #[error(transparent)]
    Transport(#[from] HttpServiceError),
}
