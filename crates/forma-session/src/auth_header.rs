//! Maps a token onto transport headers.
//!
//! The API accepts the same session token in more than one form depending
//! on which generation of endpoint serves the request: `Authorization:
//! Bearer <token>`, a raw `Authorization: <token>`, and optionally a parallel
//! `session_id: <token>` header.

use http::{
    header::{self, InvalidHeaderValue},
    HeaderMap, HeaderValue,
};

/// Name of the parallel session header
pub const SESSION_ID: &str = "session_id";

/// How the token is written into `Authorization`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderStyle {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `Authorization: <token>`
    Raw,
}

/// Options for [`build`].
#[derive(Clone, Debug)]
pub struct AuthHeaderOptions {
    pub use_bearer: bool,
    pub include_session_id: bool,
    pub extra: HeaderMap,
}

impl Default for AuthHeaderOptions {
    fn default() -> Self {
        AuthHeaderOptions {
            use_bearer: true,
            include_session_id: false,
            extra: HeaderMap::new(),
        }
    }
}

impl AuthHeaderOptions {
    pub const fn style(&self) -> HeaderStyle {
        if self.use_bearer {
            HeaderStyle::Bearer
        } else {
            HeaderStyle::Raw
        }
    }

    /// The same options with `Authorization` written in `style`
    pub fn with_style(&self, style: HeaderStyle) -> AuthHeaderOptions {
        AuthHeaderOptions {
            use_bearer: style == HeaderStyle::Bearer,
            ..self.clone()
        }
    }
}

/// Builds the headers for one request.
///
/// Always sets JSON `Content-Type` and `Accept`. Token headers are only
/// added when a token is given. `extra` is applied last and wins over
/// everything else.
pub fn build(token: Option<&str>, options: &AuthHeaderOptions) -> Result<HeaderMap, InvalidHeaderValue> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

    if let Some(token) = token {
        let authorization = match options.style() {
            HeaderStyle::Bearer => format!("Bearer {token}"),
            HeaderStyle::Raw => token.to_string(),
        };
        headers.insert(header::AUTHORIZATION, sensitive(&authorization)?);
        if options.include_session_id {
            headers.insert(SESSION_ID, sensitive(token)?);
        }
    }

    for (name, value) in options.extra.iter() {
        headers.insert(name.clone(), value.clone());
    }
    Ok(headers)
}

fn sensitive(value: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut value = HeaderValue::from_str(value)?;
    value.set_sensitive(true);
    Ok(value)
}
