use buildstructor::buildstructor;
use derive_getters::Getters;
use url::Url;

use crate::AuthHeaderOptions;

/// Paths of the auth endpoints, relative to [`SessionConfig::base_url`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub refresh: String,
    pub device_logout: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            login: "/auth/login".to_string(),
            refresh: "/auth/refresh".to_string(),
            device_logout: "/auth/logout-device".to_string(),
        }
    }
}

/// Everything the session layer needs to know about the API it talks to.
#[derive(Clone, Debug, Getters)]
pub struct SessionConfig {
    base_url: Url,
    endpoints: Endpoints,
    headers: AuthHeaderOptions,
    bearer_fallback: bool,
    refresh_when_expired: bool,
}

#[buildstructor]
impl SessionConfig {
    /// `bearer_fallback` and `refresh_when_expired` default to on.
    #[builder]
    pub fn new(
        base_url: Url,
        endpoints: Option<Endpoints>,
        headers: Option<AuthHeaderOptions>,
        bearer_fallback: Option<bool>,
        refresh_when_expired: Option<bool>,
    ) -> SessionConfig {
        SessionConfig {
            base_url,
            endpoints: endpoints.unwrap_or_default(),
            headers: headers.unwrap_or_default(),
            bearer_fallback: bearer_fallback.unwrap_or(true),
            refresh_when_expired: refresh_when_expired.unwrap_or(true),
        }
    }

    /// Joins `path` onto the base URL, tolerating stray slashes on either side
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
