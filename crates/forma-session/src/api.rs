use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use forma_http::{body::body_to_bytes, Full, HttpService, HttpServiceError};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use strongbox::{expiry_after, Credential};
use tower::ServiceExt;

use crate::{
    auth_header, DeviceLimit, EvictionFailure, LoginApi, LoginCredentials, LoginFailure,
    RefreshFailure, RefreshedTokens, SessionConfig, TokenRefresher,
};

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct DeviceLogoutRequest<'a> {
    session_id: &'a str,
}

/// Body returned by both the login and the refresh endpoints
#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Talks to the unauthenticated auth endpoints: login, refresh and device
/// logout.
///
/// These calls go straight to the transport. They never pass through the
/// [`AuthLayer`](crate::AuthLayer), so a failing refresh cannot trigger
/// another refresh.
#[derive(Clone, Debug)]
pub struct SessionApi {
    config: SessionConfig,
    http: HttpService,
}

impl SessionApi {
    pub const fn new(config: SessionConfig, http: HttpService) -> SessionApi {
        SessionApi { config, http }
    }

    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(StatusCode, Bytes), HttpServiceError> {
        let body = serde_json::to_vec(body)
            .map_err(|err| HttpServiceError::Unexpected(Box::new(err)))?;
        let mut req = http::Request::builder()
            .method(Method::POST)
            .uri(self.config.url(path))
            .body(Full::new(Bytes::from(body)))?;
        let headers = auth_header::build(None, self.config.headers()).map_err(http::Error::from)?;
        req.headers_mut().extend(headers);

        tracing::debug!(path, "calling auth endpoint");
        let mut res = self.http.clone().oneshot(req).await?;
        let status = res.status();
        let body = body_to_bytes(res.body_mut()).await.unwrap_or_default();
        tracing::debug!(path, %status, "auth endpoint answered");
        Ok((status, body))
    }
}

/// Pulls a human readable message out of an error body: the JSON `message`
/// field if there is one, else the raw text, else the status reason.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(ErrorBody { message }) = serde_json::from_slice(body) {
        return message;
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        text
    }
}

fn out_of_range(expires_in: i64) -> String {
    format!("expires_in of {expires_in} seconds is out of range")
}

#[async_trait]
impl TokenRefresher for SessionApi {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshFailure> {
        let (status, body) = self
            .post(&self.config.endpoints().refresh, &RefreshRequest { refresh_token })
            .await
            .map_err(|err| RefreshFailure::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(RefreshFailure::Rejected {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let response: TokenResponse = serde_json::from_slice(&body)
            .map_err(|err| RefreshFailure::Malformed(err.to_string()))?;
        if let Some(seconds) = response.expires_in {
            if expiry_after(Utc::now(), seconds).is_none() {
                return Err(RefreshFailure::Malformed(out_of_range(seconds)));
            }
        }
        match response.access_token.filter(|token| !token.is_empty()) {
            Some(access_token) => Ok(RefreshedTokens {
                access_token,
                refresh_token: response.refresh_token,
                expires_in: response.expires_in,
            }),
            None => Err(RefreshFailure::Malformed(
                response
                    .message
                    .unwrap_or_else(|| "response has no access_token".to_string()),
            )),
        }
    }
}

#[async_trait]
impl LoginApi for SessionApi {
    async fn login(&self, credentials: &LoginCredentials) -> Result<Credential, LoginFailure> {
        let (status, body) = self
            .post(&self.config.endpoints().login, credentials)
            .await?;

        if !status.is_success() {
            if let Ok(limit) = serde_json::from_slice::<DeviceLimit>(&body) {
                return Err(LoginFailure::DeviceLimit { status, limit });
            }
            return Err(LoginFailure::Rejected {
                status,
                message: error_message(status, &body),
            });
        }

        let response: TokenResponse = serde_json::from_slice(&body)
            .map_err(|err| LoginFailure::Malformed(err.to_string()))?;
        let expires_at = response
            .expires_in
            .map(|seconds| {
                expiry_after(Utc::now(), seconds)
                    .ok_or_else(|| LoginFailure::Malformed(out_of_range(seconds)))
            })
            .transpose()?;
        let credential = Credential::new(response.access_token, response.refresh_token, expires_at);
        if !credential.is_present() {
            return Err(LoginFailure::Malformed(
                "response must carry both access_token and refresh_token".to_string(),
            ));
        }
        Ok(credential)
    }

    async fn logout_device(&self, session_id: &str) -> Result<(), EvictionFailure> {
        let (status, body) = self
            .post(
                &self.config.endpoints().device_logout,
                &DeviceLogoutRequest { session_id },
            )
            .await?;

        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND {
            return Err(EvictionFailure::UnknownSession(session_id.to_string()));
        }
        Err(EvictionFailure::Rejected {
            status,
            message: error_message(status, &body),
        })
    }
}
