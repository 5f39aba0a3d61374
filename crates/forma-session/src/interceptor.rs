use std::sync::Arc;

use chrono::Utc;
use forma_http::{HttpRequest, HttpResponse, HttpServiceError};
use forma_tower::{service::take_ready_service, ResponseFuture};
use http::StatusCode;
use strongbox::TokenStore;
use tower::{Layer, Service, ServiceExt};

use crate::{
    auth_header, AuthHeaderOptions, HeaderStyle, RefreshCoordinator, SessionConfig, SessionError,
};

/// Request extension marking a request already replayed after a refresh.
///
/// A 401 on a request carrying this marker ends the session instead of
/// starting another refresh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Replayed;

/// [`Layer`] that authenticates requests and recovers from expired tokens
#[derive(Clone)]
pub struct AuthLayer {
    pipeline: Arc<Pipeline>,
}

impl AuthLayer {
    pub fn new(
        config: &SessionConfig,
        store: Arc<dyn TokenStore>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> AuthLayer {
        AuthLayer {
            pipeline: Arc::new(Pipeline {
                store,
                coordinator,
                options: config.headers().clone(),
                bearer_fallback: *config.bearer_fallback(),
                refresh_when_expired: *config.refresh_when_expired(),
            }),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = Authenticated<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Authenticated {
            inner,
            pipeline: self.pipeline.clone(),
        }
    }
}

/// Service produced by [`AuthLayer`].
///
/// Every request picks up the token currently in the store. A 401 is
/// answered, in order, by retrying a bearer header in raw form, then by a
/// shared refresh followed by exactly one replay.
#[derive(Clone)]
pub struct Authenticated<S> {
    inner: S,
    pipeline: Arc<Pipeline>,
}

impl<S> Service<HttpRequest> for Authenticated<S>
where
    S: Service<HttpRequest, Response = HttpResponse, Error = HttpServiceError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = HttpResponse;
    type Error = SessionError;
    type Future = ResponseFuture<Result<HttpResponse, SessionError>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(SessionError::from)
    }

    fn call(&mut self, req: HttpRequest) -> Self::Future {
        let inner = take_ready_service(&mut self.inner);
        let pipeline = self.pipeline.clone();
        Box::pin(async move { pipeline.run(inner, req).await })
    }
}

struct Pipeline {
    store: Arc<dyn TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    options: AuthHeaderOptions,
    bearer_fallback: bool,
    refresh_when_expired: bool,
}

impl Pipeline {
    async fn run<S>(&self, mut inner: S, req: HttpRequest) -> Result<HttpResponse, SessionError>
    where
        S: Service<HttpRequest, Response = HttpResponse, Error = HttpServiceError>,
    {
        let replayed = req.extensions().get::<Replayed>().is_some();

        let credential = self.store.get();
        let token = if self.refresh_when_expired
            && !replayed
            && credential.is_expired(Utc::now())
        {
            tracing::debug!(uri = %req.uri(), "access token expired, refreshing before sending");
            Some(self.coordinator.refresh().await?)
        } else {
            credential.access_token().map(str::to_string)
        };

        let (response, style) = self.send(&mut inner, &req, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if replayed {
            return Err(self.reject_replay());
        }

        tracing::debug!(uri = %req.uri(), "request unauthorized, renewing session");
        let token = self.coordinator.refresh().await?;

        // the replay keeps the header style that was last sent and never falls back
        let mut replay = req;
        replay.extensions_mut().insert(Replayed);
        let options = self.options.with_style(style);
        let response = Self::attempt(&mut inner, &replay, Some(&token), &options).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(self.reject_replay());
        }
        Ok(response)
    }

    /// Sends `req` with `token`, falling back once from a bearer header to
    /// the raw token when the bearer form is rejected.
    ///
    /// Returns the response together with the header style it was sent with.
    async fn send<S>(
        &self,
        inner: &mut S,
        req: &HttpRequest,
        token: Option<&str>,
    ) -> Result<(HttpResponse, HeaderStyle), SessionError>
    where
        S: Service<HttpRequest, Response = HttpResponse, Error = HttpServiceError>,
    {
        let style = self.options.style();
        let response = Self::attempt(inner, req, token, &self.options).await?;

        let can_fall_back = self.bearer_fallback && token.is_some() && style == HeaderStyle::Bearer;
        if response.status() == StatusCode::UNAUTHORIZED && can_fall_back {
            tracing::debug!("bearer token rejected, retrying with the raw token");
            let raw = self.options.with_style(HeaderStyle::Raw);
            let response = Self::attempt(inner, req, token, &raw).await?;
            return Ok((response, HeaderStyle::Raw));
        }
        Ok((response, style))
    }

    async fn attempt<S>(
        inner: &mut S,
        req: &HttpRequest,
        token: Option<&str>,
        options: &AuthHeaderOptions,
    ) -> Result<HttpResponse, SessionError>
    where
        S: Service<HttpRequest, Response = HttpResponse, Error = HttpServiceError>,
    {
        let mut request = req.clone();
        request
            .headers_mut()
            .extend(auth_header::build(token, options)?);
        let response = inner.ready().await?.call(request).await?;
        tracing::trace!(status = %response.status(), "authenticated request answered");
        Ok(response)
    }

    fn reject_replay(&self) -> SessionError {
        tracing::warn!("request rejected again after the session was renewed, ending session");
        self.coordinator.expire_session();
        SessionError::ReplayRejected
    }
}
