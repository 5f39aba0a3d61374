use std::sync::Arc;

use buildstructor::buildstructor;
use bytes::Bytes;
use forma_http::{Full, HttpRequest, HttpResponse, HttpService, HttpServiceError};
use http::Method;
use strongbox::{Credential, StrongboxProblem, TokenStore};
use tower::{util::BoxCloneSyncService, Layer, ServiceExt};

use crate::{
    AdmissionFlow, AdmissionOutcome, AuthLayer, DevicePicker, EvictionFailure, LoginApi,
    LoginCredentials, LoginFailure, NoopListener, RefreshCoordinator, SessionApi, SessionConfig,
    SessionError, SessionListener,
};

/// Authenticated pipeline as a cloneable service
pub type SessionService = BoxCloneSyncService<HttpRequest, HttpResponse, SessionError>;

/// One logged-in (or logging-in) user against one API.
///
/// Owns the only [`RefreshCoordinator`] for its token store; every request
/// made through [`SessionClient::issue`] or [`SessionClient::service`]
/// shares it.
#[derive(Clone)]
pub struct SessionClient {
    api: SessionApi,
    store: Arc<dyn TokenStore>,
    listener: Arc<dyn SessionListener>,
    coordinator: Arc<RefreshCoordinator>,
    admission: AdmissionFlow,
    service: SessionService,
}

#[buildstructor]
impl SessionClient {
    #[builder]
    pub fn new(
        config: SessionConfig,
        http: HttpService,
        store: Arc<dyn TokenStore>,
        listener: Option<Arc<dyn SessionListener>>,
    ) -> SessionClient {
        let listener = listener.unwrap_or_else(|| Arc::new(NoopListener));
        let api = SessionApi::new(config.clone(), http.clone());
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            Arc::new(api.clone()),
            listener.clone(),
        ));
        let admission = AdmissionFlow::new(Arc::new(api.clone()), store.clone(), listener.clone());
        let service = BoxCloneSyncService::new(
            AuthLayer::new(&config, store.clone(), coordinator.clone()).layer(http),
        );
        SessionClient {
            api,
            store,
            listener,
            coordinator,
            admission,
            service,
        }
    }

    pub const fn config(&self) -> &SessionConfig {
        self.api.config()
    }

    pub const fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn credential(&self) -> Credential {
        self.store.get()
    }

    pub fn current_token(&self) -> Option<String> {
        self.store.get().access_token().map(str::to_string)
    }

    /// The authenticated pipeline, for callers that want to add their own
    /// layers on top
    pub fn service(&self) -> SessionService {
        self.service.clone()
    }

    /// Builds a request for `path` relative to the configured base URL
    pub fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<HttpRequest, SessionError> {
        http::Request::builder()
            .method(method)
            .uri(self.config().url(path))
            .body(Full::new(body.unwrap_or_default()))
            .map_err(|err| SessionError::Transport(HttpServiceError::from(err)))
    }

    pub async fn issue(&self, req: HttpRequest) -> Result<HttpResponse, SessionError> {
        self.service.clone().oneshot(req).await
    }

    /// Logs in, going through the device-limit dialog if the account is full
    pub async fn login(
        &self,
        credentials: &LoginCredentials,
        picker: &mut dyn DevicePicker,
    ) -> Result<AdmissionOutcome, LoginFailure> {
        self.admission.login(credentials, picker).await
    }

    /// Logs out another device's session without being logged in
    pub async fn evict(&self, session_id: &str) -> Result<(), EvictionFailure> {
        self.api.logout_device(session_id).await?;
        self.listener.on_device_evicted(session_id);
        Ok(())
    }

    /// Forgets the stored credential
    pub fn logout(&self) -> Result<(), StrongboxProblem> {
        tracing::info!("logging out");
        self.store.clear()
    }
}
