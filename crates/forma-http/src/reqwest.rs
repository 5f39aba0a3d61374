use std::pin::Pin;

use buildstructor::buildstructor;
use futures::Future;
use http_body_util::Full;
use reqwest::ClientBuilder;
use tower::{
    timeout::error::Elapsed, util::BoxCloneSyncService, BoxError, Service, ServiceBuilder,
    ServiceExt,
};

use crate::{
    body::body_to_bytes, HttpRequest, HttpResponse, HttpService, HttpServiceConfig,
    HttpServiceError, HttpServiceFactory, DEFAULT_TIMEOUT,
};

/// Constructs [`HttpService`]s that share one [`reqwest::Client`]
#[derive(Clone, Debug)]
pub struct ReqwestServiceFactory {
    config: HttpServiceConfig,
    client: reqwest::Client,
}

impl ReqwestServiceFactory {
    /// Builds the shared client from `config`
    pub fn new(config: HttpServiceConfig) -> Result<ReqwestServiceFactory, HttpServiceError> {
        let client = client_from_config(&config)?;
        Ok(ReqwestServiceFactory { config, client })
    }
}

impl HttpServiceFactory for ReqwestServiceFactory {
    fn create(&self) -> Result<HttpService, HttpServiceError> {
        let service = ReqwestService::builder()
            .config(self.config.clone())
            .client(self.client.clone())
            .build()?;
        Ok(service.into())
    }
}

/// A [`Service`] that sends [`http`] requests with a [`reqwest`] client
#[derive(Clone, Debug)]
pub struct ReqwestService {
    client: BoxCloneSyncService<reqwest::Request, reqwest::Response, HttpServiceError>,
}

#[buildstructor]
impl ReqwestService {
    /// Constructs a new [`ReqwestService`]
    #[builder]
    pub fn new(
        config: Option<HttpServiceConfig>,
        client: Option<reqwest::Client>,
    ) -> Result<ReqwestService, HttpServiceError> {
        let config = config.unwrap_or_default();
        let client = match client {
            Some(client) => client,
            None => client_from_config(&config)?,
        };
        let client = BoxCloneSyncService::new(
            ServiceBuilder::new()
                .map_err(classify)
                .timeout(config.timeout().unwrap_or(DEFAULT_TIMEOUT))
                .service(client),
        );
        Ok(ReqwestService { client })
    }
}

fn client_from_config(config: &HttpServiceConfig) -> Result<reqwest::Client, HttpServiceError> {
    let mut builder = ClientBuilder::new();
    if let Some(user_agent) = config.user_agent() {
        builder = builder.user_agent(user_agent.as_str());
    }
    Ok(builder.build()?)
}

// The timeout layer boxes whatever the client returns, so both the elapsed
// marker and reqwest's own errors have to be recovered here.
fn classify(err: BoxError) -> HttpServiceError {
    if err.is::<Elapsed>() {
        return HttpServiceError::TimedOut;
    }
    match err.downcast::<reqwest::Error>() {
        Ok(err) => HttpServiceError::from(*err),
        Err(err) => HttpServiceError::from(err),
    }
}

impl From<reqwest::Error> for HttpServiceError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            HttpServiceError::TimedOut
        } else if value.is_connect() {
            HttpServiceError::Connect(value.into())
        } else if value.is_body() {
            HttpServiceError::Body(value.into())
        } else if value.is_decode() {
            HttpServiceError::Decode(value.into())
        } else {
            HttpServiceError::Unexpected(value.into())
        }
    }
}

impl Service<HttpRequest> for ReqwestService {
    type Response = HttpResponse;
    type Error = HttpServiceError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.client.poll_ready(cx)
    }

    fn call(&mut self, req: HttpRequest) -> Self::Future {
        // https://docs.rs/tower/latest/tower/trait.Service.html#be-careful-when-cloning-inner-services
        let mut client = self.client.clone();
        let fut = async move {
            let mut req = req;
            let bytes = body_to_bytes(&mut req)
                .await
                .map_err(|err| HttpServiceError::Body(Box::new(err)))?;
            let req = req.map(move |_| reqwest::Body::from(bytes));
            let req = reqwest::Request::try_from(req)?;
            tracing::trace!(method = %req.method(), url = %req.url(), "sending request");
            let mut resp = http::Response::from(client.ready().await?.call(req).await?);
            let bytes = body_to_bytes(&mut resp)
                .await
                .map_err(|err| HttpServiceError::Body(Box::new(err)))?;
            tracing::trace!(status = %resp.status(), bytes = bytes.len(), "received response");
            Ok(resp.map(|_| Full::new(bytes)))
        };
        Box::pin(fut)
    }
}

impl From<ReqwestService> for HttpService {
    fn from(value: ReqwestService) -> Self {
        BoxCloneSyncService::new(value)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use bytes::Bytes;
    use http::HeaderValue;
    use http_body_util::Full;
    use httpmock::{Method, MockServer};
    use rstest::{fixture, rstest};
    use speculoos::prelude::*;
    use tower::{Service, ServiceExt};

    use crate::{
        body::body_to_bytes, HttpService, HttpServiceConfig, HttpServiceError, ReqwestService,
    };

    #[fixture]
    pub fn raw_service() -> HttpService {
        ReqwestService::builder()
            .client(reqwest::Client::default())
            .build()
            .unwrap()
            .into()
    }

    #[fixture]
    pub fn short_timeout_service() -> HttpService {
        ReqwestService::builder()
            .config(
                HttpServiceConfig::builder()
                    .timeout(Duration::from_millis(100))
                    .build(),
            )
            .client(reqwest::Client::default())
            .build()
            .unwrap()
            .into()
    }

    #[rstest]
    #[case::no_timeout(raw_service(), None)]
    #[case::fast_enough(short_timeout_service(), None)]
    #[case::too_slow(short_timeout_service(), Some(Duration::from_millis(300)))]
    #[tokio::test]
    pub async fn sends_a_request(
        #[case] mut service: HttpService,
        #[case] delay: Option<Duration>,
    ) -> Result<()> {
        let server = MockServer::start();
        let uri = server.url("/auth/login");

        let mock = server.mock(|when, then| {
            when.method(Method::POST)
                .path("/auth/login")
                .header("content-type", "application/json")
                .body("{}");

            let then = then
                .status(200)
                .header("x-request-id", "r-1")
                .body("{\"ok\":true}");
            if let Some(delay) = delay {
                then.delay(delay);
            }
        });

        let request = http::Request::builder()
            .uri(uri)
            .method(http::Method::POST)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from_static(b"{}")))?;

        let resp = service.ready().await?.call(request).await;

        mock.assert_calls(1);

        if delay.is_some() {
            assert_that!(resp)
                .is_err()
                .matches(|err| matches!(err, HttpServiceError::TimedOut));
        } else {
            let mut resp = resp?;
            assert_that!(resp.headers().get("x-request-id"))
                .is_some()
                .is_equal_to(&HeaderValue::from_static("r-1"));
            let body = body_to_bytes(resp.body_mut()).await?;
            assert_that!(body).is_equal_to(Bytes::from_static(b"{\"ok\":true}"));
        }

        Ok(())
    }

    #[tokio::test]
    pub async fn passes_unauthorized_through_as_a_response() -> Result<()> {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::GET).path("/elements");
            then.status(401).body("{\"message\":\"expired\"}");
        });

        let request = http::Request::builder()
            .uri(server.url("/elements"))
            .body(Full::default())?;

        let resp = raw_service().ready().await?.call(request).await?;

        mock.assert_calls(1);
        assert_that!(resp.status()).is_equal_to(http::StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
