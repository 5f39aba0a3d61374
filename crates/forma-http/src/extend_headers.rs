//! Attaches a fixed set of headers to every request

use http::HeaderMap;
use tower::{Layer, Service};

/// [`Layer`] producing [`ExtendHeaders`]
pub struct ExtendHeadersLayer {
    headers: HeaderMap,
}

impl ExtendHeadersLayer {
    /// Creates a layer that adds `headers` to each request
    pub fn new(headers: impl Into<HeaderMap>) -> ExtendHeadersLayer {
        ExtendHeadersLayer {
            headers: headers.into(),
        }
    }
}

impl<S: Clone> Layer<S> for ExtendHeadersLayer {
    type Service = ExtendHeaders<S>;
    fn layer(&self, inner: S) -> Self::Service {
        ExtendHeaders {
            headers: self.headers.clone(),
            inner,
        }
    }
}

/// Adds its headers to a request unless the request already carries a
/// value under the same name
#[derive(Clone)]
pub struct ExtendHeaders<S: Clone> {
    headers: HeaderMap,
    inner: S,
}

impl<S: Clone> ExtendHeaders<S> {
    /// Wraps `inner`
    pub const fn new(headers: HeaderMap, inner: S) -> ExtendHeaders<S> {
        ExtendHeaders { headers, inner }
    }
}

impl<Req, S> Service<http::Request<Req>> for ExtendHeaders<S>
where
    S: Service<http::Request<Req>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<Req>) -> Self::Future {
        let headers = req.headers_mut();
        for (name, value) in self.headers.iter() {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use forma_tower::expect_ready;
    use http::{header, HeaderMap, HeaderValue};
    use speculoos::prelude::*;
    use tower::{Layer, Service, ServiceExt};

    use super::ExtendHeadersLayer;
    use crate::{test::MockHttpService, Full};

    fn user_agent() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("forma/0.4.0"));
        headers
    }

    #[tokio::test]
    async fn adds_missing_headers() -> Result<()> {
        let mut mock = MockHttpService::new();
        expect_ready!(mock);
        mock.expect_call()
            .times(1)
            .withf(|req| req.headers().get(header::USER_AGENT) == Some(&HeaderValue::from_static("forma/0.4.0")))
            .returning(|_| futures::future::ready(Ok(http::Response::new(Full::default()))));

        let mut service = ExtendHeadersLayer::new(user_agent()).layer(mock);
        let req = http::Request::builder().uri("http://localhost/").body(Full::default())?;
        let resp = service.ready().await?.call(req).await;
        assert_that!(resp).is_ok();
        Ok(())
    }

    #[tokio::test]
    async fn keeps_headers_the_request_already_has() -> Result<()> {
        let mut mock = MockHttpService::new();
        expect_ready!(mock);
        mock.expect_call()
            .times(1)
            .withf(|req| req.headers().get(header::USER_AGENT) == Some(&HeaderValue::from_static("custom")))
            .returning(|_| futures::future::ready(Ok(http::Response::new(Full::default()))));

        let mut service = ExtendHeadersLayer::new(user_agent()).layer(mock);
        let req = http::Request::builder()
            .uri("http://localhost/")
            .header(header::USER_AGENT, "custom")
            .body(Full::default())?;
        let resp = service.ready().await?.call(req).await;
        assert_that!(resp).is_ok();
        Ok(())
    }
}
