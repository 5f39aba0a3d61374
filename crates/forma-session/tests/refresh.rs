use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use forma_http::{HttpServiceConfig, HttpServiceFactory, ReqwestServiceFactory};
use forma_session::{
    EventListener, RefreshFailure, RefreshPhase, SessionClient, SessionConfig, SessionError,
    SessionEvent, SessionListener,
};
use http::Method;
use httpmock::{Method::GET, Method::POST, MockServer};
use rstest::{fixture, rstest};
use serde_json::json;
use speculoos::prelude::*;
use strongbox::{Credential, MemoryTokenStore, TokenStore};
use url::Url;

const CALLERS: usize = 8;

struct Session {
    client: SessionClient,
    store: Arc<MemoryTokenStore>,
    events: EventListener,
}

#[fixture]
fn server() -> MockServer {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/projects")
            .header("authorization", "Bearer stale");
        then.status(401);
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/projects")
            .header("authorization", "stale");
        then.status(401);
    });
    server
}

fn session(server: &MockServer) -> Result<Session> {
    let store = Arc::new(MemoryTokenStore::new(Credential::new(
        Some("stale".to_string()),
        Some("r1".to_string()),
        None,
    )));
    let events = EventListener::default();
    let client = SessionClient::builder()
        .config(
            SessionConfig::builder()
                .base_url(Url::parse(&server.base_url())?)
                .build(),
        )
        .http(ReqwestServiceFactory::new(HttpServiceConfig::default())?.create()?)
        .store(store.clone() as Arc<dyn TokenStore>)
        .listener(Arc::new(events.clone()) as Arc<dyn SessionListener>)
        .build();
    Ok(Session {
        client,
        store,
        events,
    })
}

async fn fire(client: &SessionClient) -> Vec<Result<u16, SessionError>> {
    let callers: Vec<_> = (0..CALLERS)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                let req = client.request(Method::GET, "/projects", None)?;
                Ok::<_, SessionError>(client.issue(req).await?.status().as_u16())
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(CALLERS);
    for caller in callers {
        outcomes.push(caller.await.expect("caller panicked"));
    }
    outcomes
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_401s_share_one_refresh(server: MockServer) -> Result<()> {
    let refresh = server.mock(|when, then| {
        when.method(POST)
            .path("/auth/refresh")
            .json_body(json!({ "refresh_token": "r1" }));
        then.status(200)
            .delay(Duration::from_millis(500))
            .json_body(json!({ "access_token": "fresh", "expires_in": 900 }));
    });
    // stale was rejected in both forms, so replays use the raw token
    let fresh = server.mock(|when, then| {
        when.method(GET)
            .path("/projects")
            .header("authorization", "fresh");
        then.status(200).json_body(json!([]));
    });
    let Session { client, store, .. } = session(&server)?;

    let outcomes = fire(&client).await;

    for outcome in outcomes {
        assert_that!(outcome).is_ok().is_equal_to(200);
    }
    refresh.assert_hits(1);
    fresh.assert_hits(CALLERS);
    assert_that!(client.coordinator().cycles()).is_equal_to(1);
    assert_that!(client.coordinator().phase()).is_equal_to(RefreshPhase::Idle);

    let stored = store.get();
    assert_that!(stored.access_token()).is_equal_to(Some("fresh"));
    assert_that!(stored.refresh_token()).is_equal_to(Some("r1"));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_failed_refresh_ends_the_session_once(server: MockServer) -> Result<()> {
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/auth/refresh");
        then.status(401)
            .delay(Duration::from_millis(500))
            .json_body(json!({ "message": "refresh token revoked" }));
    });
    let Session {
        client,
        store,
        events,
    } = session(&server)?;
    let mut expired = events.subscribe();

    let outcomes = fire(&client).await;

    let expected = RefreshFailure::Rejected {
        status: 401,
        message: "refresh token revoked".to_string(),
    };
    for outcome in outcomes {
        assert_that!(outcome).is_err().matches(
            |err| matches!(err, SessionError::RefreshFailed(failure) if *failure == expected),
        );
    }
    refresh.assert_hits(1);
    assert_that!(store.get().is_present()).is_false();
    assert_that!(expired.try_recv()).is_equal_to(Ok(SessionEvent::Expired));
    assert_that!(expired.try_recv()).is_err();
    Ok(())
}

#[rstest]
#[tokio::test]
async fn a_request_rejected_after_renewal_is_not_retried_again(server: MockServer) -> Result<()> {
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/auth/refresh");
        then.status(200).json_body(json!({ "access_token": "fresh" }));
    });
    let rejected_bearer = server.mock(|when, then| {
        when.method(GET)
            .path("/projects")
            .header("authorization", "Bearer fresh");
        then.status(401);
    });
    let rejected_raw = server.mock(|when, then| {
        when.method(GET)
            .path("/projects")
            .header("authorization", "fresh");
        then.status(401);
    });
    let Session { client, store, .. } = session(&server)?;

    let req = client.request(Method::GET, "/projects", None)?;
    let outcome = client.issue(req).await;

    assert_that!(outcome)
        .is_err()
        .matches(|err| matches!(err, SessionError::ReplayRejected));
    refresh.assert_hits(1);
    // one replay, in the raw form the original request last used
    rejected_bearer.assert_hits(0);
    rejected_raw.assert_hits(1);
    assert_that!(store.get().is_present()).is_false();
    Ok(())
}

#[rstest]
#[tokio::test]
async fn later_401s_start_a_new_cycle(server: MockServer) -> Result<()> {
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/auth/refresh");
        then.status(200).json_body(json!({ "access_token": "fresh" }));
    });
    let fresh = server.mock(|when, then| {
        when.method(GET)
            .path("/projects")
            .header("authorization", "fresh");
        then.status(200);
    });
    let Session { client, store, .. } = session(&server)?;

    let req = client.request(Method::GET, "/projects", None)?;
    assert_that!(client.issue(req).await?.status().as_u16()).is_equal_to(200);

    // the server forgets the session again
    store.set(Credential::new(
        Some("stale".to_string()),
        Some("r1".to_string()),
        None,
    ))?;
    let req = client.request(Method::GET, "/projects", None)?;
    assert_that!(client.issue(req).await?.status().as_u16()).is_equal_to(200);

    refresh.assert_hits(2);
    fresh.assert_hits(2);
    assert_that!(client.coordinator().cycles()).is_equal_to(2);
    Ok(())
}
