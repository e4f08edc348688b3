//! Retry and backoff behavior of the outbound client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clipscout::clock::SystemClock;
use clipscout::credentials::{
    EnvKeys, KeyCache, KeyResolver, MemoryCredentialStore, Service, UserId,
};
use clipscout::crypto::SecretCipher;
use clipscout::net::{ApiClient, ApiError, RequestSpec, RetryPolicy};

const BASE_DELAY: Duration = Duration::from_millis(50);

fn client_for(server: &MockServer) -> ApiClient {
    let cache = Arc::new(KeyCache::new(
        Duration::from_secs(300),
        Arc::new(SystemClock),
    ));
    let store = Arc::new(MemoryCredentialStore::new());
    let cipher = Arc::new(SecretCipher::new(&SecretString::from("retry-test-secret")).unwrap());
    let env = EnvKeys::empty()
        .with_key(Service::RapidApi, "ENV-RAPID")
        .with_key(Service::Youtube, "ENV-YT");
    let resolver = Arc::new(KeyResolver::new(cache, store, cipher, env));

    ApiClient::new(resolver)
        .with_policy(RetryPolicy::new(3, BASE_DELAY))
        .with_base_url(server.uri())
}

fn spec() -> RequestSpec {
    RequestSpec::get(Service::RapidApi, "some-api.p.rapidapi.com", "/things")
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let server = MockServer::start().await;

    // Two 503s, then a 200. Later mounts only match once earlier ones expire.
    Mock::given(method("GET"))
        .and(path("/things"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/things"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"ok":true}"#, "application/json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let started = Instant::now();
    let body: serde_json::Value = client.request(&UserId::from("u1"), &spec()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(body, serde_json::json!({"ok": true}));
    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 3);
    // Backoff slept base*1 then base*2 between the three attempts.
    assert!(
        elapsed >= BASE_DELAY * 3,
        "expected at least {:?} of backoff, got {elapsed:?}",
        BASE_DELAY * 3
    );
}

#[tokio::test]
async fn transient_failure_on_every_attempt_gives_up_after_three() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/things"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream sad"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .request::<serde_json::Value>(&UserId::from("u1"), &spec())
        .await
        .unwrap_err();

    match err {
        ApiError::Upstream {
            status,
            retryable,
            message,
            ..
        } => {
            assert_eq!(status, 503);
            assert!(retryable);
            assert_eq!(message.as_deref(), Some("upstream sad"));
        }
        other => panic!("expected Upstream error, got {other:?}"),
    }

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 3, "exactly 3 attempts, no more");
}

#[tokio::test]
async fn non_retryable_status_fails_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/things"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad query"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let started = Instant::now();
    let err = client
        .request::<serde_json::Value>(&UserId::from("u1"), &spec())
        .await
        .unwrap_err();

    match err {
        ApiError::Upstream {
            status, retryable, ..
        } => {
            assert_eq!(status, 400);
            assert!(!retryable);
        }
        other => panic!("expected Upstream error, got {other:?}"),
    }

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1, "a 400 must not be retried");
    assert!(
        started.elapsed() < BASE_DELAY,
        "no backoff sleep on a fatal status"
    );
}

#[tokio::test]
async fn connection_failure_surfaces_network_error_after_retries() {
    // Grab a port nothing is listening on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let server = MockServer::start().await;
    let client = client_for(&server).with_base_url(format!("http://127.0.0.1:{port}"));

    let err = client
        .request::<serde_json::Value>(&UserId::from("u1"), &spec())
        .await
        .unwrap_err();

    match err {
        ApiError::Network { attempts } => assert_eq!(attempts, 3),
        other => panic!("expected Network error, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_skips_pending_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/things"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    // Long base delay: without cancellation this request would spend ~30s
    // sleeping between attempts.
    let client = client_for(&server).with_policy(RetryPolicy::new(3, Duration::from_secs(10)));
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = client
        .request_cancellable::<serde_json::Value>(&UserId::from("u1"), &spec(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Cancelled), "got {err:?}");
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "cancellation must not wait out the backoff"
    );
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error_not_a_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/things"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("not json", "application/json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .request::<serde_json::Value>(&UserId::from("u1"), &spec())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Decode(_)), "got {err:?}");
    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
}
