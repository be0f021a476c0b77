//! Stream-token lifecycle tests against a mock access-check endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stream_access::{HeaderProvider, MediaType, StreamTokenManager};

fn plain_client() -> Arc<ClientWithMiddleware> {
    let _ = env_logger::builder().is_test(true).try_init();
    Arc::new(ClientBuilder::new(reqwest::Client::new()).build())
}

fn session_headers(token: &str) -> HeaderProvider {
    let token = token.to_string();
    Arc::new(move || HashMap::from([("X-Wallet-Session".to_string(), token.clone())]))
}

async fn access_check_hits(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with("/stream/access-check/"))
        .count()
}

async fn mount_access_check(server: &MockServer, asset_id: &str, expires_in: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/stream/access-check/{asset_id}")))
        .and(header("X-Wallet-Session", "tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "streamToken": "stream-tok",
            "expiresIn": expires_in,
            "mediaType": "video",
            "mimeType": "video/mp4"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetch_returns_playback_url_and_tracks_token() {
    let server = MockServer::start().await;
    mount_access_check(&server, "asset1", 120).await;

    let manager = StreamTokenManager::new(plain_client(), server.uri(), session_headers("tok1"));

    let url = manager
        .fetch_stream_token("asset1")
        .await
        .expect("token granted");

    assert_eq!(url, format!("{}/stream/asset1?token=stream-tok", server.uri()));
    assert_eq!(manager.stream_url().as_deref(), Some(url.as_str()));
    assert!(manager.is_token_valid());
    assert_eq!(manager.last_error(), None);

    let token = manager.current_token().expect("tracked token");
    assert_eq!(token.expires_in, 120);
    assert_eq!(token.media_type, MediaType::Video);
    assert_eq!(token.mime_type, "video/mp4");
}

#[tokio::test]
async fn fetch_defaults_expires_in_when_server_omits_it() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stream/access-check/asset1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "streamToken": "stream-tok"
        })))
        .mount(&server)
        .await;

    let manager = StreamTokenManager::new(plain_client(), server.uri(), session_headers("tok1"));

    manager.fetch_stream_token("asset1").await.expect("token");

    assert_eq!(manager.current_token().expect("token").expires_in, 120);
}

#[tokio::test]
async fn fetch_without_session_issues_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stream/access-check/asset1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let no_session: HeaderProvider = Arc::new(HashMap::new);
    let manager = StreamTokenManager::new(plain_client(), server.uri(), no_session);

    assert_eq!(manager.fetch_stream_token("asset1").await, None);
    assert_eq!(manager.last_error().as_deref(), Some("Not authenticated"));
}

#[tokio::test]
async fn fetch_denied_by_server_sets_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stream/access-check/asset1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": "no active entitlement"
        })))
        .mount(&server)
        .await;

    let manager = StreamTokenManager::new(plain_client(), server.uri(), session_headers("tok1"));

    assert_eq!(manager.fetch_stream_token("asset1").await, None);
    let err = manager.last_error().expect("error recorded");
    assert!(err.contains("no active entitlement"), "got: {err}");
    assert!(!manager.is_token_valid());
}

#[tokio::test]
async fn fetch_http_failure_sets_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stream/access-check/asset1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "error": "forbidden" })))
        .mount(&server)
        .await;

    let manager = StreamTokenManager::new(plain_client(), server.uri(), session_headers("tok1"));

    assert_eq!(manager.fetch_stream_token("asset1").await, None);
    let err = manager.last_error().expect("error recorded");
    assert!(err.contains("403"), "got: {err}");
}

#[tokio::test]
async fn renewal_refetches_same_asset_before_expiry() {
    let server = MockServer::start().await;
    // 2s lifetime: renewal fires at 1.5s.
    mount_access_check(&server, "asset1", 2).await;

    let manager = StreamTokenManager::new(plain_client(), server.uri(), session_headers("tok1"));
    manager.fetch_stream_token("asset1").await.expect("token");
    assert_eq!(access_check_hits(&server).await, 1);

    tokio::time::sleep(Duration::from_millis(2200)).await;

    // At least one renewal has fired, against the same asset id.
    assert!(access_check_hits(&server).await >= 2);
    // The tracked token is the renewed one, not the original.
    let token = manager.current_token().expect("token");
    assert!(token.fetched_at.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn clear_token_cancels_pending_renewal() {
    let server = MockServer::start().await;
    // 1s lifetime: renewal would fire at 750ms.
    mount_access_check(&server, "asset1", 1).await;

    let manager = StreamTokenManager::new(plain_client(), server.uri(), session_headers("tok1"));
    manager.fetch_stream_token("asset1").await.expect("token");
    manager.clear_token();

    tokio::time::sleep(Duration::from_millis(1200)).await;

    // The scheduled renewal never ran.
    assert_eq!(access_check_hits(&server).await, 1);
    assert!(!manager.is_token_valid());
    assert_eq!(manager.stream_url(), None);
}

#[tokio::test]
async fn dropping_manager_cancels_pending_renewal() {
    let server = MockServer::start().await;
    mount_access_check(&server, "asset1", 1).await;

    let manager = StreamTokenManager::new(plain_client(), server.uri(), session_headers("tok1"));
    manager.fetch_stream_token("asset1").await.expect("token");
    drop(manager);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert_eq!(access_check_hits(&server).await, 1);
}

#[tokio::test]
async fn refresh_token_refetches_tracked_asset() {
    let server = MockServer::start().await;
    mount_access_check(&server, "asset1", 120).await;

    let manager = StreamTokenManager::new(plain_client(), server.uri(), session_headers("tok1"));
    manager.fetch_stream_token("asset1").await.expect("token");

    let url = manager.refresh_token().await.expect("refreshed");

    assert!(url.contains("asset1"));
    assert_eq!(access_check_hits(&server).await, 2);
}

#[tokio::test]
async fn new_fetch_replaces_tracked_asset() {
    let server = MockServer::start().await;
    mount_access_check(&server, "asset1", 120).await;
    mount_access_check(&server, "asset2", 120).await;

    let manager = StreamTokenManager::new(plain_client(), server.uri(), session_headers("tok1"));
    manager.fetch_stream_token("asset1").await.expect("token");
    manager.fetch_stream_token("asset2").await.expect("token");

    let url = manager.stream_url().expect("url");
    assert!(url.contains("asset2"), "got: {url}");
}
