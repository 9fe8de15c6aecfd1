//! Secret-manager source and cache behavior against a mock REST endpoint

use std::time::Duration;

use login_bridge::Error;
use login_bridge::secrets::{SecretCache, SecretManagerSource, SecretSource};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACCESS_PATH: &str = "/secrets/CLIENT_SECRET/versions/latest:access";

fn source_for(server: &MockServer) -> SecretManagerSource {
    SecretManagerSource::new(reqwest::Client::new(), format!("{}/secrets/", server.uri()))
}

#[tokio::test]
async fn test_fetch_decodes_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCESS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "secrets/CLIENT_SECRET/versions/3",
            "payload": { "data": "czNjcmV0" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let value = source_for(&server).fetch("CLIENT_SECRET").await.unwrap();

    assert_eq!(value, "s3cret");
}

#[tokio::test]
async fn test_fetch_without_payload_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCESS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "x" })))
        .mount(&server)
        .await;

    let err = source_for(&server).fetch("CLIENT_SECRET").await.unwrap_err();

    assert!(matches!(err, Error::Secret(ref m) if m.contains("has no payload")), "{err}");
}

#[tokio::test]
async fn test_fetch_rejects_invalid_base64() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCESS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "payload": { "data": "not*base64!" }
        })))
        .mount(&server)
        .await;

    let err = source_for(&server).fetch("CLIENT_SECRET").await.unwrap_err();

    assert!(matches!(err, Error::Secret(ref m) if m.contains("not base64")), "{err}");
}

#[tokio::test]
async fn test_fetch_surfaces_upstream_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCESS_PATH))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = source_for(&server).fetch("CLIENT_SECRET").await.unwrap_err();

    assert!(matches!(err, Error::Secret(ref m) if m.contains("403")), "{err}");
}

#[tokio::test]
async fn test_cache_does_not_keep_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCESS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let cache = SecretCache::new(source_for(&server), Duration::from_secs(600));

    assert!(cache.get_secret("CLIENT_SECRET").await.is_err());
    assert!(cache.get_secret("CLIENT_SECRET").await.is_err());
}

#[tokio::test]
async fn test_cache_serves_repeat_reads_from_memory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCESS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "payload": { "data": "czNjcmV0" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = SecretCache::new(source_for(&server), Duration::from_secs(600));

    assert_eq!(cache.get_secret("CLIENT_SECRET").await.unwrap(), "s3cret");
    assert_eq!(cache.get_secret("CLIENT_SECRET").await.unwrap(), "s3cret");
}
