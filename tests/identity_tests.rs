//! Identity lookup and local identity mapping

use login_bridge::oauth::{IdentityError, IdentityResolver, IdentityResult, to_local_identity};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver(server: &MockServer) -> IdentityResolver {
    IdentityResolver::new(reqwest::Client::new(), format!("{}/v1/me", server.uri()))
}

#[tokio::test]
async fn test_resolves_external_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/me"))
        .and(header("authorization", "Bearer tok1"))
        .and(body_json(json!({ "query": "{me{externalID}}" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "me": { "externalID": "CAESIP+uTk/wZ1T3bU2h==" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = resolver(&server).resolve_identity("tok1").await.unwrap();
    assert_eq!(
        result,
        IdentityResult::Identity {
            external_id: "CAESIP+uTk/wZ1T3bU2h==".to_string()
        }
    );
}

#[tokio::test]
async fn test_graphql_errors_win_over_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [
                { "message": "not found", "extensions": { "code": "404" } },
                { "message": "second", "extensions": { "code": "500" } }
            ]
        })))
        .mount(&server)
        .await;

    let result = resolver(&server).resolve_identity("tok1").await.unwrap();
    assert_eq!(
        result,
        IdentityResult::Error(IdentityError {
            http_status: 200,
            message: "not found".to_string(),
            code: "404".to_string(),
        })
    );
}

#[tokio::test]
async fn test_unauthorized_without_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let result = resolver(&server).resolve_identity("expired").await.unwrap();
    assert_eq!(
        result,
        IdentityResult::Error(IdentityError {
            http_status: 401,
            message: String::new(),
            code: String::new(),
        })
    );
}

#[tokio::test]
async fn test_missing_external_id_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "me": {} } })))
        .mount(&server)
        .await;

    let result = resolver(&server).resolve_identity("tok1").await;
    assert!(matches!(result, Err(login_bridge::Error::Protocol(_))));
}

#[test]
fn test_local_identity_is_url_safe_without_padding() {
    assert_eq!(to_local_identity("ab+c/d=="), "ab-c_d");
    assert_eq!(to_local_identity("CAESIP+uTk/wZ1T3bU2h=="), "CAESIP-uTk_wZ1T3bU2h");
    assert_eq!(to_local_identity("plain"), "plain");
    assert_eq!(to_local_identity(""), "");
}

#[test]
fn test_local_identity_is_idempotent() {
    let once = to_local_identity("a+/b==");
    assert_eq!(to_local_identity(&once), once);
}
