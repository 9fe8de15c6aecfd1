//! HTTP handlers for the bridge endpoints.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/access-token` | Exchange an authorization code + PKCE verifier for provider tokens |
//! | `POST` | `/custom-token` | Turn a provider access token into a local custom token |
//! | `POST` | `/webhook/update-user` | Signed provider notification about a user |
//!
//! Client errors use the body `{"error": "<code>", "errorDescription": "<text>"}`.
//! Webhook authentication failures always answer `401 {"error": "unauthorized"}`
//! and keep the reason in the logs only.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::router::AppState;
use crate::Error;
use crate::oauth::{AccessTokenRequest, AccessTokenResult, IdentityError, IdentityResult, to_local_identity};
use crate::webhook::{UpdateOutcome, WebhookUpdateEvent, WebhookVerifier, body_hash};

// ── Request bodies ─────────────────────────────────────────────────────────

/// `POST /access-token` body, JSON or form encoded.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessTokenBody {
    code: Option<String>,
    code_verifier: Option<String>,
    redirect_uri: Option<String>,
}

/// `POST /custom-token` body, JSON or form encoded.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomTokenBody {
    access_token: Option<String>,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// `POST /access-token`
pub async fn access_token_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: AccessTokenBody = match parse_body(&headers, &body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let request = match AccessTokenRequest::new(
        body.code.as_deref(),
        body.code_verifier.as_deref(),
        body.redirect_uri.as_deref(),
    ) {
        Ok(r) => r,
        Err(Error::InvalidRequest(description)) => {
            return error_response(StatusCode::BAD_REQUEST, "invalid_payload", &description);
        }
        Err(e) => return unexpected(&e),
    };

    let client_secret = match state.secrets.get_secret(&state.client_secret_ref).await {
        Ok(s) => s,
        Err(e) => {
            error!(
                secret_ref = %state.client_secret_ref,
                error = %e,
                "OAuth client secret unavailable; configure it in the secret store"
            );
            return error_response(
                StatusCode::BAD_REQUEST,
                "missing_config",
                "client secret configuration missing",
            );
        }
    };

    match state.token_client.exchange(&request, &client_secret).await {
        Ok(AccessTokenResult::Granted(granted)) => {
            info!(token_type = %granted.token_type, expires_in = granted.expires_in, "Access token granted");
            (
                StatusCode::OK,
                Json(json!({
                    "accessToken": granted.access_token,
                    "tokenType": granted.token_type,
                    "expiresIn": granted.expires_in,
                    "scope": granted.scope,
                })),
            )
                .into_response()
        }
        Ok(AccessTokenResult::Denied(denied)) => {
            warn!(
                status = denied.http_status,
                error_code = %denied.error_code,
                "Provider rejected access token exchange"
            );
            error_response(
                denial_status(denied.http_status),
                &denied.error_code,
                &denied.error_description,
            )
        }
        Err(e) => unexpected(&e),
    }
}

/// `POST /custom-token`
pub async fn custom_token_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: CustomTokenBody = match parse_body(&headers, &body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let access_token = body.access_token.as_deref().map(str::trim).unwrap_or_default();
    if access_token.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "invalid_payload", "accessToken missing");
    }

    let external_id = match state.identity.resolve_identity(access_token).await {
        Ok(IdentityResult::Identity { external_id }) => external_id,
        Ok(IdentityResult::Error(e)) => return identity_error_response(&e),
        Err(e) => return unexpected(&e),
    };

    let local_id = to_local_identity(&external_id);
    match state.credentials.issue(&local_id).await {
        Ok(custom_token) => {
            info!(uid = %local_id, "Custom token issued");
            (StatusCode::OK, Json(json!({ "customToken": custom_token }))).into_response()
        }
        Err(e) => unexpected(&e),
    }
}

/// `POST /webhook/update-user`
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        warn!("Webhook call without bearer token");
        return unauthorized();
    };

    let Some(kid) = WebhookVerifier::extract_key_id(token) else {
        warn!("Webhook token header is malformed");
        return unauthorized();
    };

    let keys = match state.jwks.get_jwks(&kid).await {
        Ok(keys) => keys,
        Err(e) => {
            warn!(kid = %kid, error = %e, "No verification key for webhook token");
            return unauthorized();
        }
    };

    let claims = match state.verifier.verify_claims(
        token,
        &keys,
        &state.webhook.audience,
        state.webhook.ignore_expiry,
    ) {
        Ok(c) => c,
        Err(reason) => {
            warn!(kid = %kid, reason = %reason, "Webhook token failed verification");
            return unauthorized();
        }
    };

    match claims.hash.as_deref() {
        Some(expected) if !expected.eq_ignore_ascii_case(&body_hash(&body)) => {
            warn!(kid = %kid, "Webhook body does not match signed hash");
            return unauthorized();
        }
        None if state.webhook.require_body_hash => {
            warn!(kid = %kid, "Webhook token carries no body hash");
            return unauthorized();
        }
        _ => {}
    }

    let event: WebhookUpdateEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            debug!(error = %e, "Undecodable webhook body");
            return error_response(StatusCode::BAD_REQUEST, "invalid_payload", "invalid argument");
        }
    };

    match event.apply(state.users.as_ref()).await {
        Ok(UpdateOutcome::UserDeleted { local_id }) => {
            (StatusCode::OK, Json(json!({ "status": "deleted", "uid": local_id }))).into_response()
        }
        Ok(UpdateOutcome::Ignored) => (StatusCode::OK, Json(json!({ "status": "ignored" }))).into_response(),
        Err(e) => unexpected(&e),
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Decode a JSON or form body according to `Content-Type`.
fn parse_body<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8]) -> Result<T, Response> {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let parsed = match mime.as_str() {
        "application/json" => serde_json::from_slice(body).map_err(|e| e.to_string()),
        "application/x-www-form-urlencoded" => serde_urlencoded::from_bytes(body).map_err(|e| e.to_string()),
        _ => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "invalid_payload",
                "unsupported Content-Type",
            ));
        }
    };

    parsed.map_err(|reason| {
        debug!(content_type = %mime, reason = %reason, "Undecodable request body");
        error_response(StatusCode::BAD_REQUEST, "invalid_payload", "invalid argument")
    })
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn identity_error_response(e: &IdentityError) -> Response {
    warn!(
        status = e.http_status,
        code = %e.code,
        message = %e.message,
        "Identity lookup rejected access token"
    );
    let rejected_token = matches!(e.http_status, 200..=299 | 401 | 403);
    if rejected_token {
        let description: &str = if e.message.is_empty() { "access token rejected" } else { &e.message };
        error_response(StatusCode::UNAUTHORIZED, "invalid_access_token", description)
    } else {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "unexpected", "unexpected error")
    }
}

/// Upstream denial status to forward; anything but 4xx/5xx becomes 502.
fn denial_status(upstream: u16) -> StatusCode {
    StatusCode::from_u16(upstream)
        .ok()
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

fn error_response(status: StatusCode, code: &str, description: &str) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "errorDescription": description,
        })),
    )
        .into_response()
}

fn unexpected(e: &Error) -> Response {
    error!(error = %e, "Request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "unexpected", "unexpected error")
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))).into_response()
}
