//! HTTP router and shared state

use std::sync::Arc;

use axum::{
    BoxError, Json, Router,
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower::{ServiceBuilder, timeout::TimeoutLayer};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::warn;

use super::handlers::{access_token_handler, custom_token_handler, update_user_handler};
use crate::Result;
use crate::config::{Config, ServerConfig, WebhookConfig};
use crate::credentials::{CredentialIssuer, CustomTokenIssuer};
use crate::oauth::{IdentityResolver, TokenExchangeClient};
use crate::secrets::SecretCache;
use crate::users::{HttpUserDirectory, UserDirectory};
use crate::webhook::{JwksCache, WebhookVerifier};

/// Shared application state
///
/// Built once at startup and handed to every request. The secret cache and
/// the JWKS cache are the only state shared between requests.
pub struct AppState {
    /// Secret cache (client secret, signing key, admin token)
    pub secrets: Arc<SecretCache>,
    /// Reference of the OAuth client secret in the secret store
    pub client_secret_ref: String,
    /// Provider token endpoint client
    pub token_client: TokenExchangeClient,
    /// Provider identity endpoint client
    pub identity: IdentityResolver,
    /// Provider JWKS snapshot cache
    pub jwks: Arc<JwksCache>,
    /// Webhook token verifier
    pub verifier: WebhookVerifier,
    /// Webhook verification settings
    pub webhook: WebhookConfig,
    /// Custom credential issuer
    pub credentials: Arc<dyn CredentialIssuer>,
    /// Local user directory
    pub users: Arc<dyn UserDirectory>,
}

impl AppState {
    /// Wire every collaborator from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the outbound HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = config.provider.http_client()?;
        let secrets = Arc::new(SecretCache::from_config(&config.secrets, http.clone()));

        let credentials: Arc<dyn CredentialIssuer> = Arc::new(CustomTokenIssuer::new(
            &config.credentials,
            Arc::clone(&secrets),
        ));
        let users: Arc<dyn UserDirectory> = Arc::new(HttpUserDirectory::new(
            http.clone(),
            config.users.base_url.clone(),
            config.users.admin_token_ref.clone(),
            Arc::clone(&secrets),
        ));

        Ok(Self {
            client_secret_ref: config.secrets.client_secret_ref.clone(),
            token_client: TokenExchangeClient::new(
                http.clone(),
                config.provider.token_url.clone(),
                config.provider.client_id.clone(),
            ),
            identity: IdentityResolver::new(http.clone(), config.provider.identity_url.clone()),
            jwks: Arc::new(JwksCache::new(http, config.provider.jwks_url.clone())),
            verifier: WebhookVerifier::new(config.webhook.issuer.clone()),
            webhook: config.webhook.clone(),
            secrets,
            credentials,
            users,
        })
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/access-token", post(access_token_handler))
        .route("/custom-token", post(custom_token_handler))
        .route("/webhook/update-user", post(update_user_handler))
        .layer(DefaultBodyLimit::max(server.max_body_size))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(server.request_timeout)),
        )
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_middleware_error(err: BoxError) -> (StatusCode, Json<Value>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        warn!("Request timed out");
        return (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({"error": "timeout", "errorDescription": "request timed out"})),
        );
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "unexpected", "errorDescription": err.to_string()})),
    )
}

/// GET /health
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
