//! Token exchange client
//!
//! Trades an authorization code plus PKCE verifier for provider tokens with a
//! single POST to the token endpoint. There are no retries.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use tracing::{debug, error, warn};

use super::types::{AccessTokenDenied, AccessTokenGranted, AccessTokenRequest, AccessTokenResult};
use crate::{Error, Result};

/// OAuth error body (RFC 6749 §5.2)
#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Client for the provider's token endpoint
#[derive(Clone)]
pub struct TokenExchangeClient {
    http_client: Client,
    token_url: String,
    client_id: String,
}

impl TokenExchangeClient {
    /// Create a client for `token_url` registered as `client_id`.
    #[must_use]
    pub fn new(http_client: Client, token_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            http_client,
            token_url: token_url.into(),
            client_id: client_id.into(),
        }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// A 200 yields [`AccessTokenResult::Granted`]; any other status yields
    /// [`AccessTokenResult::Denied`] carrying the provider's `error` and
    /// `error_description` verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error when no response arrives at all, or when a 200 body
    /// cannot be read as a token response.
    pub async fn exchange(
        &self,
        request: &AccessTokenRequest,
        client_secret: &str,
    ) -> Result<AccessTokenResult> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", request.code()),
            ("redirect_uri", request.redirect_uri()),
            ("code_verifier", request.code_verifier()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .header(header::AUTHORIZATION, self.basic_authorization(client_secret))
            .form(&form)
            .send()
            .await
            .inspect_err(|e| error!(error = %e, url = %self.token_url, "Token request failed"))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let parsed: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_else(|e| {
                warn!(status = %status, error = %e, "Token endpoint error body is not JSON");
                TokenErrorResponse::default()
            });
            debug!(status = %status, error = %parsed.error, "Token exchange denied");
            return Ok(AccessTokenResult::Denied(AccessTokenDenied {
                http_status: status.as_u16(),
                error_code: parsed.error,
                error_description: parsed.error_description,
            }));
        }

        let granted: AccessTokenGranted = response
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("Failed to parse token response: {e}")))?;

        debug!(token_type = %granted.token_type, expires_in = granted.expires_in, "Token exchange granted");
        Ok(AccessTokenResult::Granted(granted))
    }

    /// `Basic base64(client_id:client_secret)`
    fn basic_authorization(&self, client_secret: &str) -> String {
        let credentials = format!("{}:{client_secret}", self.client_id);
        format!("Basic {}", STANDARD.encode(credentials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_authorization_encodes_client_credentials() {
        let client = TokenExchangeClient::new(Client::new(), "https://idp/token", "my-client");
        // base64("my-client:s3cret")
        assert_eq!(
            client.basic_authorization("s3cret"),
            "Basic bXktY2xpZW50OnMzY3JldA=="
        );
    }

    #[test]
    fn error_body_fields_default_to_empty() {
        let parsed: TokenErrorResponse = serde_json::from_str(r#"{"error":"invalid_grant"}"#).unwrap();
        assert_eq!(parsed.error, "invalid_grant");
        assert_eq!(parsed.error_description, "");
    }
}
