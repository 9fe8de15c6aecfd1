//! Identity resolver
//!
//! Resolves an access token to the provider's external user id through the
//! GraphQL-style `{me{externalID}}` query.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error};

use super::types::{IdentityError, IdentityResult};
use crate::{Error, Result};

/// Query sent to the identity endpoint
const EXTERNAL_ID_QUERY: &str = "{me{externalID}}";

#[derive(Debug, Default, Deserialize)]
struct MeEnvelope {
    #[serde(default)]
    data: Option<MeData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct MeData {
    me: Option<Me>,
}

#[derive(Debug, Deserialize)]
struct Me {
    #[serde(rename = "externalID")]
    external_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    extensions: Option<GraphQlExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQlExtensions {
    #[serde(default)]
    code: Value,
}

impl GraphQlError {
    /// Error code as a string; providers send both `"404"` and `404`.
    fn code(&self) -> String {
        match self.extensions.as_ref().map(|e| &e.code) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// Client for the provider's identity endpoint
#[derive(Clone)]
pub struct IdentityResolver {
    http_client: Client,
    identity_url: String,
}

impl IdentityResolver {
    /// Create a resolver querying `identity_url`.
    #[must_use]
    pub fn new(http_client: Client, identity_url: impl Into<String>) -> Self {
        Self {
            http_client,
            identity_url: identity_url.into(),
        }
    }

    /// Resolve `access_token` to an external identity.
    ///
    /// A non-empty `errors` array wins over any `data`, whatever the HTTP
    /// status; a non-success status without errors yields an
    /// [`IdentityError`] with empty message and code.
    ///
    /// # Errors
    ///
    /// Returns an error when no response arrives, or when a successful
    /// response carries neither errors nor an external id.
    pub async fn resolve_identity(&self, access_token: &str) -> Result<IdentityResult> {
        let response = self
            .http_client
            .post(&self.identity_url)
            .bearer_auth(access_token)
            .json(&json!({ "query": EXTERNAL_ID_QUERY }))
            .send()
            .await
            .inspect_err(|e| error!(error = %e, url = %self.identity_url, "Identity request failed"))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let envelope: Option<MeEnvelope> = serde_json::from_str(&body).ok();

        if let Some(first) = envelope.as_ref().and_then(|e| e.errors.first()) {
            debug!(status = %status, message = %first.message, "Identity query returned errors");
            return Ok(IdentityResult::Error(IdentityError {
                http_status: status.as_u16(),
                message: first.message.clone(),
                code: first.code(),
            }));
        }

        if !status.is_success() {
            debug!(status = %status, "Identity endpoint rejected request");
            return Ok(IdentityResult::Error(IdentityError {
                http_status: status.as_u16(),
                message: String::new(),
                code: String::new(),
            }));
        }

        let external_id = envelope
            .and_then(|e| e.data)
            .and_then(|d| d.me)
            .and_then(|me| me.external_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Protocol("identity response has no externalID".to_string()))?;

        Ok(IdentityResult::Identity { external_id })
    }
}
