//! User lifecycle collaborator
//!
//! The bridge never stores accounts itself; it only asks the local identity
//! system to remove one when the provider reports a deletion.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, error};

use crate::secrets::SecretCache;
use crate::{Error, Result};

/// Deletes or deactivates local accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Remove the account for `local_id`.
    ///
    /// Removing an account that does not exist is not an error.
    async fn delete_user(&self, local_id: &str) -> Result<()>;
}

/// User directory reached over an admin REST API.
///
/// Issues `DELETE {base_url}/users/{local_id}` with a bearer admin token read
/// through the [`SecretCache`].
pub struct HttpUserDirectory {
    http: Client,
    base_url: String,
    admin_token_ref: String,
    secrets: Arc<SecretCache>,
}

impl HttpUserDirectory {
    /// Create a directory client.
    #[must_use]
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        admin_token_ref: impl Into<String>,
        secrets: Arc<SecretCache>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_token_ref: admin_token_ref.into(),
            secrets,
        }
    }

    fn user_url(&self, local_id: &str) -> String {
        format!("{}/users/{local_id}", self.base_url)
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn delete_user(&self, local_id: &str) -> Result<()> {
        let token = self.secrets.get_secret(&self.admin_token_ref).await?;

        let response = self
            .http
            .delete(self.user_url(local_id))
            .bearer_auth(token)
            .send()
            .await
            .inspect_err(|e| error!(error = %e, "User directory request failed"))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!(local_id = %local_id, status = %status, "User removed");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::UserDirectory(format!(
            "delete of '{local_id}' failed: HTTP {status} - {body}"
        )))
    }
}
