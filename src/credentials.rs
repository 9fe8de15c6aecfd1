//! Custom credential issuance
//!
//! After the provider identity has been mapped to a local id, the bridge
//! hands the client a signed custom token that the local authentication
//! system accepts for sign-in.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CredentialsConfig;
use crate::secrets::SecretCache;
use crate::{Error, Result};

/// Issues opaque credentials for a local identity.
#[async_trait]
pub trait CredentialIssuer: Send + Sync + 'static {
    /// Issue a credential for `local_id`.
    async fn issue(&self, local_id: &str) -> Result<String>;
}

/// Claims of an issued custom token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTokenClaims {
    /// Service account
    pub iss: String,
    /// Service account
    pub sub: String,
    /// Local identity toolkit audience
    pub aud: String,
    /// Issued-at (Unix seconds)
    pub iat: u64,
    /// Expiry (Unix seconds)
    pub exp: u64,
    /// Local identity
    pub uid: String,
}

/// Signs custom tokens with a service-account key held in the secret store.
pub struct CustomTokenIssuer {
    service_account_email: String,
    private_key_ref: String,
    algorithm: Algorithm,
    audience: String,
    lifetime: Duration,
    secrets: Arc<SecretCache>,
}

impl CustomTokenIssuer {
    /// Create an issuer from configuration.
    #[must_use]
    pub fn new(config: &CredentialsConfig, secrets: Arc<SecretCache>) -> Self {
        Self {
            service_account_email: config.service_account_email.clone(),
            private_key_ref: config.private_key_ref.clone(),
            algorithm: config.algorithm,
            audience: config.audience.clone(),
            lifetime: config.lifetime,
            secrets,
        }
    }

    fn claims(&self, local_id: &str, now: u64) -> CustomTokenClaims {
        CustomTokenClaims {
            iss: self.service_account_email.clone(),
            sub: self.service_account_email.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + self.lifetime.as_secs(),
            uid: local_id.to_string(),
        }
    }
}

#[async_trait]
impl CredentialIssuer for CustomTokenIssuer {
    async fn issue(&self, local_id: &str) -> Result<String> {
        if local_id.is_empty() {
            return Err(Error::Credential("local identity is empty".to_string()));
        }

        let pem = self.secrets.get_secret(&self.private_key_ref).await?;
        let key = encoding_key(self.algorithm, pem.as_bytes())?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();

        let token = jsonwebtoken::encode(
            &Header::new(self.algorithm),
            &self.claims(local_id, now),
            &key,
        )?;

        debug!(uid = %local_id, "Issued custom token");
        Ok(token)
    }
}

/// Build the signing key for `algorithm` from PEM (or raw secret for HMAC).
fn encoding_key(algorithm: Algorithm, pem: &[u8]) -> Result<EncodingKey> {
    let key = match algorithm {
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(pem),
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(EncodingKey::from_secret(pem)),
        _ => EncodingKey::from_rsa_pem(pem),
    };
    key.map_err(|e| Error::Credential(format!("invalid signing key: {e}")))
}
