//! Webhook token verification.
//!
//! Webhook calls carry an ES256-signed JWT in `Authorization: Bearer`. The
//! verifier reads the unverified `kid` header to pick a key, then checks the
//! signature, `iss`, `aud` and (unless disabled) `exp`. `iat` is not checked.
//!
//! Every failure mode is reported to callers as a plain "not verified"; the
//! reason is only surfaced through [`VerificationFailure`] for logging.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::jwks::{Jwk, JwkSet};

/// Claims read from a verified webhook token.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookClaims {
    /// Issuer
    pub iss: String,
    /// Audience (string or array)
    #[serde(default)]
    pub aud: Value,
    /// Expiry, as sent (validated by `jsonwebtoken` unless expiry is ignored)
    #[serde(default)]
    pub exp: Option<Value>,
    /// Issued-at, as sent; never validated
    #[serde(default)]
    pub iat: Option<Value>,
    /// Lowercase hex SHA-256 of the request body, when the sender includes it
    #[serde(default)]
    pub hash: Option<String>,
}

/// Why a token was rejected.
#[derive(Debug, thiserror::Error)]
pub enum VerificationFailure {
    /// Token string was empty
    #[error("empty token")]
    EmptyToken,
    /// No keys to verify against
    #[error("empty keystore")]
    EmptyKeystore,
    /// Expected audience was empty
    #[error("no expected audience configured")]
    EmptyAudience,
    /// Header could not be read or has no `kid`
    #[error("malformed token header")]
    MalformedHeader,
    /// `kid` not in the keystore
    #[error("no key for kid '{0}'")]
    UnknownKeyId(String),
    /// Key is not a P-256 EC key
    #[error("unsupported key type {kty}/{crv}")]
    UnsupportedKey {
        /// Key type
        kty: String,
        /// Curve
        crv: String,
    },
    /// Signature or claim validation failed
    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),
}

/// Verifies webhook tokens against a fixed issuer.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    issuer: String,
}

impl WebhookVerifier {
    /// Create a verifier expecting `iss == issuer`.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// Read the `kid` from the token header without verifying anything.
    ///
    /// Returns `None` for tokens that do not have exactly three segments,
    /// whose header does not decode, or whose header has no non-empty `kid`.
    #[must_use]
    pub fn extract_key_id(raw_token: &str) -> Option<String> {
        if raw_token.split('.').count() != 3 {
            return None;
        }

        jsonwebtoken::decode_header(raw_token)
            .ok()?
            .kid
            .filter(|kid| !kid.is_empty())
    }

    /// Verify `raw_token` and report only whether it passed.
    #[must_use]
    pub fn verify(
        &self,
        raw_token: &str,
        keys: &JwkSet,
        expected_audience: &str,
        ignore_expiry: bool,
    ) -> bool {
        match self.verify_claims(raw_token, keys, expected_audience, ignore_expiry) {
            Ok(_) => true,
            Err(reason) => {
                debug!(reason = %reason, "Webhook token failed verification");
                false
            }
        }
    }

    /// Verify `raw_token` and return its claims.
    ///
    /// # Errors
    ///
    /// Returns the first failing check. Checks run in order: input
    /// presence, key selection, then signature and claims together.
    pub fn verify_claims(
        &self,
        raw_token: &str,
        keys: &JwkSet,
        expected_audience: &str,
        ignore_expiry: bool,
    ) -> Result<WebhookClaims, VerificationFailure> {
        if raw_token.is_empty() {
            return Err(VerificationFailure::EmptyToken);
        }
        if keys.is_empty() {
            return Err(VerificationFailure::EmptyKeystore);
        }
        if expected_audience.is_empty() {
            return Err(VerificationFailure::EmptyAudience);
        }

        let kid = Self::extract_key_id(raw_token).ok_or(VerificationFailure::MalformedHeader)?;
        let jwk = keys
            .get(&kid)
            .ok_or_else(|| VerificationFailure::UnknownKeyId(kid.clone()))?;
        let decoding_key = decoding_key(jwk)?;

        let validation = self.validation(expected_audience, ignore_expiry);
        let data = jsonwebtoken::decode::<WebhookClaims>(raw_token, &decoding_key, &validation)?;

        Ok(data.claims)
    }

    fn validation(&self, expected_audience: &str, ignore_expiry: bool) -> Validation {
        let mut v = Validation::new(Algorithm::ES256);
        v.set_issuer(&[self.issuer.as_str()]);
        v.set_audience(&[expected_audience]);
        v.validate_exp = !ignore_expiry;
        v.validate_nbf = false;
        v.leeway = 0;
        if ignore_expiry {
            v.set_required_spec_claims(&["iss", "aud"]);
        } else {
            v.set_required_spec_claims(&["exp", "iss", "aud"]);
        }
        v
    }
}

fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, VerificationFailure> {
    if jwk.key_type != "EC" || jwk.curve != "P-256" {
        return Err(VerificationFailure::UnsupportedKey {
            kty: jwk.key_type.clone(),
            crv: jwk.curve.clone(),
        });
    }
    Ok(DecodingKey::from_ec_components(
        &jwk.x_coordinate,
        &jwk.y_coordinate,
    )?)
}
