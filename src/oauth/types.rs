//! Request and result types shared by the token exchange and identity lookup.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// PKCE authorization-code exchange parameters supplied by the client.
///
/// Construct through [`AccessTokenRequest::new`], which trims every field and
/// rejects empty ones before any network call can happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenRequest {
    code: String,
    code_verifier: String,
    redirect_uri: String,
}

impl AccessTokenRequest {
    /// Validate and build a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] with `code missing`,
    /// `codeVerifier missing` or `redirectUri missing` for the first field
    /// that is absent or blank.
    pub fn new(
        code: Option<&str>,
        code_verifier: Option<&str>,
        redirect_uri: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            code: required(code, "code missing")?,
            code_verifier: required(code_verifier, "codeVerifier missing")?,
            redirect_uri: required(redirect_uri, "redirectUri missing")?,
        })
    }

    /// Authorization code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// PKCE code verifier
    #[must_use]
    pub fn code_verifier(&self) -> &str {
        &self.code_verifier
    }

    /// Redirect URI used in the authorization request
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }
}

fn required(value: Option<&str>, missing: &str) -> Result<String> {
    let trimmed = value.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(Error::InvalidRequest(missing.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Tokens granted by the provider, taken verbatim from its response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenGranted {
    /// `access_token`
    pub access_token: String,
    /// `token_type`
    pub token_type: String,
    /// `expires_in` (seconds)
    pub expires_in: u64,
    /// `refresh_token`
    #[serde(default)]
    pub refresh_token: String,
    /// `scope`
    #[serde(default)]
    pub scope: String,
}

/// Structured rejection from the provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenDenied {
    /// HTTP status returned by the provider
    pub http_status: u16,
    /// OAuth `error` code
    pub error_code: String,
    /// OAuth `error_description`
    pub error_description: String,
}

/// Outcome of one exchange attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTokenResult {
    /// The provider issued tokens
    Granted(AccessTokenGranted),
    /// The provider refused the exchange
    Denied(AccessTokenDenied),
}

/// Failure reported while resolving an access token to an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityError {
    /// HTTP status returned by the identity endpoint
    pub http_status: u16,
    /// First error message (empty when the provider gave none)
    pub message: String,
    /// First error code (empty when the provider gave none)
    pub code: String,
}

/// Outcome of one identity lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityResult {
    /// The provider's external identity for the token holder
    Identity {
        /// Standard-base64 external id
        external_id: String,
    },
    /// The provider reported an error
    Error(IdentityError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_fields() {
        let req =
            AccessTokenRequest::new(Some(" abc "), Some("xyz\n"), Some(" https://app/cb")).unwrap();
        assert_eq!(req.code(), "abc");
        assert_eq!(req.code_verifier(), "xyz");
        assert_eq!(req.redirect_uri(), "https://app/cb");
    }

    #[test]
    fn new_reports_first_missing_field() {
        let cases = [
            ((None, Some("v"), Some("r")), "code missing"),
            ((Some("   "), Some("v"), Some("r")), "code missing"),
            ((Some("c"), Some(""), Some("r")), "codeVerifier missing"),
            ((Some("c"), None, None), "codeVerifier missing"),
            ((Some("c"), Some("v"), Some("\t")), "redirectUri missing"),
        ];

        for ((code, verifier, redirect), expected) in cases {
            let err = AccessTokenRequest::new(code, verifier, redirect).unwrap_err();
            match err {
                Error::InvalidRequest(msg) => assert_eq!(msg, expected),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}
