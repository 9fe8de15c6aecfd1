//! Configuration management

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before secrets are read.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Identity provider endpoints and client registration
    pub provider: ProviderConfig,
    /// Secret retrieval and caching
    pub secrets: SecretsConfig,
    /// Webhook authenticity checks
    pub webhook: WebhookConfig,
    /// Custom credential issuance
    pub credentials: CredentialsConfig,
    /// User directory used for account deletion
    pub users: UsersConfig,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("LOGIN_BRIDGE_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();

        Ok(config)
    }

    /// Check that every setting the server needs at runtime is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first missing setting.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("provider.client_id", &self.provider.client_id),
            ("provider.token_url", &self.provider.token_url),
            ("provider.identity_url", &self.provider.identity_url),
            ("provider.jwks_url", &self.provider.jwks_url),
            ("secrets.client_secret_ref", &self.secrets.client_secret_ref),
            ("webhook.audience", &self.webhook.audience),
            ("webhook.issuer", &self.webhook.issuer),
            (
                "credentials.service_account_email",
                &self.credentials.service_account_email,
            ),
            ("credentials.private_key_ref", &self.credentials.private_key_ref),
            ("users.base_url", &self.users.base_url),
            ("users.admin_token_ref", &self.users.admin_token_ref),
        ];

        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(Error::Config(format!("{name} must be set")));
        }

        if self.secrets.backend == SecretBackend::SecretManager
            && self.secrets.base_url.trim().is_empty()
        {
            return Err(Error::Config(
                "secrets.base_url must be set for the secret_manager backend".to_string(),
            ));
        }

        let mut endpoints = vec![
            ("provider.token_url", &self.provider.token_url),
            ("provider.identity_url", &self.provider.identity_url),
            ("provider.jwks_url", &self.provider.jwks_url),
            ("users.base_url", &self.users.base_url),
        ];
        if self.secrets.backend == SecretBackend::SecretManager {
            endpoints.push(("secrets.base_url", &self.secrets.base_url));
        }
        for (name, value) in endpoints {
            self.check_endpoint(name, value)?;
        }

        Ok(())
    }

    fn check_endpoint(&self, name: &str, value: &str) -> Result<()> {
        let parsed = url::Url::parse(value)
            .map_err(|e| Error::Config(format!("{name} is not a valid URL: {e}")))?;
        match parsed.scheme() {
            "https" => Ok(()),
            "http" if self.provider.allow_http => Ok(()),
            scheme => Err(Error::Config(format!(
                "{name} uses unsupported scheme '{scheme}' (set provider.allow_http for plain http)"
            ))),
        }
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                    Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Graceful shutdown timeout
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 64 * 1024,
        }
    }
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OAuth client id registered with the provider
    pub client_id: String,
    /// Token endpoint for the authorization-code exchange
    pub token_url: String,
    /// GraphQL-style endpoint answering `{me{externalID}}`
    pub identity_url: String,
    /// Public JWKS endpoint used to verify webhook tokens
    pub jwks_url: String,
    /// Timeout applied to every outbound provider call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Permit plain-HTTP endpoints (local testing only)
    pub allow_http: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            token_url: "https://accounts.snapchat.com/accounts/oauth2/token".to_string(),
            identity_url: String::new(),
            jwks_url: String::new(),
            request_timeout: Duration::from_secs(10),
            allow_http: false,
        }
    }
}

impl ProviderConfig {
    /// Build the shared outbound HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .https_only(!self.allow_http)
            .timeout(self.request_timeout)
            .build()
            .map_err(Error::from)
    }
}

/// Where secrets are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecretBackend {
    /// Process environment
    #[default]
    Env,
    /// Secret manager REST API
    SecretManager,
}

/// Secret retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Secret backend
    pub backend: SecretBackend,
    /// Base URL of the secret manager (e.g. `https://secretmanager.example/v1/projects/p/secrets`)
    pub base_url: String,
    /// How long a fetched secret stays cached
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Reference of the OAuth client secret
    pub client_secret_ref: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: SecretBackend::Env,
            base_url: String::new(),
            ttl: Duration::from_secs(600),
            client_secret_ref: "LOGIN_BRIDGE_CLIENT_SECRET".to_string(),
        }
    }
}

/// Webhook verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Expected `aud` claim
    pub audience: String,
    /// Expected `iss` claim
    pub issuer: String,
    /// Skip the `exp` check (replaying captured fixtures)
    pub ignore_expiry: bool,
    /// Reject tokens without a `hash` claim over the request body
    pub require_body_hash: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            audience: String::new(),
            issuer: "Snapchat".to_string(),
            ignore_expiry: false,
            require_body_hash: false,
        }
    }
}

/// Custom credential configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Service account that signs custom tokens (`iss`/`sub`)
    pub service_account_email: String,
    /// Secret reference holding the PEM signing key
    pub private_key_ref: String,
    /// Signing algorithm
    pub algorithm: Algorithm,
    /// `aud` claim of issued tokens
    pub audience: String,
    /// Lifetime of issued tokens
    #[serde(with = "humantime_serde")]
    pub lifetime: Duration,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            service_account_email: String::new(),
            private_key_ref: "LOGIN_BRIDGE_SIGNING_KEY".to_string(),
            algorithm: Algorithm::RS256,
            audience: "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit".to_string(),
            lifetime: Duration::from_secs(3600),
        }
    }
}

/// User directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersConfig {
    /// Base URL of the user admin API
    pub base_url: String,
    /// Secret reference holding the admin bearer token
    pub admin_token_ref: String,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            admin_token_ref: "LOGIN_BRIDGE_USERS_TOKEN".to_string(),
        }
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        // "ms" before "s" so "250ms" is not read as "250m" + "s"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            let mins = mins.parse::<u64>().map_err(serde::de::Error::custom)?;
            mins.checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| serde::de::Error::custom(format!("duration {s} is out of range")))
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn complete_config() -> Config {
        let mut config = Config::default();
        config.provider.client_id = "client-123".to_string();
        config.provider.identity_url = "https://kit.example/v1/me".to_string();
        config.provider.jwks_url = "https://kit.example/v1/jwks".to_string();
        config.webhook.audience = "client-123".to_string();
        config.credentials.service_account_email = "signer@project.iam.example".to_string();
        config.users.base_url = "https://users.example/admin".to_string();
        config
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.secrets.ttl, Duration::from_secs(600));
        assert_eq!(config.secrets.backend, SecretBackend::Env);
        assert_eq!(config.webhook.issuer, "Snapchat");
        assert!(!config.webhook.ignore_expiry);
        assert_eq!(config.credentials.algorithm, Algorithm::RS256);
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(complete_config().validate().is_ok());
    }

    #[test]
    fn validate_names_missing_setting() {
        let mut config = complete_config();
        config.provider.jwks_url = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("provider.jwks_url"));
    }

    #[test]
    fn validate_requires_base_url_for_secret_manager() {
        let mut config = complete_config();
        config.secrets.backend = SecretBackend::SecretManager;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("secrets.base_url"));
    }

    #[test]
    fn validate_rejects_plain_http_unless_allowed() {
        let mut config = complete_config();
        config.provider.jwks_url = "http://127.0.0.1:9000/jwks".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("provider.jwks_url"));

        config.provider.allow_http = true;
        assert!(config.validate().is_ok());

        config.users.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
server:
  port: 9090
provider:
  client_id: "client-abc"
  request_timeout: "250ms"
secrets:
  backend: secret_manager
  base_url: "https://secrets.example/v1/projects/p/secrets"
  ttl: "10m"
webhook:
  audience: "aud-1"
  ignore_expiry: true
credentials:
  algorithm: ES256
"#
        )
        .unwrap();
        drop(f);

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.provider.client_id, "client-abc");
        assert_eq!(config.provider.request_timeout, Duration::from_millis(250));
        assert_eq!(config.secrets.backend, SecretBackend::SecretManager);
        assert_eq!(config.secrets.ttl, Duration::from_secs(600));
        assert!(config.webhook.ignore_expiry);
        assert_eq!(config.credentials.algorithm, Algorithm::ES256);
    }

    #[test]
    fn durations_parse_each_unit() {
        let parse = |s: &str| humantime_serde::deserialize(serde_json::Value::String(s.to_string()));
        assert_eq!(parse("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse("45").unwrap(), Duration::from_secs(45));
        assert!(parse("ten minutes").is_err());
    }

    #[test]
    fn durations_reject_minute_overflow() {
        let huge = format!("{}m", u64::MAX / 60 + 1);
        let err = humantime_serde::deserialize(serde_json::Value::String(huge)).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn load_rejects_missing_file() {
        let result = Config::load(Some(Path::new("/nonexistent/bridge.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_env_files_sets_env_vars() {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join("test.env");
        let mut f = std::fs::File::create(&env_path).unwrap();
        writeln!(f, "LOGIN_BRIDGE_TEST_KEY_A=hello_from_env_file").unwrap();
        drop(f);

        let config = Config {
            env_files: vec![env_path.to_string_lossy().to_string()],
            ..Default::default()
        };
        config.load_env_files();

        assert_eq!(
            std::env::var("LOGIN_BRIDGE_TEST_KEY_A").unwrap(),
            "hello_from_env_file"
        );
    }

    #[test]
    fn test_load_env_files_skips_missing() {
        let config = Config {
            env_files: vec!["/nonexistent/path/.env".to_string()],
            ..Default::default()
        };
        config.load_env_files();
    }
}
