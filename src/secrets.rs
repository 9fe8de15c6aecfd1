//! Secret retrieval with a time-bounded cache
//!
//! [`SecretCache`] sits in front of a [`SecretSource`] and keeps each fetched
//! value for a fixed TTL (600 seconds by default) measured from the moment
//! the fetch completed. Failed fetches are never cached.
//!
//! Concurrent misses for the same reference are not de-duplicated: two
//! simultaneous misses may both reach the source, and the later write wins.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{SecretBackend, SecretsConfig};
use crate::{Error, Result};

/// Default secret lifetime in the cache
pub const DEFAULT_SECRET_TTL: Duration = Duration::from_secs(600);

/// Something that can produce a secret value by reference name.
#[async_trait]
pub trait SecretSource: Send + Sync + 'static {
    /// Fetch the current value of `secret_ref`.
    ///
    /// Implementations must return an error rather than an empty value.
    async fn fetch(&self, secret_ref: &str) -> Result<String>;
}

/// Reads secrets from process environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretSource;

#[async_trait]
impl SecretSource for EnvSecretSource {
    async fn fetch(&self, secret_ref: &str) -> Result<String> {
        match std::env::var(secret_ref) {
            Ok(value) if !value.is_empty() => Ok(value),
            Ok(_) => Err(Error::Secret(format!(
                "environment variable '{secret_ref}' is empty"
            ))),
            Err(_) => Err(Error::Secret(format!(
                "environment variable '{secret_ref}' is not set"
            ))),
        }
    }
}

/// Reads secrets from a secret-manager REST API.
///
/// `GET {base_url}/{secret_ref}/versions/latest:access` is expected to answer
/// `{"payload": {"data": "<base64>"}}`.
pub struct SecretManagerSource {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct AccessSecretResponse {
    payload: Option<SecretPayload>,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: Option<String>,
}

impl SecretManagerSource {
    /// Create a source rooted at `base_url`.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn access_url(&self, secret_ref: &str) -> String {
        format!("{}/{secret_ref}/versions/latest:access", self.base_url)
    }
}

#[async_trait]
impl SecretSource for SecretManagerSource {
    async fn fetch(&self, secret_ref: &str) -> Result<String> {
        let response = self.http.get(self.access_url(secret_ref)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Secret(format!(
                "secret manager returned HTTP {status} for '{secret_ref}'"
            )));
        }

        let body: AccessSecretResponse = response.json().await?;
        let data = body
            .payload
            .and_then(|p| p.data)
            .ok_or_else(|| Error::Secret(format!("secret '{secret_ref}' has no payload")))?;

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| Error::Secret(format!("secret '{secret_ref}' payload is not base64: {e}")))?;
        let value = String::from_utf8(bytes)
            .map_err(|_| Error::Secret(format!("secret '{secret_ref}' payload is not UTF-8")))?;

        if value.is_empty() {
            return Err(Error::Secret(format!("secret '{secret_ref}' is empty")));
        }
        Ok(value)
    }
}

/// A cached secret with its expiry instant
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-wide secret cache, shared between request handlers.
pub struct SecretCache {
    source: Box<dyn SecretSource>,
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl SecretCache {
    /// Create a cache over `source` with the given TTL.
    pub fn new(source: impl SecretSource, ttl: Duration) -> Self {
        Self {
            source: Box::new(source),
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Build the cache and its source from configuration.
    #[must_use]
    pub fn from_config(config: &SecretsConfig, http: reqwest::Client) -> Self {
        match config.backend {
            SecretBackend::Env => Self::new(EnvSecretSource, config.ttl),
            SecretBackend::SecretManager => Self::new(
                SecretManagerSource::new(http, config.base_url.clone()),
                config.ttl,
            ),
        }
    }

    /// Return the secret for `secret_ref`, fetching it on a miss.
    ///
    /// # Errors
    ///
    /// Propagates the source error on a miss; nothing is cached in that case.
    pub async fn get_secret(&self, secret_ref: &str) -> Result<String> {
        if let Some(entry) = self.entries.get(secret_ref) {
            if !entry.is_expired() {
                return Ok(entry.value.clone());
            }
        }

        debug!(secret_ref = %secret_ref, "Secret cache miss");
        let value = self.source.fetch(secret_ref).await.inspect_err(|e| {
            warn!(secret_ref = %secret_ref, error = %e, "Secret fetch failed");
        })?;

        self.entries.insert(
            secret_ref.to_string(),
            CacheEntry {
                value: value.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );

        Ok(value)
    }

    /// Drop the cached value for `secret_ref`, if any.
    pub fn invalidate(&self, secret_ref: &str) {
        self.entries.remove(secret_ref);
    }
}
