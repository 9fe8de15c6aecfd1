//! JWKS cache for webhook signature verification.
//!
//! # States
//!
//! The cache starts empty and, after the first successful fetch, always holds
//! exactly one full key-set snapshot. A snapshot is only ever replaced
//! wholesale by a newer one; it never reverts to empty.
//!
//! # Lookup
//!
//! - `kid` present in the cached snapshot: return the whole snapshot, no
//!   network call.
//! - otherwise: fetch the full set once. A non-200 answer, or a 200 answer
//!   that still lacks `kid`, is a [`JwkError`] and leaves the cache untouched.
//!   A 200 answer containing `kid` replaces the snapshot.
//!
//! There is no TTL: the snapshot is refreshed only when an unknown `kid`
//! shows up.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Elliptic-curve public key as published by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// `kty` (expected `EC`)
    #[serde(rename = "kty")]
    pub key_type: String,
    /// `crv` (expected `P-256`)
    #[serde(rename = "crv", default)]
    pub curve: String,
    /// `kid`
    #[serde(rename = "kid")]
    pub key_id: String,
    /// `x` coordinate, base64url
    #[serde(rename = "x", default)]
    pub x_coordinate: String,
    /// `y` coordinate, base64url
    #[serde(rename = "y", default)]
    pub y_coordinate: String,
}

/// Ordered key set, indexed by key id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JwkSet {
    keys: Vec<Jwk>,
    index: HashMap<String, usize>,
}

impl JwkSet {
    /// Build a set from keys in publication order.
    ///
    /// When two keys share a `kid` the first one wins.
    #[must_use]
    pub fn new(keys: Vec<Jwk>) -> Self {
        let mut index = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            index.entry(key.key_id.clone()).or_insert(i);
        }
        Self { keys, index }
    }

    /// Parse a JWKS document: either `{"keys": [...]}` or a bare array.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the document matches neither shape.
    pub fn from_json(body: &[u8]) -> serde_json::Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Document {
            Set { keys: Vec<Jwk> },
            Bare(Vec<Jwk>),
        }

        let keys = match serde_json::from_slice::<Document>(body)? {
            Document::Set { keys } | Document::Bare(keys) => keys,
        };
        Ok(Self::new(keys))
    }

    /// Look up a key by id.
    #[must_use]
    pub fn get(&self, key_id: &str) -> Option<&Jwk> {
        self.index.get(key_id).map(|&i| &self.keys[i])
    }

    /// Whether a key with this id is present.
    #[must_use]
    pub fn contains(&self, key_id: &str) -> bool {
        self.index.contains_key(key_id)
    }

    /// Keys in publication order.
    #[must_use]
    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Failure to obtain a key set containing the requested key id.
#[derive(Debug, thiserror::Error)]
pub enum JwkError {
    /// The JWKS endpoint answered with a non-200 status.
    #[error("JWKS endpoint returned HTTP {0}")]
    Status(u16),

    /// The freshly fetched set does not publish the key id.
    #[error("Key id '{kid}' not present in fetched JWKS (HTTP {status})")]
    UnknownKeyId {
        /// Requested key id
        kid: String,
        /// Status of the fetch
        status: u16,
    },

    /// The JWKS document could not be parsed.
    #[error("Malformed JWKS document (HTTP {status}): {reason}")]
    Malformed {
        /// Status of the fetch
        status: u16,
        /// Parser message
        reason: String,
    },

    /// No response was received.
    #[error("JWKS fetch error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl JwkError {
    /// Upstream HTTP status, when one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(status)
            | Self::UnknownKeyId { status, .. }
            | Self::Malformed { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

/// Process-wide JWKS snapshot cache.
pub struct JwksCache {
    http: Client,
    jwks_url: String,
    snapshot: RwLock<Option<Arc<JwkSet>>>,
}

impl JwksCache {
    /// Create an empty cache backed by `jwks_url`.
    #[must_use]
    pub fn new(http: Client, jwks_url: impl Into<String>) -> Self {
        Self {
            http,
            jwks_url: jwks_url.into(),
            snapshot: RwLock::new(None),
        }
    }

    /// Return a key set containing `kid`, fetching a new snapshot on a miss.
    ///
    /// The returned set is the complete snapshot, not just the matching key.
    ///
    /// # Errors
    ///
    /// Returns [`JwkError`] when the fetch fails or the fetched set does not
    /// contain `kid`. The cached snapshot is left as it was.
    pub async fn get_jwks(&self, kid: &str) -> Result<Arc<JwkSet>, JwkError> {
        if let Some(cached) = self.cached_with(kid) {
            return Ok(cached);
        }

        debug!(kid = %kid, url = %self.jwks_url, "JWKS cache miss, fetching key set");
        let response = self.http.get(&self.jwks_url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = %status, "JWKS endpoint returned non-200");
            return Err(JwkError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let fetched = JwkSet::from_json(&body).map_err(|e| JwkError::Malformed {
            status: status.as_u16(),
            reason: e.to_string(),
        })?;

        if !fetched.contains(kid) {
            warn!(kid = %kid, keys = fetched.len(), "Fetched JWKS does not contain key id");
            return Err(JwkError::UnknownKeyId {
                kid: kid.to_string(),
                status: status.as_u16(),
            });
        }

        let fetched = Arc::new(fetched);
        *self.snapshot.write() = Some(Arc::clone(&fetched));
        debug!(keys = fetched.len(), "JWKS snapshot replaced");

        Ok(fetched)
    }

    /// Current snapshot, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<JwkSet>> {
        self.snapshot.read().clone()
    }

    fn cached_with(&self, kid: &str) -> Option<Arc<JwkSet>> {
        self.snapshot
            .read()
            .as_ref()
            .filter(|set| set.contains(kid))
            .cloned()
    }
}
