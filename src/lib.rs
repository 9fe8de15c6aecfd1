//! Login Bridge Library
//!
//! Backend-for-frontend between a client application, an OAuth identity
//! provider and a local authentication system.
//!
//! # Features
//!
//! - **Token exchange**: authorization code + PKCE verifier for provider tokens
//! - **Identity bridging**: provider external id to local identity and custom token
//! - **Webhook verification**: ES256 tokens checked against a cached JWKS snapshot
//! - **Secret caching**: short-lived cache over env or a secret manager

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod oauth;
pub mod secrets;
pub mod server;
pub mod users;
pub mod webhook;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
