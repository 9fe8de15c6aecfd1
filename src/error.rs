//! Error types for the login bridge

use std::io;

use thiserror::Error;

/// Result type alias for the login bridge
pub type Result<T> = std::result::Result<T, Error>;

/// Login bridge errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or incomplete client input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Secret could not be retrieved
    #[error("Secret unavailable: {0}")]
    Secret(String),

    /// Outbound HTTP call failed without a usable response
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with something we cannot interpret
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Custom credential could not be issued
    #[error("Credential error: {0}")]
    Credential(String),

    /// User directory rejected an operation
    #[error("User directory error: {0}")]
    UserDirectory(String),

    /// JWT encode/decode error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
