//! OAuth 2.0 authorization-code + PKCE exchange and identity bridging
//!
//! - [`TokenExchangeClient`]: code + verifier → provider tokens
//! - [`IdentityResolver`]: access token → provider external id
//! - [`to_local_identity`]: provider external id → local identity

mod client;
mod identity;
mod mapper;
mod types;

pub use client::TokenExchangeClient;
pub use identity::IdentityResolver;
pub use mapper::to_local_identity;
pub use types::{
    AccessTokenDenied, AccessTokenGranted, AccessTokenRequest, AccessTokenResult, IdentityError,
    IdentityResult,
};
