//! Webhook authenticity and update handling
//!
//! ```text
//! Authorization: Bearer <jwt>
//!   -> WebhookVerifier::extract_key_id   (unverified header)
//!   -> JwksCache::get_jwks(kid)          (cached snapshot or one fetch)
//!   -> WebhookVerifier::verify_claims    (ES256 signature, iss, aud, exp)
//!   -> WebhookUpdateEvent::apply         (user deletion or no-op)
//! ```

mod events;
mod jwks;
mod verifier;

pub use events::{FieldUpdate, UpdateOutcome, WebhookUpdateEvent, body_hash};
pub use jwks::{Jwk, JwkError, JwkSet, JwksCache};
pub use verifier::{VerificationFailure, WebhookClaims, WebhookVerifier};
