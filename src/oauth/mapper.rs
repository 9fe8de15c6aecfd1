//! Identity mapping between the provider's and the local encoding.
//!
//! The provider hands out external ids in the standard base64 alphabet; the
//! local identity system only accepts URL-safe identifiers. The mapping swaps
//! `+`/`/` for `-`/`_` and drops `=` padding, which is exactly the
//! standard → URL-safe-no-pad re-encoding of the same bytes.

/// Map a provider external id to the local identity.
#[must_use]
pub fn to_local_identity(external_id: &str) -> String {
    external_id
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect()
}
