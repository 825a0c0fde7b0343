//! # Gateway Utilities
//!
//! Hashing helpers shared across the gateway crates.
//!
//! - Uses SHA-256 so distinct inputs never share a cache slot in practice

use sha2::{Digest, Sha256};

/// Compute the response-cache key for a `(model, prompt)` pair.
///
/// The model identifier and the exact prompt text are joined with a NUL
/// byte, which never occurs in a model identifier, so `("ab", "c")` and
/// `("a", "bc")` hash differently.
///
/// # Examples
///
/// ```
/// use utils::compute_cache_key;
///
/// let key = compute_cache_key("gemini-2.5-flash", "hello");
/// assert_eq!(key.len(), 64);
/// ```
#[must_use]
pub fn compute_cache_key(model: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(prompt.as_bytes());
    hex::encode(hasher.finalize())
}
