//! Approximate token accounting.
//!
//! Every limit in the gateway is expressed in these estimated tokens, not in
//! the upstream tokenizer's units.

pub const CHARS_PER_TOKEN: usize = 4;

/// `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Informational cost of `tokens` at `cost_per_1k_tokens`.
pub fn estimate_cost(tokens: usize, cost_per_1k_tokens: f64) -> f64 {
    tokens as f64 / 1000.0 * cost_per_1k_tokens
}
