//! # Configuration Structures
//!
//! This module defines all configuration structures for the completion
//! gateway.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization
//! - Use `validator` for input validation
//! - Carry the documented defaults, so an empty file or environment yields a
//!   working gateway

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};
use validator::{Validate, ValidationError};

/// Main configuration structure for the completion gateway.
///
/// Built once at startup and passed by reference into every component.
///
/// ## Fields
/// - `limits`: per-request and per-conversation token ceilings, rate limit
/// - `accounting`: session token budget, cost estimate, quota policy
/// - `cache`: response cache expiry
/// - `circuit`: circuit breaker threshold and cooldown
/// - `retry`: backoff between attempts and the overall deadline
/// - `provider`: upstream model identifiers and credentials
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct GatewayConfig {
    #[serde(default)]
    #[validate(nested)]
    pub limits: LimitsConfig,

    #[serde(default)]
    #[validate(nested)]
    pub accounting: AccountingConfig,

    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheConfig,

    #[serde(default)]
    #[validate(nested)]
    pub circuit: CircuitConfig,

    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,

    #[serde(default)]
    #[validate(nested)]
    pub provider: ProviderConfig
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[validate(schema(function = "validate_token_ceilings"))]
pub struct LimitsConfig {
    #[serde(default = "default_max_requests_per_minute")]
    #[validate(range(min = 1, max = 100000))]
    pub max_requests_per_minute: u32,

    #[serde(default = "default_max_input_tokens")]
    #[validate(range(min = 1))]
    pub max_input_tokens: usize,

    #[serde(default = "default_max_output_tokens")]
    #[validate(range(min = 1))]
    pub max_output_tokens: usize,

    /// Hard ceiling on the rendered conversation sent upstream.
    #[serde(default = "default_max_context_tokens")]
    #[validate(range(min = 1))]
    pub max_context_tokens: usize,

    /// Rendered conversation size above which compaction runs.
    #[serde(default = "default_max_memory_tokens")]
    #[validate(range(min = 1))]
    pub max_memory_tokens: usize,

    /// Output cap for the dedicated summarization call.
    #[serde(default = "default_summary_max_output_tokens")]
    #[validate(range(min = 1))]
    pub summary_max_output_tokens: usize
}

fn default_max_requests_per_minute() -> u32 {
    10
}

fn default_max_input_tokens() -> usize {
    2000
}

fn default_max_output_tokens() -> usize {
    1500
}

fn default_max_context_tokens() -> usize {
    8500
}

fn default_max_memory_tokens() -> usize {
    3000
}

fn default_summary_max_output_tokens() -> usize {
    256
}

fn validate_token_ceilings(limits: &LimitsConfig) -> Result<(), ValidationError> {
    if limits.max_memory_tokens > limits.max_context_tokens {
        let mut err = ValidationError::new("max_memory_tokens_exceeds_context");
        err.message = Some("max_memory_tokens must not exceed max_context_tokens".into());
        return Err(err);
    }
    Ok(())
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: default_max_requests_per_minute(),
            max_input_tokens: default_max_input_tokens(),
            max_output_tokens: default_max_output_tokens(),
            max_context_tokens: default_max_context_tokens(),
            max_memory_tokens: default_max_memory_tokens(),
            summary_max_output_tokens: default_summary_max_output_tokens()
        }
    }
}

/// When the session token budget is enforced relative to the upstream call.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuotaPolicy {
    /// Debit the call's tokens, then fail it if the budget is now exceeded.
    /// The response is still cached and kept in memory.
    #[default]
    DebitThenDeny,
    /// Reject before the upstream call when the rendered prompt alone would
    /// push usage over budget.
    CheckBeforeCall
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct AccountingConfig {
    #[serde(default = "default_max_session_tokens")]
    #[validate(range(min = 1))]
    pub max_session_tokens: usize,

    /// Informational only: logged and exported, never enforced.
    #[serde(default = "default_cost_per_1k_tokens")]
    #[validate(range(min = 0.0))]
    pub cost_per_1k_tokens: f64,

    #[serde(default)]
    pub quota_policy: QuotaPolicy
}

fn default_max_session_tokens() -> usize {
    5000
}

fn default_cost_per_1k_tokens() -> f64 {
    0.0003
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            max_session_tokens: default_max_session_tokens(),
            cost_per_1k_tokens: default_cost_per_1k_tokens(),
            quota_policy: QuotaPolicy::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    #[validate(range(min = 1))]
    pub ttl_secs: u64
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CircuitConfig {
    #[serde(default = "default_circuit_max_failures")]
    #[validate(range(min = 1, max = 1000))]
    pub max_failures: u32,

    #[serde(default = "default_circuit_cooldown_secs")]
    #[validate(range(min = 1))]
    pub cooldown_secs: u64
}

fn default_circuit_max_failures() -> u32 {
    3
}

fn default_circuit_cooldown_secs() -> u64 {
    60
}

impl CircuitConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            max_failures: default_circuit_max_failures(),
            cooldown_secs: default_circuit_cooldown_secs()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RetryConfig {
    /// Fixed wait before retrying the primary model after a rate limit.
    #[serde(default = "default_retry_backoff_ms")]
    #[validate(range(max = 600000))]
    pub backoff_ms: u64,

    /// Upper bound on the whole retry/fallback chain of one call.
    #[serde(default = "default_request_deadline_secs")]
    #[validate(range(min = 1, max = 3600))]
    pub request_deadline_secs: u64
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_request_deadline_secs() -> u64 {
    60
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_ms: default_retry_backoff_ms(),
            request_deadline_secs: default_request_deadline_secs()
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ProviderConfig {
    #[serde(default = "default_primary_model")]
    #[validate(length(min = 1, max = 255))]
    pub primary_model: String,

    /// `None` disables the fallback attempt.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: Option<String>,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    #[validate(url)]
    pub base_url: String
}

fn default_primary_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_fallback_model() -> Option<String> {
    Some("gemini-2.0-flash".to_string())
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            primary_model: default_primary_model(),
            fallback_model: default_fallback_model(),
            api_key: None,
            base_url: default_base_url()
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("primary_model", &self.primary_model)
            .field("fallback_model", &self.fallback_model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}
