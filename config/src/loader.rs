//! # Environment Variable Loader
//!
//! Loads configuration from environment variables following 12-factor app
//! principles.
//!
//! # Naming Convention
//! - `GW_*`: gateway limits, cache, circuit breaker and retry settings
//! - `GENAI_*`: upstream provider settings

use crate::config::GatewayConfig;
use errors::ConfigError;
use std::env;
use std::str::FromStr;

/// Load configuration from environment variables on top of the defaults.
///
/// ## Environment Variables
/// ### Limits
/// - `GW_MAX_REQUESTS_PER_MINUTE` (default: 10)
/// - `GW_MAX_INPUT_TOKENS` (default: 2000)
/// - `GW_MAX_OUTPUT_TOKENS` (default: 1500)
/// - `GW_MAX_CONTEXT_TOKENS` (default: 8500)
/// - `GW_MAX_MEMORY_TOKENS` (default: 3000)
/// - `GW_SUMMARY_MAX_OUTPUT_TOKENS` (default: 256)
///
/// ### Accounting
/// - `GW_MAX_SESSION_TOKENS` (default: 5000)
/// - `GW_COST_PER_1K_TOKENS` (default: 0.0003)
/// - `GW_QUOTA_POLICY`: `debit_then_deny` | `check_before_call`
///
/// ### Cache, circuit breaker, retry
/// - `GW_CACHE_TTL_SECONDS` (default: 300)
/// - `GW_CIRCUIT_MAX_FAILURES` (default: 3)
/// - `GW_CIRCUIT_COOLDOWN_SECONDS` (default: 60)
/// - `GW_RETRY_BACKOFF_MS` (default: 2000)
/// - `GW_REQUEST_DEADLINE_SECONDS` (default: 60)
///
/// ### Provider
/// - `GENAI_API_KEY`: credential for the upstream service
/// - `GENAI_MODEL_NAME` (default: "gemini-2.5-flash")
/// - `GENAI_FALLBACK_MODEL_NAME` (default: "gemini-2.0-flash", empty disables)
/// - `GENAI_BASE_URL` (default: "https://generativelanguage.googleapis.com")
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    apply_env_overrides(GatewayConfig::default())
}

/// Overrides every field that has a matching environment variable set.
pub fn apply_env_overrides(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    let limits = &mut config.limits;
    override_from_env("GW_MAX_REQUESTS_PER_MINUTE", &mut limits.max_requests_per_minute)?;
    override_from_env("GW_MAX_INPUT_TOKENS", &mut limits.max_input_tokens)?;
    override_from_env("GW_MAX_OUTPUT_TOKENS", &mut limits.max_output_tokens)?;
    override_from_env("GW_MAX_CONTEXT_TOKENS", &mut limits.max_context_tokens)?;
    override_from_env("GW_MAX_MEMORY_TOKENS", &mut limits.max_memory_tokens)?;
    override_from_env(
        "GW_SUMMARY_MAX_OUTPUT_TOKENS",
        &mut limits.summary_max_output_tokens
    )?;

    let accounting = &mut config.accounting;
    override_from_env("GW_MAX_SESSION_TOKENS", &mut accounting.max_session_tokens)?;
    override_from_env("GW_COST_PER_1K_TOKENS", &mut accounting.cost_per_1k_tokens)?;
    override_from_env("GW_QUOTA_POLICY", &mut accounting.quota_policy)?;

    override_from_env("GW_CACHE_TTL_SECONDS", &mut config.cache.ttl_secs)?;
    override_from_env("GW_CIRCUIT_MAX_FAILURES", &mut config.circuit.max_failures)?;
    override_from_env("GW_CIRCUIT_COOLDOWN_SECONDS", &mut config.circuit.cooldown_secs)?;
    override_from_env("GW_RETRY_BACKOFF_MS", &mut config.retry.backoff_ms)?;
    override_from_env(
        "GW_REQUEST_DEADLINE_SECONDS",
        &mut config.retry.request_deadline_secs
    )?;

    let provider = &mut config.provider;
    if let Some(key) = read_env("GENAI_API_KEY") {
        provider.api_key = Some(key);
    }
    if let Some(model) = read_env("GENAI_MODEL_NAME") {
        provider.primary_model = model;
    }
    if let Ok(fallback) = env::var("GENAI_FALLBACK_MODEL_NAME") {
        let fallback = fallback.trim();
        provider.fallback_model = (!fallback.is_empty()).then(|| fallback.to_string());
    }
    if let Some(url) = read_env("GENAI_BASE_URL") {
        provider.base_url = url;
    }

    Ok(config)
}

/// Non-empty, trimmed value of `key`.
fn read_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn override_from_env<T>(key: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display
{
    if let Some(raw) = read_env(key) {
        *target = parse_env_value(key, &raw)?;
    }
    Ok(())
}

fn parse_env_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("{raw:?}: {e}")
    })
}
