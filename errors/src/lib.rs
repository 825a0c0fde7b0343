//! # Gateway Errors
//!
//! Error handling for the completion gateway.
//!
//! - Uses `thiserror` for structured error definitions
//! - Every variant uses named fields so the rendered message stays stable
//! - No error escapes the gateway boundary untranslated

use thiserror::Error;

/// Substrings that mark an upstream failure as rate-limit class.
///
/// A status code only counts next to a status-like word; a bare `429` can be
/// part of a URL, a port or a model name.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "http 429",
    "status 429",
    "status: 429",
    "code 429",
    "code: 429",
    "\"code\": 429",
    "resource_exhausted",
    "rate limit",
    "ratelimit",
    "rate-limit",
    "too many requests",
    "quota exceeded",
    "exceeded your current quota"
];

/// Errors returned to callers of `Gateway::chat`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Input too large: {tokens} tokens max {max}")]
    InputTooLarge { tokens: usize, max: usize },

    #[error("Context exceeded: {tokens} tokens max {max}")]
    ContextExceeded { tokens: usize, max: usize },

    #[error("Upstream unavailable: circuit open, retry after {retry_after_secs}s")]
    Unavailable { retry_after_secs: u64 },

    #[error("Upstream error from {model}: {reason}")]
    Upstream { model: String, reason: String },

    #[error("Empty response from {model}")]
    EmptyResponse { model: String },

    #[error("Session quota exceeded: {used} tokens used max {max}")]
    SessionQuotaExceeded { used: usize, max: usize },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid user id: {reason}")]
    InvalidUserId { reason: String }
}

impl GatewayError {
    /// Stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::InputTooLarge { .. } => "input_too_large",
            GatewayError::ContextExceeded { .. } => "context_exceeded",
            GatewayError::Unavailable { .. } => "unavailable",
            GatewayError::Upstream { .. } => "upstream_error",
            GatewayError::EmptyResponse { .. } => "empty_response",
            GatewayError::SessionQuotaExceeded { .. } => "session_quota_exceeded",
            GatewayError::Configuration { .. } => "configuration_error",
            GatewayError::InvalidUserId { .. } => "invalid_user_id"
        }
    }

    pub fn upstream(model: &str, error: &CompletionError) -> Self {
        GatewayError::Upstream {
            model: model.to_string(),
            reason: error.reason().to_string()
        }
    }
}

/// Classified failure of a single upstream completion call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Upstream rate limited: {reason}")]
    RateLimited { reason: String },

    #[error("Upstream failure: {reason}")]
    Other { reason: String }
}

impl CompletionError {
    /// Builds an error from a raw provider message, inspecting it for a
    /// rate-limit marker.
    pub fn classify(message: impl Into<String>) -> Self {
        let reason = message.into();
        let lowered = reason.to_lowercase();
        if RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m)) {
            CompletionError::RateLimited { reason }
        } else {
            CompletionError::Other { reason }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CompletionError::RateLimited { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            CompletionError::RateLimited { reason } | CompletionError::Other { reason } => reason
        }
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {key}")]
    Missing { key: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Configuration validation failed: {reason}")]
    Validation { reason: String },

    #[error("Failed to read configuration file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse configuration file {path}: {reason}")]
    Parse { path: String, reason: String }
}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        GatewayError::Configuration {
            message: err.to_string()
        }
    }
}
