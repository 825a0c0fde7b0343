//! # Configuration Validation
//!
//! Provides validation for all configuration structures using the `validator` crate.

use crate::config::GatewayConfig;
use errors::ConfigError;
use validator::Validate;

/// Validate configuration structure.
///
/// ## Validation Rules
/// - `limits.max_requests_per_minute`: 1-100000
/// - every token ceiling: at least 1
/// - `limits.max_memory_tokens` must not exceed `limits.max_context_tokens`
/// - `accounting.cost_per_1k_tokens`: non-negative
/// - `circuit.max_failures`: 1-1000
/// - `retry.request_deadline_secs`: 1-3600
/// - `provider.primary_model`: 1-255 characters
/// - `provider.base_url`: a valid URL
pub fn validate_config(config: &GatewayConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|e| ConfigError::Validation {
        reason: e.to_string()
    })?;

    if let Some(fallback) = &config.provider.fallback_model {
        if fallback.trim().is_empty() {
            return Err(ConfigError::Validation {
                reason: "provider.fallback_model must not be blank".to_string()
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let mut config = GatewayConfig::default();
        config.provider.base_url = "not a url".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_blank_fallback_is_rejected() {
        let mut config = GatewayConfig::default();
        config.provider.fallback_model = Some("  ".to_string());
        assert!(validate_config(&config).is_err());
    }
}
