//! # Configuration File Loading
//!
//! Loads configuration from TOML files and layers environment overrides on
//! top (env > file > defaults).

use crate::config::GatewayConfig;
use crate::loader::apply_env_overrides;
use crate::validation::validate_config;
use errors::ConfigError;
use std::path::Path;

/// Load configuration from a TOML file.
///
/// Missing sections and fields fall back to their defaults.
pub fn load_from_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        reason: e.to_string()
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        reason: e.to_string()
    })
}

/// Builds the startup configuration: optional file, then environment
/// overrides, then validation.
pub fn load(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let base = match path {
        Some(path) => load_from_file(path)?,
        None => GatewayConfig::default()
    };
    let config = apply_env_overrides(base)?;
    validate_config(&config)?;
    tracing::debug!(
        file = ?path,
        primary_model = %config.provider.primary_model,
        "Gateway configuration loaded"
    );
    Ok(config)
}
