//! # Configuration System
//!
//! Centralized configuration for the completion gateway.
//!
//! This crate provides:
//! - One immutable `GatewayConfig` enumerating every option with its default
//! - Environment variable loading (12-factor app principles)
//! - TOML file loading with environment overrides (env > file > defaults)
//! - Validation with the `validator` crate

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod validation;

pub use config::{
    AccountingConfig, CacheConfig, CircuitConfig, GatewayConfig, LimitsConfig, ProviderConfig,
    QuotaPolicy, RetryConfig
};
pub use file_loader::{load, load_from_file};
pub use loader::{apply_env_overrides, load_from_env};
pub use validation::validate_config;
