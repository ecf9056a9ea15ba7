//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Environment selecting `config/<name>.toml`
pub const ENV_VAR: &str = "FLOWMANAGER_ENV";

const DEFAULT_ENVIRONMENT: &str = "development";

/// Name of the active environment (`FLOWMANAGER_ENV`, default development).
pub fn environment() -> String {
    std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string())
}

/// Load configuration for the active environment.
pub fn load_config() -> Result<AppConfig> {
    load_config_for(&environment())
}

/// Load configuration with `config/<environment>` as the environment layer.
pub fn load_config_for(environment: &str) -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{environment}")).required(false))
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority), e.g. FLOWMANAGER_SERVER__PORT
        .add_source(
            Environment::with_prefix("FLOWMANAGER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
