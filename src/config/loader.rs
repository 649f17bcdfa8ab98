//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    load_config_with(Some(path), |_| {})
}

/// Load configuration from `path` (defaults when `None`), apply `overrides`,
/// then validate the result.
pub fn load_config_with(
    path: Option<&Path>,
    overrides: impl FnOnce(&mut GatewayConfig),
) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => GatewayConfig::from_toml_str(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };
    overrides(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
