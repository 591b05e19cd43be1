//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `PORT` from the environment onto the bind address.
///
/// The host part of the configured address is kept.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(port) = std::env::var("PORT") {
        apply_port(config, &port);
    }
}

/// Replace the port of the bind address, keeping its host.
pub fn apply_port(config: &mut AppConfig, port: &str) {
    let Ok(port) = port.trim().parse::<u16>() else {
        tracing::warn!(port = %port, "Ignoring unparsable PORT override");
        return;
    };
    let host = config
        .listener
        .bind_address
        .rsplit_once(':')
        .map(|(host, _)| host.to_string())
        .unwrap_or_else(|| "0.0.0.0".to_string());
    config.listener.bind_address = format!("{host}:{port}");
}
