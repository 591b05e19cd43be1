//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! consistency. All errors are collected, not just the first.

use std::net::SocketAddr;

use crate::config::schema::{AppConfig, SecretSource, ServerMode};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),
    #[error("rate_limit.window_secs must be greater than zero")]
    ZeroWindow,
    #[error("rate_limit.max_requests must be greater than zero")]
    ZeroMaxRequests,
    #[error("cors.allowed_origins entry '{0}' is not a valid origin")]
    Origin(String),
    #[error("cors.allowed_origins must not contain '*' when credentials are allowed")]
    WildcardWithCredentials,
    #[error("secrets.file_path is required when secrets.source = \"file\"")]
    MissingSecretFile,
    #[error("secrets.value is required when secrets.source = \"static\"")]
    MissingStaticSecret,
    #[error("secrets.env_vars must name at least one variable")]
    NoSecretVars,
    #[error("secrets.fetch_timeout_ms must be greater than zero")]
    ZeroFetchTimeout,
    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,
    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    // The insecure profile ignores limiter and CORS settings entirely.
    if config.mode == ServerMode::Secure {
        if config.rate_limit.enabled {
            if config.rate_limit.window_secs == 0 {
                errors.push(ValidationError::ZeroWindow);
            }
            if config.rate_limit.max_requests == 0 {
                errors.push(ValidationError::ZeroMaxRequests);
            }
        }

        for origin in &config.cors.allowed_origins {
            if origin == "*" {
                if config.cors.allow_credentials {
                    errors.push(ValidationError::WildcardWithCredentials);
                }
            } else if !(origin.starts_with("http://") || origin.starts_with("https://"))
                || origin.ends_with('/')
            {
                errors.push(ValidationError::Origin(origin.clone()));
            }
        }
    }

    match config.secrets.source {
        SecretSource::Env if config.secrets.env_vars.is_empty() => {
            errors.push(ValidationError::NoSecretVars);
        }
        SecretSource::File if config.secrets.file_path.is_none() => {
            errors.push(ValidationError::MissingSecretFile);
        }
        SecretSource::Static if config.secrets.value.is_none() => {
            errors.push(ValidationError::MissingStaticSecret);
        }
        _ => {}
    }
    if config.secrets.fetch_timeout_ms == 0 {
        errors.push(ValidationError::ZeroFetchTimeout);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
