//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which hardening profile the server runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// Open CORS, no rate limit, no security headers, plain key comparison.
    Insecure,
    /// Full access gate, allow-list CORS, security headers.
    #[default]
    Secure,
}

impl ServerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerMode::Insecure => "insecure",
            ServerMode::Secure => "secure",
        }
    }

    /// Default listen port for each mode.
    pub fn default_port(&self) -> u16 {
        match self {
            ServerMode::Insecure => 3000,
            ServerMode::Secure => 8080,
        }
    }
}

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Hardening profile.
    pub mode: ServerMode,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Fixed-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Cross-origin policy for the secure mode.
    pub cors: CorsConfig,

    /// Response hardening.
    pub security: SecurityConfig,

    /// Where the expected API key comes from.
    pub secrets: SecretsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting (secure mode only).
    pub enabled: bool,

    /// Length of one fixed window in seconds.
    pub window_secs: u64,

    /// Requests allowed per identity within one window.
    pub max_requests: u64,

    /// How often expired windows are evicted.
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 15 * 60,
            max_requests: 100,
            sweep_interval_secs: 60,
        }
    }
}

/// CORS configuration used by the secure mode.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins echoed back in `Access-Control-Allow-Origin`.
    pub allowed_origins: Vec<String>,

    pub allowed_methods: Vec<String>,

    pub allowed_headers: Vec<String>,

    /// Emit `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            allowed_headers: vec!["content-type".to_string(), "x-api-key".to_string()],
            allow_credentials: true,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 10 * 1024, // 10kb
        }
    }
}

/// Backing store for the expected API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretSource {
    #[default]
    Env,
    File,
    Static,
}

/// Secret retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub source: SecretSource,

    /// Environment variables tried in order when `source = "env"`.
    pub env_vars: Vec<String>,

    /// Key file watched for rotation when `source = "file"`.
    pub file_path: Option<String>,

    /// Inline key when `source = "static"`. Never use outside local demos.
    pub value: Option<String>,

    /// Upper bound on a single secret lookup.
    pub fetch_timeout_ms: u64,
}

impl SecretsConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            source: SecretSource::Env,
            env_vars: vec!["API_KEY_SECRET".to_string(), "API_KEY".to_string()],
            file_path: None,
            value: None,
            fetch_timeout_ms: 2000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("mode = \"insecure\"").unwrap();
        assert_eq!(config.mode, ServerMode::Insecure);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(900));
        assert_eq!(config.security.max_body_size, 10 * 1024);
        assert_eq!(config.secrets.env_vars, vec!["API_KEY_SECRET", "API_KEY"]);
    }

    #[test]
    fn test_nested_sections() {
        let raw = r#"
            [rate_limit]
            window_secs = 60
            max_requests = 5

            [secrets]
            source = "file"
            file_path = "/run/secrets/api_key"

            [observability]
            log_format = "pretty"
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.mode, ServerMode::Secure);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.secrets.source, SecretSource::File);
        assert_eq!(config.secrets.file_path.as_deref(), Some("/run/secrets/api_key"));
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }
}
