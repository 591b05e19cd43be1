//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI flags + PORT
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → handed to HttpServer at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the API key itself rotates
//!   (see `gate::secrets::FileSecretProvider`)
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, ConfigError};
pub use schema::{
    AppConfig, CorsConfig, ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig,
    SecretSource, SecretsConfig, SecurityConfig, ServerMode, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
