//! Structured logging.
//!
//! JSON lines by default so audit events can be shipped as-is; the pretty
//! format is meant for a terminal. `RUST_LOG` overrides the configured level.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::{LogFormat, ObservabilityConfig};

/// Directive used when `RUST_LOG` is not set.
pub fn default_directive(level: &str) -> String {
    format!("cloudsec_gate={level},security_audit=info,tower_http={level}")
}

/// Install the global subscriber.
pub fn init_tracing(
    config: &ObservabilityConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format {
        LogFormat::Json => fmt::layer().json().with_current_span(false).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
}
