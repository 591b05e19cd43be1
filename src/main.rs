//! API key gate demo server.
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!   Client request      │  cors → body limit → access log → router     │
//!   ────────────────────┼─▶  /, /health   → rate limit → handler       │
//!                       │    /secure      → access gate                │
//!                       │                    ├ rate limiter            │
//!                       │                    ├ key source (timeout)    │
//!                       │                    ├ constant-time compare   │
//!                       │                    └ audit sink              │
//!   Client response     │                                              │
//!   ◀───────────────────┼── security headers ← request id ← handler    │
//!                       └──────────────────────────────────────────────┘
//! ```
//!
//! `--mode insecure` drops everything but the router and a naive key check.

use std::path::PathBuf;

use clap::Parser;

use cloudsec_gate::config::{self, AppConfig, ServerMode};
use cloudsec_gate::lifecycle::startup;
use cloudsec_gate::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "cloudsec-gate")]
#[command(about = "Insecure vs. secure API key service for security demos", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Hardening profile; overrides the config file.
    #[arg(short, long, value_enum)]
    mode: Option<ServerMode>,

    /// Listen port; overrides the config file and PORT.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };

    if let Some(mode) = args.mode {
        config.mode = mode;
        if args.config.is_none() {
            config.listener.bind_address = format!("0.0.0.0:{}", mode.default_port());
        }
    }
    config::apply_env_overrides(&mut config);
    if let Some(port) = args.port {
        config::loader::apply_port(&mut config, &port.to_string());
    }
    config::validate_config(&config).map_err(config::ConfigError::Validation)?;

    logging::init_tracing(&config.observability)?;

    tracing::info!(
        mode = config.mode.as_str(),
        bind_address = %config.listener.bind_address,
        rate_limit_enabled = config.rate_limit.enabled,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );
    if config.mode == ServerMode::Insecure {
        tracing::warn!("Running in INSECURE mode for security analysis");
    }

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
