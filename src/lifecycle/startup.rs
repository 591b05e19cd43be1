//! Startup orchestration.
//!
//! Config is already loaded and validated by the caller. From here: metrics,
//! key source, listener, then traffic. Any startup error is fatal.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::gate::SecretError;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
    #[error("key source: {0}")]
    Secrets(#[from] SecretError),
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Bring the service up and serve until SIGINT/SIGTERM.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let server = HttpServer::new(config)?;

    let address = server.config().listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
