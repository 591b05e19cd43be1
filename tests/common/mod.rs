//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cloudsec_gate::config::{AppConfig, ServerMode};
use cloudsec_gate::gate::secrets::StaticSecretProvider;
use cloudsec_gate::gate::{AuditEvent, ChannelAuditSink, SecretProvider};
use cloudsec_gate::http::HttpServer;
use cloudsec_gate::lifecycle::Shutdown;
use tokio::sync::mpsc;

pub const TEST_KEY: &str = "s3cr3t";

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub audit: mpsc::Receiver<AuditEvent>,
    shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Drain audit events recorded so far.
    pub fn audit_events(&mut self) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.audit.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

#[allow(dead_code)]
pub fn config(mode: ServerMode) -> AppConfig {
    let mut config = AppConfig::default();
    config.mode = mode;
    config.listener.bind_address = "127.0.0.1:0".into();
    config
}

/// Start a server with a fixed key and a channel-backed audit sink.
#[allow(dead_code)]
pub async fn start(config: AppConfig) -> TestServer {
    start_with_provider(config, Arc::new(StaticSecretProvider::new(TEST_KEY))).await
}

#[allow(dead_code)]
pub async fn start_with_provider(
    config: AppConfig,
    provider: Arc<dyn SecretProvider>,
) -> TestServer {
    let (sink, audit) = ChannelAuditSink::new(1024);
    let server = HttpServer::with_components(config, provider, Arc::new(sink));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        audit,
        shutdown,
    }
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
