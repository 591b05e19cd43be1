//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for the configured profile
//! - Wire up middleware (CORS, headers, limits, request ID, tracing)
//! - Run the limiter sweep alongside the server
//! - Serve until the shutdown signal fires

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{AppConfig, ServerMode};
use crate::gate::{
    secrets, AccessGate, AuditSink, GateError, SecretError, SecretProvider, TracingAuditSink,
};
use crate::http::handlers;
use crate::http::request::{access_log_middleware, propagate_request_id_layer, set_request_id_layer};
use crate::security::rate_limit::{rate_limit_middleware, run_sweeper, Unlimited};
use crate::security::{cors, headers, limits, FixedWindowLimiter, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AccessGate>,
    pub secrets: Arc<dyn SecretProvider>,
    pub hostname: Arc<str>,
    pub started_at: Instant,
}

/// HTTP server for either profile.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    limiter: Option<Arc<FixedWindowLimiter>>,
}

impl HttpServer {
    /// Build the server with the configured key source and the tracing audit sink.
    pub fn new(config: AppConfig) -> Result<Self, SecretError> {
        let provider = secrets::from_config(&config.secrets)?;
        Ok(Self::with_components(config, provider, Arc::new(TracingAuditSink)))
    }

    /// Build the server around an explicit key source and audit sink.
    pub fn with_components(
        config: AppConfig,
        provider: Arc<dyn SecretProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let limiter = (config.mode == ServerMode::Secure && config.rate_limit.enabled).then(|| {
            Arc::new(FixedWindowLimiter::new(
                config.rate_limit.window(),
                config.rate_limit.max_requests,
            ))
        });
        let admission: Arc<dyn RateLimiter> = match &limiter {
            Some(l) => l.clone() as Arc<dyn RateLimiter>,
            None => Arc::new(Unlimited),
        };

        let gate = Arc::new(AccessGate::new(
            admission.clone(),
            provider.clone(),
            audit,
            config.secrets.fetch_timeout(),
        ));

        let state = AppState {
            gate,
            secrets: provider,
            hostname: Arc::from(handlers::hostname()),
            started_at: Instant::now(),
        };

        let router = match config.mode {
            ServerMode::Secure => Self::build_secure_router(&config, state, admission),
            ServerMode::Insecure => Self::build_insecure_router(&config, state),
        };

        Self {
            router,
            config,
            limiter,
        }
    }

    #[allow(deprecated)]
    fn build_secure_router(
        config: &AppConfig,
        state: AppState,
        admission: Arc<dyn RateLimiter>,
    ) -> Router {
        // The gate runs its own rate check for /secure.
        let public = Router::new()
            .route("/", get(handlers::secure_index))
            .route("/health", get(handlers::secure_health))
            .route_layer(middleware::from_fn_with_state(admission, rate_limit_middleware));

        let protected = Router::new().route("/secure", get(handlers::secure_resource));

        let mut router = public
            .merge(protected)
            .with_state(state)
            .layer(middleware::from_fn(access_log_middleware))
            .layer(limits::body_limit(&config.security))
            .layer(cors::allow_list(&config.cors));

        if config.security.enable_headers {
            router = headers::with_security_headers(router);
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    #[allow(deprecated)]
    fn build_insecure_router(config: &AppConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/", get(handlers::insecure_index))
            .route("/health", get(handlers::insecure_health))
            .route("/secure", get(handlers::insecure_resource))
            .with_state(state)
            .layer(cors::permissive());

        headers::with_powered_by(router)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Router for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mode = self.config.mode.as_str(),
            "HTTP server starting"
        );

        let sweeper = self.limiter.clone().map(|limiter| {
            let interval = Duration::from_secs(self.config.rate_limit.sweep_interval_secs.max(1));
            tokio::spawn(run_sweeper(limiter, interval))
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        if let Some(handle) = sweeper {
            handle.abort();
        }

        tracing::info!("HTTP server stopped");
        result
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    GateError::internal(format!("handler panicked: {detail}")).into_response()
}
