//! Access gate for protected resources.
//!
//! # Data Flow
//! ```text
//! GateRequest
//!     → CHECK_RATE      limiter rejects      → DENIED rate_limited       (429)
//!     → CHECK_PRESENCE  no usable key header → DENIED missing_credential (401)
//!     → fetch expected key (bounded)         → error                     (500)
//!     → CHECK_VALUE     mismatch             → DENIED invalid_credential (403)
//!     → GRANTED                                                          (200)
//! ```
//!
//! # Design Decisions
//! - Rate check runs first so a throttled caller learns nothing about the key
//! - Exactly one audit event per terminal state; a secret-store failure is an
//!   infrastructure error and is logged, not audited
//! - Limiter, key source and audit sink are injected trait objects

pub mod audit;
pub mod error;
pub mod secrets;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header, request::Parts, HeaderMap};

use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::security::{constant_time_eq, ClientIdentity, RateLimiter};

pub use audit::{AuditEvent, AuditEventType, AuditSink, ChannelAuditSink, Severity, TracingAuditSink};
pub use error::GateError;
pub use secrets::{SecretError, SecretProvider};

/// Header carrying the presented API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// What the gate needs to know about one inbound request.
#[derive(Debug, Clone)]
pub struct GateRequest {
    pub identity: ClientIdentity,
    /// `None` when the header is absent, empty, or not visible ASCII.
    pub credential: Option<String>,
    pub method: String,
    pub path: String,
    pub user_agent: Option<String>,
    pub host: Option<String>,
    pub origin: Option<String>,
    pub request_id: Option<String>,
}

impl GateRequest {
    pub fn from_parts(parts: &Parts) -> Self {
        let headers = &parts.headers;
        Self {
            identity: ClientIdentity::from_extensions(&parts.extensions),
            credential: header_str(headers, API_KEY_HEADER).filter(|key| !key.is_empty()),
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            user_agent: header_str(headers, header::USER_AGENT.as_str()),
            host: header_str(headers, header::HOST.as_str()),
            origin: header_str(headers, header::ORIGIN.as_str()),
            request_id: header_str(headers, X_REQUEST_ID),
        }
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Allow/deny decision point for protected routes.
pub struct AccessGate {
    limiter: Arc<dyn RateLimiter>,
    secrets: Arc<dyn SecretProvider>,
    audit: Arc<dyn AuditSink>,
    secret_timeout: Duration,
}

impl AccessGate {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        secrets: Arc<dyn SecretProvider>,
        audit: Arc<dyn AuditSink>,
        secret_timeout: Duration,
    ) -> Self {
        Self {
            limiter,
            secrets,
            audit,
            secret_timeout,
        }
    }

    /// Run one request through the gate.
    pub async fn check(&self, request: &GateRequest, now: Instant) -> Result<(), GateError> {
        if !self.limiter.allow(&request.identity, now) {
            metrics::record_rate_limited("gate");
            return Err(self.deny(AuditEventType::RateLimited, request, GateError::RateLimited));
        }

        let Some(provided) = request.credential.as_deref() else {
            return Err(self.deny(
                AuditEventType::MissingCredential,
                request,
                GateError::MissingCredential,
            ));
        };

        let expected = self.expected_key().await.map_err(|e| {
            tracing::error!(
                error = %e,
                request_id = request.request_id.as_deref().unwrap_or("unknown"),
                "Cannot verify API key"
            );
            metrics::record_gate_decision("secret_unavailable");
            GateError::from(e)
        })?;

        if !constant_time_eq(provided, &expected) {
            return Err(self.deny(
                AuditEventType::InvalidCredential,
                request,
                GateError::InvalidCredential,
            ));
        }

        self.audit.record(&AuditEvent::new(AuditEventType::Authorized, request));
        metrics::record_gate_decision(AuditEventType::Authorized.as_str());
        Ok(())
    }

    async fn expected_key(&self) -> Result<String, SecretError> {
        match tokio::time::timeout(self.secret_timeout, self.secrets.expected_key()).await {
            Ok(result) => result,
            Err(_) => Err(SecretError::Timeout(self.secret_timeout)),
        }
    }

    fn deny(&self, kind: AuditEventType, request: &GateRequest, err: GateError) -> GateError {
        self.audit.record(&AuditEvent::new(kind, request));
        metrics::record_gate_decision(kind.as_str());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::FixedWindowLimiter;
    use futures_util::future::{BoxFuture, FutureExt};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuditEventType>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<AuditEventType> {
            self.events.lock().unwrap().clone()
        }
    }

    impl AuditSink for RecordingSink {
        fn record(&self, event: &AuditEvent) {
            self.events.lock().unwrap().push(event.event_type);
        }
    }

    struct FailingProvider;

    impl SecretProvider for FailingProvider {
        fn expected_key(&self) -> BoxFuture<'_, Result<String, SecretError>> {
            async { Err(SecretError::NotSet("API_KEY".into())) }.boxed()
        }
    }

    struct HangingProvider;

    impl SecretProvider for HangingProvider {
        fn expected_key(&self) -> BoxFuture<'_, Result<String, SecretError>> {
            futures_util::future::pending().boxed()
        }
    }

    fn gate_with(
        max_requests: u64,
        secrets: Arc<dyn SecretProvider>,
    ) -> (AccessGate, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let gate = AccessGate::new(
            Arc::new(FixedWindowLimiter::new(Duration::from_secs(15 * 60), max_requests)),
            secrets,
            sink.clone(),
            Duration::from_millis(50),
        );
        (gate, sink)
    }

    fn gate(max_requests: u64) -> (AccessGate, Arc<RecordingSink>) {
        gate_with(max_requests, Arc::new(secrets::StaticSecretProvider::new("s3cr3t")))
    }

    fn request(credential: Option<&str>) -> GateRequest {
        GateRequest {
            identity: ClientIdentity::Addr([10, 1, 2, 3].into()),
            credential: credential.map(str::to_string),
            method: "GET".into(),
            path: "/secure".into(),
            user_agent: None,
            host: None,
            origin: None,
            request_id: None,
        }
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let (gate, sink) = gate(100);
        let err = gate.check(&request(None), Instant::now()).await.unwrap_err();

        assert!(matches!(err, GateError::MissingCredential));
        assert_eq!(err.status_code().as_u16(), 401);
        assert_eq!(sink.events(), vec![AuditEventType::MissingCredential]);
    }

    #[tokio::test]
    async fn test_invalid_credential() {
        let (gate, sink) = gate(100);
        let err = gate.check(&request(Some("s3cr3u")), Instant::now()).await.unwrap_err();

        assert!(matches!(err, GateError::InvalidCredential));
        assert_eq!(err.status_code().as_u16(), 403);
        assert_eq!(sink.events(), vec![AuditEventType::InvalidCredential]);
    }

    #[tokio::test]
    async fn test_authorized() {
        let (gate, sink) = gate(100);
        gate.check(&request(Some("s3cr3t")), Instant::now()).await.unwrap();
        assert_eq!(sink.events(), vec![AuditEventType::Authorized]);
    }

    #[tokio::test]
    async fn test_rate_limit_short_circuits() {
        let (gate, sink) = gate(1);
        let now = Instant::now();

        gate.check(&request(Some("s3cr3t")), now).await.unwrap();
        let err = gate.check(&request(Some("s3cr3t")), now).await.unwrap_err();

        assert!(matches!(err, GateError::RateLimited));
        assert_eq!(err.status_code().as_u16(), 429);
        assert_eq!(
            sink.events(),
            vec![AuditEventType::Authorized, AuditEventType::RateLimited]
        );
    }

    #[tokio::test]
    async fn test_rate_limited_request_without_key_is_not_audited_as_missing() {
        let (gate, sink) = gate(1);
        let now = Instant::now();

        let _ = gate.check(&request(None), now).await;
        let err = gate.check(&request(None), now).await.unwrap_err();

        assert!(matches!(err, GateError::RateLimited));
        assert_eq!(
            sink.events(),
            vec![AuditEventType::MissingCredential, AuditEventType::RateLimited]
        );
    }

    #[tokio::test]
    async fn test_hundred_and_one_requests() {
        let (gate, sink) = gate(100);
        let start = Instant::now();
        let keys = [Some("s3cr3t"), Some("wrong!"), None];

        let mut statuses = Vec::new();
        for i in 0..101u64 {
            let req = request(keys[(i % 3) as usize]);
            let status = match gate.check(&req, start + Duration::from_millis(i * 5)).await {
                Ok(()) => 200,
                Err(e) => e.status_code().as_u16(),
            };
            statuses.push(status);
        }

        assert!(statuses[..100].iter().all(|s| [200, 401, 403].contains(s)));
        assert_eq!(statuses[100], 429);
        assert_eq!(sink.events().len(), 101);
        assert_eq!(sink.events()[100], AuditEventType::RateLimited);
    }

    #[tokio::test]
    async fn test_secret_failure_is_500_without_audit() {
        let (gate, sink) = gate_with(100, Arc::new(FailingProvider));
        let err = gate.check(&request(Some("s3cr3t")), Instant::now()).await.unwrap_err();

        assert!(matches!(err, GateError::SecretUnavailable(SecretError::NotSet(_))));
        assert_eq!(err.status_code().as_u16(), 500);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_secret_lookup_times_out() {
        let (gate, _sink) = gate_with(100, Arc::new(HangingProvider));
        let err = gate.check(&request(Some("s3cr3t")), Instant::now()).await.unwrap_err();
        assert!(matches!(err, GateError::SecretUnavailable(SecretError::Timeout(_))));
    }

    #[test]
    fn test_request_from_parts() {
        let (parts, _) = axum::http::Request::builder()
            .method("POST")
            .uri("/secure?x=1")
            .header(API_KEY_HEADER, "abc")
            .header(header::USER_AGENT, "probe/1.0")
            .header(X_REQUEST_ID, "req-1")
            .body(())
            .unwrap()
            .into_parts();

        let req = GateRequest::from_parts(&parts);
        assert_eq!(req.identity, ClientIdentity::Unknown);
        assert_eq!(req.credential.as_deref(), Some("abc"));
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/secure");
        assert_eq!(req.user_agent.as_deref(), Some("probe/1.0"));
        assert_eq!(req.request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_empty_or_binary_key_counts_as_missing() {
        let (parts, _) = axum::http::Request::builder()
            .header(API_KEY_HEADER, "")
            .body(())
            .unwrap()
            .into_parts();
        assert!(GateRequest::from_parts(&parts).credential.is_none());

        let (parts, _) = axum::http::Request::builder()
            .header(API_KEY_HEADER, axum::http::HeaderValue::from_bytes(b"k\xffy").unwrap())
            .body(())
            .unwrap()
            .into_parts();
        assert!(GateRequest::from_parts(&parts).credential.is_none());
    }
}
