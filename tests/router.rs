//! In-process router tests. No socket, so no peer address: every request
//! falls into the shared `unknown` rate-limit identity.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use cloudsec_gate::config::{validate_config, ServerMode};
use cloudsec_gate::gate::secrets::{EnvSecretProvider, StaticSecretProvider};
use cloudsec_gate::gate::{AuditEvent, AuditEventType, ChannelAuditSink};
use cloudsec_gate::http::HttpServer;
use tokio::sync::mpsc;
use tower::ServiceExt;

mod common;

use common::{config, TEST_KEY};

fn secure_router(max_requests: u64) -> (Router, mpsc::Receiver<AuditEvent>) {
    let mut cfg = config(ServerMode::Secure);
    cfg.rate_limit.max_requests = max_requests;
    let (sink, rx) = ChannelAuditSink::new(64);
    let server = HttpServer::with_components(
        cfg,
        Arc::new(StaticSecretProvider::new(TEST_KEY)),
        Arc::new(sink),
    );
    (server.router(), rx)
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

async fn json(res: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_unresolved_clients_share_one_window() {
    let (router, mut audit) = secure_router(2);

    for _ in 0..2 {
        let res = router.clone().oneshot(get("/secure")).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
    let res = router.clone().oneshot(get("/secure")).await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    let mut kinds = Vec::new();
    while let Ok(event) = audit.try_recv() {
        assert_eq!(event.ip, "unknown");
        kinds.push(event.event_type);
    }
    assert_eq!(
        kinds,
        vec![
            AuditEventType::MissingCredential,
            AuditEventType::MissingCredential,
            AuditEventType::RateLimited
        ]
    );
}

#[tokio::test]
async fn test_preflight_is_answered_before_the_gate() {
    let (router, mut audit) = secure_router(100);
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/secure")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-api-key")
        .body(Body::empty())
        .unwrap();

    let res = router.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert!(audit.try_recv().is_err());
}

#[tokio::test]
async fn test_unavailable_key_source_is_generic_500() {
    let cfg = config(ServerMode::Secure);
    let (sink, mut audit) = ChannelAuditSink::new(8);
    let server = HttpServer::with_components(
        cfg,
        Arc::new(EnvSecretProvider::new(vec!["CLOUDSEC_ROUTER_UNSET".into()])),
        Arc::new(sink),
    );

    let req = Request::builder()
        .uri("/secure")
        .header("x-api-key", "anything")
        .body(Body::empty())
        .unwrap();
    let res = server.router().oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json(res).await;
    assert_eq!(body, serde_json::json!({ "error": "Internal server error" }));
    assert!(!body.to_string().contains("CLOUDSEC_ROUTER_UNSET"));
    assert!(audit.try_recv().is_err());
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let (router, _audit) = secure_router(100);
    let req = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-me-123")
        .body(Body::empty())
        .unwrap();

    let res = router.oneshot(req).await.unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-me-123");
}

#[tokio::test]
async fn test_unknown_route_is_404_with_headers() {
    let (router, _audit) = secure_router(100);
    let res = router.oneshot(get("/admin")).await.unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.headers().contains_key("x-content-type-options"));
}

#[tokio::test]
async fn test_validated_wildcard_cors_config_builds() {
    let mut cfg = config(ServerMode::Secure);
    cfg.cors.allowed_origins = vec!["*".into()];
    cfg.cors.allow_credentials = false;
    assert_eq!(validate_config(&cfg), Ok(()));

    let (sink, _audit) = ChannelAuditSink::new(8);
    let server = HttpServer::with_components(
        cfg,
        Arc::new(StaticSecretProvider::new(TEST_KEY)),
        Arc::new(sink),
    );

    let req = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://anywhere.example")
        .body(Body::empty())
        .unwrap();
    let res = server.router().oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
