//! Request identification and access logging.
//!
//! # Responsibilities
//! - Generate a UUID v4 request ID when the client did not send one
//! - Echo the request ID on the response
//! - Emit one structured access-log line per request

use std::time::Instant;

use axum::{
    body::Body,
    http::{header, HeaderName, Request},
    middleware::Next,
    response::Response,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::observability::metrics;
use crate::security::ClientIdentity;

pub const X_REQUEST_ID: &str = "x-request-id";

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Structured access log for the secure profile.
pub async fn access_log_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let ip = ClientIdentity::from_extensions(request.extensions());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = next.run(request).await;
    let status = response.status().as_u16();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        ip = %ip,
        user_agent = %user_agent,
        status,
        latency_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    metrics::record_request(method.as_str(), status, start);

    response
}
