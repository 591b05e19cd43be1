//! Route handlers for both server profiles.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::gate::{GateRequest, API_KEY_HEADER};
use crate::http::server::AppState;
use crate::security::ClientIdentity;

/// Key the insecure profile falls back to when none is configured.
pub const INSECURE_DEFAULT_KEY: &str = "changeme";

pub const SECURE_FEATURES: &[&str] = &[
    "Security headers",
    "Rate limiting",
    "Secret provider integration",
    "Structured logging",
    "Input validation",
];

pub async fn secure_index(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "message": "CloudSecurity example app (SECURE VERSION)",
        "host": state.hostname.as_ref(),
        "status": "Running with security best practices",
        "features": SECURE_FEATURES,
    }))
}

pub async fn insecure_index(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "message": "CloudSecurity example app (INSECURE VERSION)",
        "host": state.hostname.as_ref(),
        "warning": "This build has intentional vulnerabilities for analysis",
    }))
}

pub async fn secure_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": state.started_at.elapsed().as_secs_f64(),
    }))
}

pub async fn insecure_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Protected resource behind the access gate.
pub async fn secure_resource(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, _body) = request.into_parts();
    let gate_request = GateRequest::from_parts(&parts);

    match state.gate.check(&gate_request, Instant::now()).await {
        Ok(()) => Json(json!({
            "secret": "protected-sample-data",
            "timestamp": Utc::now().to_rfc3339(),
            "accessGranted": true,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Protected resource as the insecure profile serves it: short-circuiting
/// string equality, a guessable fallback key and a bare log line.
pub async fn insecure_resource(State(state): State<AppState>, request: Request<Body>) -> Response {
    let expected = match state.secrets.expected_key().await {
        Ok(key) => key,
        Err(_) => INSECURE_DEFAULT_KEY.to_string(),
    };
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if !key.is_empty() && key == expected => Json(json!({
            "secret": "sample-sensitive-data",
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        _ => {
            let ip = ClientIdentity::from_extensions(request.extensions());
            tracing::warn!("Unauthorized access attempt from {}", ip);
            (
                axum::http::StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response()
        }
    }
}

/// Best-effort host name for the index payload.
pub fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
