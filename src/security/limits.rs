//! Request size limits.
//!
//! Oversized bodies are rejected with 413 Payload Too Large before a handler
//! reads them.

use tower_http::limit::RequestBodyLimitLayer;

use crate::config::SecurityConfig;

pub fn body_limit(config: &SecurityConfig) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(config.max_body_size)
}
