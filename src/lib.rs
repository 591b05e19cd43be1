//! API key gate demo service.
//!
//! One binary, two hardening profiles. The insecure profile shows the usual
//! mistakes (open CORS, no throttling, guessable key, no audit trail). The
//! secure profile puts `/secure` behind the access gate: fixed-window rate
//! limit, constant-time key comparison and structured audit events.

pub mod config;
pub mod gate;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod probe;
pub mod security;

pub use config::AppConfig;
pub use gate::AccessGate;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
