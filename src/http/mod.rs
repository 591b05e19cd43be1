//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (peer address kept as ConnectInfo)
//!     → server.rs (profile-specific router and middleware stack)
//!     → request.rs (request ID, access log)
//!     → handlers.rs (public routes, or the access gate for /secure)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
