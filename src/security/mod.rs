//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (secure profile):
//!     → cors.rs (allow-listed origins only)
//!     → limits.rs (request body size)
//!     → rate_limit.rs (per-IP fixed window, public routes)
//!     → handler / access gate (which runs its own rate check)
//!     → headers.rs (security response headers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input
//! - Credential checks go through `compare::constant_time_eq` only

pub mod compare;
pub mod cors;
pub mod headers;
pub mod limits;
pub mod rate_limit;

pub use compare::constant_time_eq;
pub use rate_limit::{ClientIdentity, FixedWindowLimiter, RateLimiter};
