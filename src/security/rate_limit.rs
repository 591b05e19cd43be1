//! Fixed-window rate limiting keyed by client identity.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Extensions, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::{mapref::entry::Entry, DashMap};

use crate::gate::GateError;
use crate::observability::metrics;

/// Rate-limit key for a caller.
///
/// Requests whose peer address cannot be resolved all share the `Unknown`
/// bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientIdentity {
    Addr(IpAddr),
    Unknown,
}

impl ClientIdentity {
    /// Resolve the identity from the connection info axum stores on the request.
    pub fn from_extensions(extensions: &Extensions) -> Self {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| ClientIdentity::Addr(addr.ip()))
            .unwrap_or(ClientIdentity::Unknown)
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIdentity::Addr(ip) => write!(f, "{ip}"),
            ClientIdentity::Unknown => f.write_str("unknown"),
        }
    }
}

/// Admission decision for one request from one identity.
pub trait RateLimiter: Send + Sync {
    fn allow(&self, identity: &ClientIdentity, now: Instant) -> bool;
}

/// Admits everything. Used when `rate_limit.enabled = false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn allow(&self, _identity: &ClientIdentity, _now: Instant) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    window_start: Instant,
    count: u64,
}

/// In-memory fixed-window counter.
///
/// Every call increments the identity's count, including calls that are
/// already over the limit. The window is never reset early by rejections.
pub struct FixedWindowLimiter {
    windows: DashMap<ClientIdentity, RateWindow>,
    window: Duration,
    max_requests: u64,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u64) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            max_requests,
        }
    }

    fn expired(&self, state: &RateWindow, now: Instant) -> bool {
        now.saturating_duration_since(state.window_start) >= self.window
    }

    /// Drop windows that have logically expired.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, state| !self.expired(state, now));
        before.saturating_sub(self.windows.len())
    }

    /// Current count for an identity, if it has a live entry.
    pub fn count(&self, identity: &ClientIdentity) -> Option<u64> {
        self.windows.get(identity).map(|state| state.count)
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn allow(&self, identity: &ClientIdentity, now: Instant) -> bool {
        // The entry guard holds the shard lock, so the read-modify-write
        // below is atomic per identity.
        match self.windows.entry(identity.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(RateWindow {
                    window_start: now,
                    count: 1,
                });
                true
            }
            Entry::Occupied(mut slot) => {
                let expired = self.expired(slot.get(), now);
                let state = slot.get_mut();
                if expired {
                    state.window_start = now;
                    state.count = 1;
                    return true;
                }
                state.count = state.count.saturating_add(1);
                state.count <= self.max_requests
            }
        }
    }
}

/// Run the periodic eviction of expired windows until the process exits.
pub async fn run_sweeper(limiter: Arc<FixedWindowLimiter>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let removed = limiter.sweep(Instant::now());
        if removed > 0 {
            tracing::debug!(removed, remaining = limiter.len(), "Swept expired rate windows");
        }
    }
}

/// Middleware applying the limiter to public routes.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<dyn RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let identity = ClientIdentity::from_extensions(request.extensions());

    if limiter.allow(&identity, Instant::now()) {
        next.run(request).await
    } else {
        tracing::warn!(client = %identity, path = %request.uri().path(), "Rate limit exceeded");
        metrics::record_rate_limited("public");
        GateError::RateLimited.into_response()
    }
}
