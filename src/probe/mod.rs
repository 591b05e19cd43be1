//! Black-box probes that compare the two server profiles.
//!
//! Each probe issues plain HTTP requests against a running server and turns
//! the responses into a `CheckReport` via the rules in `checks.rs`.

pub mod checks;
pub mod report;

use std::time::{Duration, Instant};

use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};

use crate::gate::API_KEY_HEADER;
use crate::http::handlers::INSECURE_DEFAULT_KEY;

pub use checks::{RateLimitTally, SecureStatuses};
pub use report::{overall, CheckReport, Verdict};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// HTTP client bound to one server's base URL.
pub struct ProbeClient {
    http: reqwest::Client,
    base: String,
}

impl ProbeClient {
    pub fn new(base: impl Into<String>) -> Result<Self, ProbeError> {
        let base = base.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .map_err(|source| ProbeError::Http {
                url: base.clone(),
                source,
            })?;
        Ok(Self { http, base })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(
        &self,
        path: &str,
        key: Option<&str>,
        origin: Option<&str>,
    ) -> Result<reqwest::Response, ProbeError> {
        let url = self.url(path);
        let mut req = self.http.get(&url);
        if let Some(key) = key {
            req = req.header(API_KEY_HEADER, key);
        }
        if let Some(origin) = origin {
            req = req.header(ORIGIN, origin);
        }
        req.send()
            .await
            .map_err(|source| ProbeError::Http { url, source })
    }

    pub async fn health(&self) -> CheckReport {
        match self.get("/health", None, None).await {
            Ok(res) => checks::evaluate_health(res.status().as_u16()),
            Err(e) => CheckReport::new("health", Verdict::Fail, "offline").detail(e.to_string()),
        }
    }

    pub async fn basic(&self) -> CheckReport {
        let start = Instant::now();
        match self.get("/", None, None).await {
            Ok(res) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                let status = res.status().as_u16();
                let body = res.json::<serde_json::Value>().await.unwrap_or_default();
                checks::evaluate_basic(status, elapsed_ms, &body)
            }
            Err(e) => CheckReport::new("basic", Verdict::Fail, "unreachable").detail(e.to_string()),
        }
    }

    /// Probe `/secure` with no key, a wrong key, the default key and,
    /// optionally, a key the operator supplies.
    pub async fn secure(&self, key: Option<&str>) -> CheckReport {
        let result = async {
            let missing = self.get("/secure", None, None).await?.status().as_u16();
            let wrong = self
                .get("/secure", Some("definitely-not-the-key"), None)
                .await?
                .status()
                .as_u16();
            let default_key = self
                .get("/secure", Some(INSECURE_DEFAULT_KEY), None)
                .await?
                .status()
                .as_u16();
            let provided = match key {
                Some(k) => Some(self.get("/secure", Some(k), None).await?.status().as_u16()),
                None => None,
            };
            Ok::<_, ProbeError>(SecureStatuses {
                missing,
                wrong,
                default_key,
                provided,
            })
        }
        .await;

        match result {
            Ok(statuses) => checks::evaluate_secure(statuses),
            Err(e) => CheckReport::new("secure", Verdict::Fail, "unreachable").detail(e.to_string()),
        }
    }

    /// Fire `requests` sequential GETs at `/health`.
    pub async fn rate_limit(&self, requests: usize, pause: Duration) -> CheckReport {
        let mut tally = RateLimitTally::default();
        for _ in 0..requests {
            let status = self
                .get("/health", None, None)
                .await
                .ok()
                .map(|res| res.status().as_u16());
            tally.observe(status);
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
        checks::evaluate_rate_limit(tally)
    }

    pub async fn headers(&self) -> CheckReport {
        match self.get("/", None, None).await {
            Ok(res) => checks::evaluate_headers(res.headers()),
            Err(e) => CheckReport::new("headers", Verdict::Fail, "unreachable").detail(e.to_string()),
        }
    }

    pub async fn cors(&self, origin: &str) -> CheckReport {
        match self.get("/", None, Some(origin)).await {
            Ok(res) => {
                let allow = res
                    .headers()
                    .get(ACCESS_CONTROL_ALLOW_ORIGIN)
                    .and_then(|v| v.to_str().ok());
                checks::evaluate_cors(origin, allow)
            }
            Err(e) => CheckReport::new("cors", Verdict::Fail, "unreachable").detail(e.to_string()),
        }
    }
}
