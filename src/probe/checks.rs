//! Pass/warn/fail rules for each probe, kept free of network I/O.

use reqwest::header::HeaderMap;

use crate::probe::report::{CheckReport, Verdict};

/// Headers whose presence protects the client.
pub const PROTECTIVE_HEADERS: &[&str] = &[
    "x-content-type-options",
    "x-frame-options",
    "x-xss-protection",
    "strict-transport-security",
    "content-security-policy",
    "x-dns-prefetch-control",
];

/// Headers whose presence discloses server internals.
pub const DISCLOSING_HEADERS: &[&str] = &["x-powered-by"];

pub fn evaluate_health(status: u16) -> CheckReport {
    if (200..300).contains(&status) {
        CheckReport::new("health", Verdict::Pass, format!("online ({status})"))
    } else {
        CheckReport::new("health", Verdict::Fail, format!("unhealthy ({status})"))
    }
}

pub fn evaluate_basic(status: u16, elapsed_ms: f64, body: &serde_json::Value) -> CheckReport {
    let verdict = if (200..300).contains(&status) {
        Verdict::Pass
    } else {
        Verdict::Fail
    };
    let mut report =
        CheckReport::new("basic", verdict, format!("status {status} in {elapsed_ms:.2}ms"));
    if body.get("warning").is_some() {
        report = report.detail("server advertises that it runs a vulnerable build");
    }
    report
}

pub fn evaluate_headers(headers: &HeaderMap) -> CheckReport {
    let mut present = 0;
    let mut lines = Vec::new();

    for name in PROTECTIVE_HEADERS {
        match headers.get(*name).and_then(|v| v.to_str().ok()) {
            Some(value) => {
                present += 1;
                lines.push(format!("ok       {name}: {value}"));
            }
            None => lines.push(format!("missing  {name}")),
        }
    }

    let mut disclosed = 0;
    for name in DISCLOSING_HEADERS {
        if let Some(value) = headers.get(*name).and_then(|v| v.to_str().ok()) {
            disclosed += 1;
            lines.push(format!("leaks    {name}: {value}"));
        }
    }

    let total = PROTECTIVE_HEADERS.len();
    let verdict = if present >= 5 && disclosed == 0 {
        Verdict::Pass
    } else if present >= 3 {
        Verdict::Warn
    } else {
        Verdict::Fail
    };

    let mut summary = format!("{present}/{total} protective headers");
    if disclosed > 0 {
        summary.push_str(", server stack disclosed");
    }

    let mut report = CheckReport::new("headers", verdict, summary);
    for line in lines {
        report = report.detail(line);
    }
    if verdict != Verdict::Pass {
        report = report
            .detail("exposed to: clickjacking, XSS, MIME sniffing, information disclosure");
    }
    report
}

/// Tally of a burst of requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitTally {
    pub successful: usize,
    pub blocked: usize,
    pub errors: usize,
}

impl RateLimitTally {
    pub fn observe(&mut self, status: Option<u16>) {
        match status {
            Some(s) if (200..300).contains(&s) => self.successful += 1,
            Some(429) => self.blocked += 1,
            _ => self.errors += 1,
        }
    }
}

pub fn evaluate_rate_limit(tally: RateLimitTally) -> CheckReport {
    let summary = format!(
        "{} ok, {} blocked, {} errors",
        tally.successful, tally.blocked, tally.errors
    );
    if tally.blocked > 0 {
        CheckReport::new("rate-limit", Verdict::Pass, summary)
            .detail("burst was throttled: brute force and scraping are slowed down")
    } else if tally.errors > 0 {
        CheckReport::new("rate-limit", Verdict::Warn, summary)
            .detail("no 429 seen, but some requests failed")
    } else {
        CheckReport::new("rate-limit", Verdict::Fail, summary)
            .detail("every request was served: brute force and resource exhaustion are unbounded")
    }
}

/// Status codes returned to the API-key probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecureStatuses {
    pub missing: u16,
    pub wrong: u16,
    pub default_key: u16,
    pub provided: Option<u16>,
}

pub fn evaluate_secure(statuses: SecureStatuses) -> CheckReport {
    let mut verdict = Verdict::Pass;
    let mut details = Vec::new();

    if statuses.missing == 200 || statuses.wrong == 200 {
        verdict = Verdict::Fail;
        details.push("protected data served without a valid key".to_string());
    }

    if statuses.default_key == 200 {
        verdict = Verdict::Fail;
        details.push("predictable default key 'changeme' was accepted".to_string());
    }

    match (statuses.missing, statuses.wrong) {
        (401, 403) => details.push("missing and invalid keys are told apart (401/403)".to_string()),
        (401, 401) => {
            verdict = verdict.max(Verdict::Warn);
            details.push("every failure is a bare 401, no audit trail distinction".to_string());
        }
        (429, _) | (_, 429) => {
            verdict = verdict.max(Verdict::Warn);
            details.push("rate limited before the key could be checked".to_string());
        }
        _ => {}
    }

    match statuses.provided {
        Some(200) => details.push("supplied key was accepted".to_string()),
        Some(other) => {
            verdict = verdict.max(Verdict::Warn);
            details.push(format!("supplied key was refused ({other})"));
        }
        None => {}
    }

    let summary = format!(
        "no key -> {}, wrong key -> {}, default key -> {}",
        statuses.missing, statuses.wrong, statuses.default_key
    );
    let mut report = CheckReport::new("secure", verdict, summary);
    for line in details {
        report = report.detail(line);
    }
    report
}

pub fn evaluate_cors(origin: &str, allow_origin: Option<&str>) -> CheckReport {
    match allow_origin {
        Some("*") => CheckReport::new("cors", Verdict::Fail, "any origin may read responses")
            .detail("Access-Control-Allow-Origin: *"),
        Some(echoed) if echoed == origin => CheckReport::new(
            "cors",
            Verdict::Fail,
            format!("untrusted origin {origin} was allowed"),
        ),
        Some(other) => CheckReport::new(
            "cors",
            Verdict::Warn,
            format!("unexpected allow-origin {other}"),
        ),
        None => CheckReport::new(
            "cors",
            Verdict::Pass,
            format!("origin {origin} was not granted access"),
        ),
    }
}
