//! Security audit events and the sinks that receive them.
//!
//! Sinks are best effort. A sink that cannot deliver an event drops it and
//! logs locally; it never reports failure back to the gate.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::gate::GateRequest;

/// Outcome recorded for a protected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    MissingCredential,
    InvalidCredential,
    Authorized,
    RateLimited,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::MissingCredential => "missing_credential",
            AuditEventType::InvalidCredential => "invalid_credential",
            AuditEventType::Authorized => "authorized",
            AuditEventType::RateLimited => "rate_limited",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AuditEventType::InvalidCredential | AuditEventType::RateLimited => Severity::Warning,
            AuditEventType::MissingCredential | AuditEventType::Authorized => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
}

/// One security-relevant decision.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub severity: Severity,
    pub ip: String,
    pub path: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, request: &GateRequest) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            severity: event_type.severity(),
            ip: request.identity.to_string(),
            path: request.path.clone(),
            method: request.method.clone(),
            user_agent: request.user_agent.clone(),
            host: request.host.clone(),
            origin: request.origin.clone(),
            request_id: request.request_id.clone(),
        }
    }
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Writes each event as one structured log line on the `security_audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::debug!(error = %e, "Dropping unserializable audit event");
                return;
            }
        };

        match event.severity {
            Severity::Warning => tracing::warn!(
                target: "security_audit",
                event_type = event.event_type.as_str(),
                ip = %event.ip,
                path = %event.path,
                method = %event.method,
                event = %payload,
                "[SECURITY]"
            ),
            Severity::Info => tracing::info!(
                target: "security_audit",
                event_type = event.event_type.as_str(),
                ip = %event.ip,
                path = %event.path,
                method = %event.method,
                event = %payload,
                "[SECURITY]"
            ),
        }
    }
}

/// Forwards events to an in-process consumer through a bounded channel.
///
/// A full or closed channel drops the event instead of waiting.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl ChannelAuditSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            tracing::debug!(error = %e, event_type = event.event_type.as_str(), "Audit event dropped");
        }
    }
}
