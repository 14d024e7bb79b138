use crate::client::ConnectionState;
use crate::types::constants::{lifecycle_events, wire_events};
use crate::types::{EventEnvelope, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of a listener bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Close,
    Error,
    Message,
    State,
    Transaction,
    Alert,
    Status,
    /// Application-defined bucket, matched against the envelope `type`
    Custom(String),
}

impl EventKind {
    /// Parse a string into an EventKind
    pub fn parse(s: &str) -> Self {
        match s {
            lifecycle_events::OPEN => Self::Open,
            lifecycle_events::CLOSE => Self::Close,
            lifecycle_events::ERROR => Self::Error,
            lifecycle_events::MESSAGE => Self::Message,
            lifecycle_events::STATE => Self::State,
            wire_events::TRANSACTION => Self::Transaction,
            wire_events::ALERT => Self::Alert,
            wire_events::STATUS => Self::Status,
            _ => Self::Custom(s.to_string()),
        }
    }

    /// Bucket an inbound envelope type may be routed to, besides `message`.
    ///
    /// Lifecycle names are local-only; a server cannot fake an `open` or `close`.
    pub fn from_wire(s: &str) -> Option<Self> {
        match Self::parse(s) {
            Self::Open | Self::Close | Self::Error | Self::Message | Self::State => None,
            kind => Some(kind),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => lifecycle_events::OPEN,
            Self::Close => lifecycle_events::CLOSE,
            Self::Error => lifecycle_events::ERROR,
            Self::Message => lifecycle_events::MESSAGE,
            Self::State => lifecycle_events::STATE,
            Self::Transaction => wire_events::TRANSACTION,
            Self::Alert => wire_events::ALERT,
            Self::Status => wire_events::STATUS,
            Self::Custom(s) => s,
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alert severity. The backend is not consistent about casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// A scored transaction pushed by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionEvent {
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fraud: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Fields the dashboard does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A fraud alert raised by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AlertEvent {
    pub fn severity_level(&self) -> Severity {
        self.severity
            .as_deref()
            .map(Severity::parse)
            .unwrap_or(Severity::Unknown)
    }
}

/// Health of backend components, keyed by component name
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct StatusEvent {
    pub components: BTreeMap<String, serde_json::Value>,
}

impl StatusEvent {
    pub fn is_healthy(&self, component: &str) -> bool {
        self.components
            .get(component)
            .and_then(|v| v.as_str())
            .is_some_and(|s| s == "healthy")
    }
}

/// Payload of a bucket that has no typed shape, or whose payload did not fit it
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessageEvent {
    pub kind: String,
    pub payload: serde_json::Value,
}

/// How a transport cycle ended
#[derive(Debug, Clone, PartialEq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    /// Normal closure (1000)
    pub clean: bool,
    /// Reconnect attempts are exhausted; only an explicit `connect()` recovers
    pub terminal: bool,
    pub will_reconnect: bool,
}

/// Everything a listener can receive
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Open,
    Close(CloseInfo),
    Error(String),
    State(ConnectionState),
    Message(EventEnvelope),
    Transaction(TransactionEvent),
    Alert(AlertEvent),
    Status(StatusEvent),
    Raw(RawMessageEvent),
}

impl LiveEvent {
    /// Build the typed event for a wire bucket, falling back to `Raw` when the
    /// payload does not have the expected shape.
    pub fn from_bucket(kind: &EventKind, payload: serde_json::Value) -> Self {
        let typed = match kind {
            EventKind::Transaction => {
                serde_json::from_value(payload.clone()).map(Self::Transaction)
            }
            EventKind::Alert => serde_json::from_value(payload.clone()).map(Self::Alert),
            EventKind::Status => serde_json::from_value(payload.clone()).map(Self::Status),
            _ => {
                return Self::Raw(RawMessageEvent {
                    kind: kind.as_str().to_string(),
                    payload,
                });
            }
        };

        typed.unwrap_or_else(|e| {
            tracing::warn!(
                "Payload for '{}' does not match the typed shape ({}), delivering raw",
                kind,
                e
            );
            Self::Raw(RawMessageEvent {
                kind: kind.as_str().to_string(),
                payload,
            })
        })
    }

    /// The JSON form of the payload, as the backend sent it where applicable
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Transaction(t) => serde_json::to_value(t).unwrap_or_default(),
            Self::Alert(a) => serde_json::to_value(a).unwrap_or_default(),
            Self::Status(s) => serde_json::to_value(s).unwrap_or_default(),
            Self::Message(envelope) => serde_json::to_value(envelope).unwrap_or_default(),
            Self::Raw(raw) => raw.payload.clone(),
            Self::Error(message) => serde_json::Value::String(message.clone()),
            Self::Open | Self::Close(_) | Self::State(_) => serde_json::Value::Null,
        }
    }
}
