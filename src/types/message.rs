use crate::types::constants::wire_events;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Time stamp carried on an envelope.
///
/// The dashboard emits epoch milliseconds; the backend has been seen sending
/// ISO-8601 strings, so both are accepted. Anything else is kept as-is
/// rather than rejecting the envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
    Other(serde_json::Value),
}

impl Timestamp {
    pub fn now() -> Self {
        Self::Millis(now_millis())
    }
}

/// Milliseconds since the Unix epoch, clamped to zero for pre-epoch clocks.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Wire message exchanged in both directions: `{type, data?, timestamp?}`.
///
/// Other top-level fields are kept in `extra` and serialized back, so the
/// envelope round-trips the object the server sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EventEnvelope {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: None,
            timestamp: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Outbound liveness probe
    pub fn heartbeat() -> Self {
        Self::new(wire_events::HEARTBEAT).with_timestamp(Timestamp::now())
    }

    /// Reply to a server-initiated heartbeat
    pub fn heartbeat_response() -> Self {
        Self::new(wire_events::HEARTBEAT_RESPONSE).with_timestamp(Timestamp::now())
    }

    /// Payload handed to a typed bucket: `data`, or the whole envelope when
    /// `data` is absent or null.
    pub fn bucket_payload(&self) -> serde_json::Value {
        match &self.data {
            Some(data) => data.clone(),
            None => serde_json::to_value(self).unwrap_or(serde_json::Value::Null),
        }
    }
}
