use super::{EventKind, ListenerRegistry, LiveEvent};
use crate::types::EventEnvelope;
use crate::types::constants::wire_events;
use std::sync::Arc;

/// What the connection must do after a frame was routed
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Dispatched,
    /// Server probe; answer with `heartbeat_response`
    HeartbeatProbe,
    /// Server answered one of our probes
    HeartbeatAck,
    Malformed,
}

/// Routes inbound text frames to listener buckets
pub struct MessageRouter {
    registry: Arc<ListenerRegistry>,
}

impl MessageRouter {
    pub fn new(registry: Arc<ListenerRegistry>) -> Self {
        Self { registry }
    }

    /// Parse one frame and notify listeners: `message` always, then the
    /// bucket named by the envelope type if it is a known or registered one.
    pub fn route(&self, text: &str) -> RouteOutcome {
        let envelope = match serde_json::from_str::<EventEnvelope>(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!("Failed to parse message: {} - Raw: {}", e, text);
                return RouteOutcome::Malformed;
            }
        };

        tracing::debug!("Routing message: type={}", envelope.kind);

        let bucket = EventKind::from_wire(&envelope.kind);
        let payload = bucket.as_ref().map(|_| envelope.bucket_payload());
        let kind = envelope.kind.clone();

        self.registry
            .emit(&EventKind::Message, &LiveEvent::Message(envelope));

        if let (Some(bucket), Some(payload)) = (bucket, payload) {
            let routable = matches!(
                bucket,
                EventKind::Transaction | EventKind::Alert | EventKind::Status
            ) || self.registry.has_listeners(&bucket);

            if routable {
                let event = LiveEvent::from_bucket(&bucket, payload);
                let delivered = self.registry.emit(&bucket, &event);
                tracing::debug!("Delivered '{}' to {} listener(s)", bucket, delivered);
            } else if !is_heartbeat(&kind) {
                tracing::debug!("No bucket for message type '{}'", kind);
            }
        }

        match kind.as_str() {
            wire_events::HEARTBEAT => RouteOutcome::HeartbeatProbe,
            wire_events::HEARTBEAT_RESPONSE => RouteOutcome::HeartbeatAck,
            _ => RouteOutcome::Dispatched,
        }
    }
}

fn is_heartbeat(kind: &str) -> bool {
    kind == wire_events::HEARTBEAT || kind == wire_events::HEARTBEAT_RESPONSE
}
