// Messaging module - Event types, listener registry and message routing
pub mod event;
pub mod registry;
pub mod router;

pub use event::{
    AlertEvent, CloseInfo, EventKind, LiveEvent, RawMessageEvent, Severity, StatusEvent,
    TransactionEvent,
};
pub use registry::{Callback, ListenerId, ListenerRegistry};
pub use router::{MessageRouter, RouteOutcome};
