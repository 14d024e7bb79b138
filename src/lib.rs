//! # fraudwatch-live
//!
//! Live event channel for the fraud monitoring dashboard. Keeps one
//! auto-reconnecting WebSocket to the backend's `/ws/monitor` endpoint,
//! sends liveness heartbeats, and dispatches `transaction`, `alert` and
//! `status` events to registered listeners.
//!
//! ## Example
//!
//! ```no_run
//! use fraudwatch_live::{LiveConnection, LiveConnectionOptions, LiveEvent, LiveFeed};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = LiveConnection::for_page(
//!         "https://fraud.example.com",
//!         LiveConnectionOptions::default(),
//!     )?;
//!
//!     connection.on("transaction", |event| {
//!         if let LiveEvent::Transaction(tx) = event {
//!             println!("{} -> {:?}", tx.transaction_id, tx.fraud_probability);
//!         }
//!     });
//!     let (feed, _listeners) = LiveFeed::attach(&connection);
//!
//!     connection.connect().await;
//!     // ...
//!     println!("{} alerts so far", feed.lock().unwrap().alert_count());
//!     connection.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod dashboard;
pub mod infrastructure;
pub mod messaging;
pub mod types;
pub mod websocket;

pub use client::{
    ConnectionSnapshot, ConnectionState, LiveConnection, LiveConnectionBuilder,
    LiveConnectionOptions,
};
pub use dashboard::{LiveFeed, Notice, NoticeLevel, RiskBand};
pub use messaging::{
    AlertEvent, CloseInfo, EventKind, ListenerId, LiveEvent, Severity, StatusEvent,
    TransactionEvent,
};
pub use types::{EventEnvelope, LiveError, Result, Timestamp};
pub use websocket::{Connector, WebSocketFactory};
