/// Wire event type strings (magic strings layer)
pub mod wire_events {
    pub const TRANSACTION: &str = "transaction";
    pub const ALERT: &str = "alert";
    pub const STATUS: &str = "status";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const HEARTBEAT_RESPONSE: &str = "heartbeat_response";
}

/// Local lifecycle event names; never accepted from the wire
pub mod lifecycle_events {
    pub const OPEN: &str = "open";
    pub const CLOSE: &str = "close";
    pub const ERROR: &str = "error";
    pub const MESSAGE: &str = "message";
    pub const STATE: &str = "state";
}

/// Path of the monitoring socket, relative to the page origin
pub const MONITOR_PATH: &str = "/ws/monitor";

/// Default heartbeat interval (milliseconds)
pub const HEARTBEAT_INTERVAL: u64 = 30_000;

/// Default first reconnect delay (milliseconds)
pub const RECONNECT_BASE_DELAY: u64 = 1_000;

/// Default upper bound for a reconnect delay (milliseconds)
pub const RECONNECT_MAX_DELAY: u64 = 30_000;

/// Default number of automatic reconnects before giving up
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Pause between the disconnect and connect halves of a manual reconnect (milliseconds)
pub const MANUAL_RECONNECT_DELAY: u64 = 1_000;

/// Default handshake timeout (milliseconds)
pub const DEFAULT_TIMEOUT: u64 = 10_000;

/// How long `disconnect` waits for the close frame to be flushed (milliseconds)
pub const CLOSE_FLUSH_TIMEOUT: u64 = 1_000;

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;
pub const WS_CLOSE_ABNORMAL: u16 = 1006;

pub const MANUAL_DISCONNECT_REASON: &str = "Manual disconnect";
