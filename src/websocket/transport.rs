use crate::types::Result;
use async_trait::async_trait;

/// Close frame details as received from the peer
#[derive(Debug, Clone, PartialEq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

/// Inbound frames the connection cares about
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Text(String),
    Close(Option<CloseFrame>),
    /// Ping, pong, binary and raw frames; logged and ignored
    Other(&'static str),
}

/// Write half of a transport
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Send a close frame with `code` and flush
    async fn close(&mut self, code: u16, reason: String) -> Result<()>;
}

/// Read half of a transport. `None` means the stream ended without a close frame.
#[async_trait]
pub trait FrameStream: Send {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame>>;
}

/// A freshly opened transport, already split
pub struct Transport {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

/// Opens transports to an endpoint. One call per connection attempt; the
/// returned halves are never reused across attempts.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Transport>;
}
