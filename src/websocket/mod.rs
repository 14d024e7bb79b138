// WebSocket module - Transport traits and the tungstenite-backed factory
pub mod factory;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use factory::WebSocketFactory;
pub use transport::{CloseFrame, Connector, FrameSink, FrameStream, InboundFrame, Transport};
