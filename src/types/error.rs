use thiserror::Error;

/// Errors produced by the transport and configuration layers.
///
/// Lifecycle operations on [`LiveConnection`](crate::LiveConnection) never
/// return these; they are turned into `error`/`close` events and log lines.
#[derive(Error, Debug)]
pub enum LiveError {
    /// WebSocket protocol error (handshake failed, invalid frame, etc.)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// General connection error with descriptive message
    #[error("Connection error: {0}")]
    Connection(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error (malformed endpoint or origin)
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The origin cannot be mapped to a WebSocket endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Rejected configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Handshake did not complete in time
    #[error("Timeout error")]
    Timeout,

    /// Attempted operation while not connected to the server
    #[error("Not connected")]
    NotConnected,
}

/// Convenience type alias for `Result<T, LiveError>`.
pub type Result<T> = std::result::Result<T, LiveError>;
