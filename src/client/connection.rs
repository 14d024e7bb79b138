use crate::types::{LiveError, Result};
use crate::websocket::FrameSink;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

pub(crate) enum Outbound {
    Text(String),
    Close {
        code: u16,
        reason: String,
        done: oneshot::Sender<()>,
    },
}

/// Handle to the writer task of one transport.
///
/// Frames are queued in order on an unbounded channel; `send_text` never
/// waits on the network.
#[derive(Clone)]
pub struct ConnectionManager {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionManager {
    /// Take ownership of `sink` and return the handle plus the writer future.
    /// `on_failure` runs once if a write fails.
    pub(crate) fn new<F>(
        sink: Box<dyn FrameSink>,
        on_failure: F,
    ) -> (Self, impl std::future::Future<Output = ()> + Send + 'static)
    where
        F: FnOnce(LiveError) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, run_writer(sink, rx, on_failure))
    }

    /// Queue a text frame for the transport
    pub fn send_text(&self, text: String) -> Result<()> {
        self.tx
            .send(Outbound::Text(text))
            .map_err(|_| LiveError::NotConnected)
    }

    /// Queue a close frame without waiting for it. The receiver resolves
    /// once the frame is written and the transport released.
    pub(crate) fn request_close(&self, code: u16, reason: &str) -> Result<oneshot::Receiver<()>> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Outbound::Close {
                code,
                reason: reason.to_string(),
                done: done_tx,
            })
            .map_err(|_| LiveError::NotConnected)?;
        Ok(done_rx)
    }

    /// Queue a close frame and wait up to `flush_timeout` for it to be written
    pub async fn close(&self, code: u16, reason: &str, flush_timeout: Duration) -> Result<()> {
        let done_rx = self.request_close(code, reason)?;
        match tokio::time::timeout(flush_timeout, done_rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(LiveError::NotConnected),
            Err(_) => Err(LiveError::Timeout),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

async fn run_writer<F>(
    mut sink: Box<dyn FrameSink>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    on_failure: F,
) where
    F: FnOnce(LiveError) + Send + 'static,
{
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Text(text) => {
                if let Err(e) = sink.send_text(text).await {
                    tracing::error!("WebSocket write error: {}", e);
                    on_failure(e);
                    return;
                }
            }
            Outbound::Close { code, reason, done } => {
                if let Err(e) = sink.close(code, reason).await {
                    tracing::warn!("Failed to send close frame: {}", e);
                }
                // Release the transport before acknowledging
                drop(sink);
                let _ = done.send(());
                tracing::debug!("Writer task finished after close");
                return;
            }
        }
    }
    tracing::debug!("Writer task finished");
}
