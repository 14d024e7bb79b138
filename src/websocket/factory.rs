use super::transport::{CloseFrame, Connector, FrameSink, FrameStream, InboundFrame, Transport};
use crate::types::Result;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket factory backed by tokio-tungstenite
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketFactory;

#[async_trait]
impl Connector for WebSocketFactory {
    async fn connect(&self, endpoint: &str) -> Result<Transport> {
        tracing::debug!("Creating WebSocket connection to: {}", endpoint);

        let (ws_stream, response) = tokio_tungstenite::connect_async(endpoint).await?;
        tracing::debug!("Handshake completed with status {}", response.status());

        let (write_half, read_half) = ws_stream.split();
        Ok(Transport {
            sink: Box::new(WsSink { inner: write_half }),
            stream: Box::new(WsReader { inner: read_half }),
        })
    }
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.inner.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: String) -> Result<()> {
        let frame = WsCloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        };
        self.inner.send(Message::Close(Some(frame))).await?;
        if let Err(e) = self.inner.close().await {
            tracing::debug!("Sink already closed after close frame: {}", e);
        }
        Ok(())
    }
}

struct WsReader {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WsReader {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame>> {
        let frame = match self.inner.next().await? {
            Ok(Message::Text(text)) => InboundFrame::Text(text.as_str().to_string()),
            Ok(Message::Close(frame)) => InboundFrame::Close(frame.map(|f| CloseFrame {
                code: u16::from(f.code),
                reason: f.reason.as_str().to_string(),
            })),
            Ok(Message::Ping(_)) => InboundFrame::Other("ping"),
            Ok(Message::Pong(_)) => InboundFrame::Other("pong"),
            Ok(Message::Binary(_)) => InboundFrame::Other("binary"),
            Ok(Message::Frame(_)) => InboundFrame::Other("frame"),
            Err(e) => return Some(Err(e.into())),
        };
        Some(Ok(frame))
    }
}
