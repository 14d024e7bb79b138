//! In-memory connector for tests. Each accepted connection gets a
//! [`MockServer`] handle that scripts inbound frames and records what the
//! client wrote.

use super::transport::{CloseFrame, Connector, FrameSink, FrameStream, InboundFrame, Transport};
use crate::types::{LiveError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

type InboundItem = Option<Result<InboundFrame>>;

/// Server side of one accepted mock connection
#[derive(Clone)]
pub struct MockServer {
    inbound: mpsc::UnboundedSender<InboundItem>,
    sent: Arc<Mutex<Vec<String>>>,
    closed_with: Arc<Mutex<Option<(u16, String)>>>,
}

impl MockServer {
    pub fn push_text(&self, text: &str) {
        let _ = self.inbound.send(Some(Ok(InboundFrame::Text(text.to_string()))));
    }

    pub fn close_with(&self, code: u16) {
        let _ = self.inbound.send(Some(Ok(InboundFrame::Close(Some(CloseFrame {
            code,
            reason: String::new(),
        })))));
    }

    /// End the stream without a close frame
    pub fn drop_connection(&self) {
        let _ = self.inbound.send(None);
    }

    pub fn fail_read(&self) {
        let _ = self
            .inbound
            .send(Some(Err(LiveError::Connection("connection reset".to_string()))));
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
            .filter_map(|v| v.get("type").and_then(|t| t.as_str()).map(String::from))
            .collect()
    }

    pub fn closed_with(&self) -> Option<(u16, String)> {
        self.closed_with.lock().unwrap().clone()
    }
}

pub enum MockBehavior {
    Accept,
    Refuse,
}

/// Connector whose attempts succeed or fail according to a script.
/// Once the script is exhausted every attempt is accepted.
#[derive(Default)]
pub struct MockConnector {
    script: Mutex<VecDeque<MockBehavior>>,
    servers: Mutex<Vec<MockServer>>,
    attempts: Mutex<Vec<Instant>>,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    handshake_delay: Option<Duration>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scripted(behaviors: Vec<MockBehavior>) -> Arc<Self> {
        let connector = Self::default();
        *connector.script.lock().unwrap() = behaviors.into();
        Arc::new(connector)
    }

    /// Accepts every attempt after holding the handshake for `delay`
    pub fn delayed(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            handshake_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn refuse_all(count: usize) -> Arc<Self> {
        Self::scripted((0..count).map(|_| MockBehavior::Refuse).collect())
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn server(&self, index: usize) -> MockServer {
        self.servers.lock().unwrap()[index].clone()
    }

    pub fn last_server(&self) -> MockServer {
        self.servers
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection accepted yet")
    }

    pub fn accepted_count(&self) -> usize {
        self.servers.lock().unwrap().len()
    }

    /// Transports whose write half is still alive
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _endpoint: &str) -> Result<Transport> {
        self.attempts.lock().unwrap().push(Instant::now());
        if let Some(delay) = self.handshake_delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockBehavior::Accept);
        if let MockBehavior::Refuse = behavior {
            return Err(LiveError::Connection("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let server = MockServer {
            inbound: tx,
            sent: Arc::new(Mutex::new(Vec::new())),
            closed_with: Arc::new(Mutex::new(None)),
        };

        let now_live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now_live, Ordering::SeqCst);

        let sink = MockSink {
            sent: Arc::clone(&server.sent),
            closed_with: Arc::clone(&server.closed_with),
            live: Arc::clone(&self.live),
        };
        self.servers.lock().unwrap().push(server);

        Ok(Transport {
            sink: Box::new(sink),
            stream: Box::new(MockStream { inbound: rx }),
        })
    }
}

struct MockSink {
    sent: Arc<Mutex<Vec<String>>>,
    closed_with: Arc<Mutex<Option<(u16, String)>>>,
    live: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.closed_with.lock().unwrap().is_some() {
            return Err(LiveError::NotConnected);
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: String) -> Result<()> {
        *self.closed_with.lock().unwrap() = Some((code, reason));
        Ok(())
    }
}

impl Drop for MockSink {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MockStream {
    inbound: mpsc::UnboundedReceiver<InboundItem>,
}

#[async_trait]
impl FrameStream for MockStream {
    async fn next_frame(&mut self) -> Option<Result<InboundFrame>> {
        self.inbound.recv().await.flatten()
    }
}
