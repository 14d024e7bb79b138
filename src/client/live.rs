use super::{
    ClientState, ConnectionManager, ConnectionState, LiveConnectionBuilder, LiveConnectionOptions,
};
use crate::infrastructure::{HeartbeatManager, TaskKind};
use crate::messaging::{
    CloseInfo, EventKind, ListenerId, ListenerRegistry, LiveEvent, MessageRouter, RouteOutcome,
};
use crate::types::constants::{MANUAL_DISCONNECT_REASON, WS_CLOSE_ABNORMAL, WS_CLOSE_NORMAL};
use crate::types::{EventEnvelope, LiveError, Result, now_millis};
use crate::websocket::{CloseFrame, Connector, FrameSink, FrameStream, InboundFrame, Transport};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{oneshot, watch};

/// Events collected under the state lock and dispatched after it is released
type Pending = Vec<(EventKind, LiveEvent)>;

/// Why a transport cycle ended
enum CloseCause {
    /// Close frame from the server, or end of stream when `None`
    Remote(Option<CloseFrame>),
    ReadFailed(String),
    WriteFailed(String),
    ConnectFailed(String),
}

impl CloseCause {
    fn code(&self) -> u16 {
        match self {
            Self::Remote(Some(frame)) => frame.code,
            _ => WS_CLOSE_ABNORMAL,
        }
    }

    fn reason(&self) -> String {
        match self {
            Self::Remote(Some(frame)) => frame.reason.clone(),
            Self::Remote(None) => String::new(),
            Self::ReadFailed(e) | Self::WriteFailed(e) | Self::ConnectFailed(e) => e.clone(),
        }
    }

    /// Text of the `error` event that precedes the close, if any
    fn error_message(&self) -> Option<String> {
        match self {
            Self::Remote(_) => None,
            Self::ReadFailed(e) | Self::WriteFailed(e) | Self::ConnectFailed(e) => Some(e.clone()),
        }
    }
}

/// Point-in-time view of a connection, for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub endpoint: String,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    /// Reconnect attempts are exhausted; only `connect()` revives the connection
    pub terminal: bool,
    pub manual_disconnect: bool,
    pub heartbeats_sent: u64,
    pub last_heartbeat_sent: Option<i64>,
    pub last_heartbeat_ack: Option<i64>,
}

/// Auto-reconnecting live event channel to the fraud monitoring backend.
///
/// `LiveConnection` owns at most one WebSocket transport at a time. While
/// connected it sends a heartbeat every interval, answers server heartbeat
/// probes, and dispatches each inbound JSON message to the listeners
/// registered for `message` and for the message's `type`. An abnormal close
/// schedules a reconnect with exponential backoff; after the configured
/// number of failed attempts the connection stops trying and reports a
/// terminal close.
///
/// The handle is cheap to clone. All clones drive the same connection, and
/// dropping the last one closes the transport with code 1000 and cancels
/// every timer.
///
/// # Example
///
/// ```no_run
/// use fraudwatch_live::{LiveConnection, LiveConnectionOptions, LiveEvent};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connection = LiveConnection::for_page(
///     "https://fraud.example.com",
///     LiveConnectionOptions::default(),
/// )?;
///
/// connection.on("alert", |event| {
///     if let LiveEvent::Alert(alert) = event {
///         println!("alert for {}", alert.transaction_id);
///     }
/// });
///
/// connection.connect().await;
/// // ...
/// connection.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LiveConnection {
    pub(crate) endpoint: Arc<str>,
    pub(crate) options: Arc<LiveConnectionOptions>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) registry: Arc<ListenerRegistry>,
    pub(crate) state: Arc<Mutex<ClientState>>,
}

impl LiveConnection {
    /// Creates a connection for an explicit endpoint URL. Nothing is opened
    /// until [`connect()`](Self::connect) is called.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::Config`] if the options are inconsistent.
    pub fn new(endpoint: impl Into<String>, options: LiveConnectionOptions) -> Result<Self> {
        Ok(LiveConnectionBuilder::new(endpoint, options)?.build())
    }

    /// Creates a connection to the monitor socket served by the page at
    /// `page_origin`: `https` pages use `wss`, `http` pages use `ws`, and the
    /// path is always `/ws/monitor`.
    ///
    /// # Errors
    ///
    /// Returns [`LiveError::InvalidEndpoint`] if the origin has no host or an
    /// unsupported scheme.
    pub fn for_page(page_origin: &str, options: LiveConnectionOptions) -> Result<Self> {
        Ok(LiveConnectionBuilder::for_page(page_origin, options)?.build())
    }

    pub fn builder(
        endpoint: impl Into<String>,
        options: LiveConnectionOptions,
    ) -> Result<LiveConnectionBuilder> {
        LiveConnectionBuilder::new(endpoint, options)
    }

    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_all(&self, events: Pending) {
        for (kind, event) in events {
            self.registry.emit(&kind, &event);
        }
    }

    fn downgrade(&self) -> WeakConnection {
        WeakConnection {
            endpoint: Arc::clone(&self.endpoint),
            options: Arc::clone(&self.options),
            connector: Arc::clone(&self.connector),
            registry: Arc::clone(&self.registry),
            state: Arc::downgrade(&self.state),
        }
    }

    /// Opens the transport if the connection is `Disconnected`.
    ///
    /// Calling `connect()` is an explicit request to be online: it cancels a
    /// pending reconnect timer, resets the attempt counter, and clears the
    /// terminal and manual-disconnect flags before opening. While a
    /// connection is already `Connecting` or `Connected` it does nothing.
    ///
    /// Failures are not returned. They surface as `error` and `close`
    /// events, and schedule a reconnect like any other abnormal close.
    /// Returns the state once the attempt has settled. The handshake runs on
    /// its own task, so dropping the returned future does not cancel it.
    pub async fn connect(&self) -> ConnectionState {
        let mut events = Pending::new();
        let epoch = {
            let mut state = self.lock_state();
            if state.connection_state != ConnectionState::Disconnected {
                tracing::debug!(
                    "connect() ignored, connection is {}",
                    state.connection_state.as_str()
                );
                return state.connection_state;
            }
            state.task_manager.abort(TaskKind::Reconnect);
            state.policy.reset();
            state.terminal = false;
            state.was_manual_disconnect = false;
            begin_attempt(&mut state, &mut events)
        };
        self.emit_all(events);

        let (done_tx, done_rx) = oneshot::channel();
        {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                // A listener already moved the connection on
                return state.connection_state;
            }
            let handle = self.downgrade();
            state.task_manager.spawn(TaskKind::Connect, async move {
                handle.establish(epoch).await;
                let _ = done_tx.send(());
            });
        }

        // Err means disconnect() aborted the handshake
        let _ = done_rx.await;
        self.state()
    }

    /// Wire up a freshly opened transport: writer, reader and heartbeat
    fn install(&self, epoch: u64, transport: Transport) {
        let Transport { sink, stream } = transport;
        let mut events = Pending::new();
        {
            let mut state = self.lock_state();
            if state.epoch != epoch || state.connection_state != ConnectionState::Connecting {
                drop(state);
                tracing::info!("Attempt was cancelled during the handshake, closing transport");
                close_unused(sink);
                return;
            }

            let on_failure = {
                let handle = self.downgrade();
                move |e: LiveError| {
                    if let Some(connection) = handle.upgrade() {
                        connection.handle_closed(
                            epoch,
                            CloseCause::WriteFailed(e.to_string()),
                            Some(TaskKind::Writer),
                        );
                    }
                }
            };
            let (writer, writer_task) = ConnectionManager::new(sink, on_failure);
            state.writer = Some(writer);
            state.task_manager.spawn(TaskKind::Writer, writer_task);
            state
                .task_manager
                .spawn(TaskKind::Reader, self.downgrade().read_loop(epoch, stream));

            let heartbeat = HeartbeatManager::new(Arc::downgrade(&self.state), epoch)
                .with_interval(self.options.heartbeat_interval());
            state.task_manager.spawn(TaskKind::Heartbeat, heartbeat.run());

            state.policy.reset();
            if state.set_state(ConnectionState::Connected) {
                events.push((
                    EventKind::State,
                    LiveEvent::State(ConnectionState::Connected),
                ));
            }
        }

        tracing::info!("Connected to {}", self.endpoint);
        events.push((EventKind::Open, LiveEvent::Open));
        self.emit_all(events);
    }

    fn record_heartbeat_ack(&self) {
        let mut state = self.lock_state();
        state.last_heartbeat_ack = Some(now_millis());
        tracing::debug!("Heartbeat acknowledged");
    }

    /// Tear down the cycle started under `epoch` and decide whether to
    /// reconnect. `origin` is the task reporting the close, which must not
    /// abort itself.
    fn handle_closed(&self, epoch: u64, cause: CloseCause, origin: Option<TaskKind>) {
        let mut events = Pending::new();
        {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                tracing::debug!("Ignoring close reported for a finished cycle");
                return;
            }
            state.advance_epoch();
            state.writer = None;
            state.task_manager.abort(TaskKind::Heartbeat);
            for kind in [TaskKind::Reader, TaskKind::Writer] {
                if origin == Some(kind) {
                    state.task_manager.detach(kind);
                } else {
                    state.task_manager.abort(kind);
                }
            }

            if state.set_state(ConnectionState::Disconnected) {
                events.push((
                    EventKind::State,
                    LiveEvent::State(ConnectionState::Disconnected),
                ));
            }
            if let Some(message) = cause.error_message() {
                events.push((EventKind::Error, LiveEvent::Error(message)));
            }

            let code = cause.code();
            let clean = code == WS_CLOSE_NORMAL;
            let will_reconnect = !clean && self.schedule_reconnect(&mut state);
            tracing::info!(
                "Connection closed: code={}, will_reconnect={}",
                code,
                will_reconnect
            );
            events.push((
                EventKind::Close,
                LiveEvent::Close(CloseInfo {
                    code,
                    reason: cause.reason(),
                    clean,
                    terminal: state.terminal,
                    will_reconnect,
                }),
            ));
        }
        self.emit_all(events);
    }

    /// Arm the reconnect timer, or mark the connection terminal once the
    /// attempts are used up. Returns whether a reconnect was scheduled.
    fn schedule_reconnect(&self, state: &mut ClientState) -> bool {
        if state.was_manual_disconnect {
            tracing::info!("Manual disconnect detected, will not attempt to reconnect");
            return false;
        }
        if state.terminal {
            return false;
        }

        let Some(delay) = state.policy.next_delay() else {
            tracing::error!(
                "Max reconnection attempts ({}) reached, giving up",
                state.policy.max_attempts()
            );
            state.terminal = true;
            return false;
        };

        tracing::info!(
            "Reconnecting in {:?} (attempt {}/{})",
            delay,
            state.policy.attempts(),
            state.policy.max_attempts()
        );

        // The slot holds at most the task that is reporting this failure
        state.task_manager.detach(TaskKind::Reconnect);
        let handle = self.downgrade();
        let epoch = state.epoch;
        state.task_manager.spawn(TaskKind::Reconnect, async move {
            tokio::time::sleep(delay).await;
            handle.reconnect_attempt(epoch).await;
        });
        true
    }

    /// Closes the transport with code 1000 and cancels every timer.
    ///
    /// No reconnect is scheduled after a manual disconnect. Listeners see a
    /// clean `close` event once the close frame has been handed to the
    /// transport (bounded by a short flush timeout). Safe to call in any
    /// state.
    pub async fn disconnect(&self) {
        let mut events = Pending::new();
        let (writer, writer_task) = {
            let mut state = self.lock_state();
            state.task_manager.abort(TaskKind::Connect);
            state.task_manager.abort(TaskKind::Reconnect);
            state.task_manager.abort(TaskKind::Heartbeat);
            state.task_manager.abort(TaskKind::Reader);
            state.was_manual_disconnect = true;
            state.advance_epoch();

            let previous = state.connection_state;
            let writer = state.writer.take();
            let writer_task = state.task_manager.take(TaskKind::Writer);

            if state.set_state(ConnectionState::Disconnected) {
                events.push((
                    EventKind::State,
                    LiveEvent::State(ConnectionState::Disconnected),
                ));
            }
            if previous != ConnectionState::Disconnected {
                events.push((
                    EventKind::Close,
                    LiveEvent::Close(CloseInfo {
                        code: WS_CLOSE_NORMAL,
                        reason: MANUAL_DISCONNECT_REASON.to_string(),
                        clean: true,
                        terminal: state.terminal,
                        will_reconnect: false,
                    }),
                ));
            }
            (writer, writer_task)
        };

        if let Some(writer) = writer {
            tracing::info!("Disconnecting from {}", self.endpoint);
            if let Err(e) = writer
                .close(
                    WS_CLOSE_NORMAL,
                    MANUAL_DISCONNECT_REASON,
                    self.options.close_flush_timeout(),
                )
                .await
            {
                tracing::warn!("Close frame was not flushed: {}", e);
            }
        }
        if let Some(task) = writer_task {
            task.abort();
        }

        self.emit_all(events);
        tracing::info!("Disconnected");
    }

    /// Disconnects, waits the manual reconnect delay (1 s by default), then
    /// connects again with a fresh attempt counter.
    pub async fn reconnect(&self) -> ConnectionState {
        self.disconnect().await;
        tokio::time::sleep(self.options.manual_reconnect_delay()).await;
        self.connect().await
    }

    /// Serializes `envelope` and queues it on the open transport.
    ///
    /// Returns `false` without sending when the connection is not
    /// `Connected`; the message is dropped, not buffered.
    pub fn send(&self, envelope: EventEnvelope) -> bool {
        let writer = {
            let state = self.lock_state();
            match (&state.writer, state.connection_state) {
                (Some(writer), ConnectionState::Connected) => writer.clone(),
                _ => {
                    tracing::warn!(
                        "Dropping '{}' message, connection is {}",
                        envelope.kind,
                        state.connection_state.as_str()
                    );
                    return false;
                }
            }
        };

        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode '{}' message: {}", envelope.kind, e);
                return false;
            }
        };

        match writer.send_text(text) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to queue '{}' message: {}", envelope.kind, e);
                false
            }
        }
    }

    /// Sends `{"type": kind, "data": data}`
    pub fn send_event(&self, kind: &str, data: serde_json::Value) -> bool {
        self.send(EventEnvelope::new(kind).with_data(data))
    }

    /// Registers `callback` for events of `kind`.
    ///
    /// Lifecycle kinds (`open`, `close`, `error`, `message`, `state`) are
    /// raised by the connection itself; any other kind matches the `type`
    /// field of inbound messages. Callbacks run on the connection's tasks
    /// and should return quickly. A panicking callback is logged and does
    /// not affect other listeners.
    pub fn on<F>(&self, kind: impl Into<EventKind>, callback: F) -> ListenerId
    where
        F: Fn(&LiveEvent) + Send + Sync + 'static,
    {
        self.registry.on(kind.into(), callback)
    }

    /// Removes a listener registered with [`on()`](Self::on). Returns false
    /// if it was not registered for `kind`.
    pub fn off(&self, kind: impl Into<EventKind>, id: ListenerId) -> bool {
        self.registry.off(&kind.into(), id)
    }

    pub fn state(&self) -> ConnectionState {
        self.lock_state().connection_state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let state = self.lock_state();
        ConnectionSnapshot {
            state: state.connection_state,
            endpoint: self.endpoint.to_string(),
            reconnect_attempts: state.policy.attempts(),
            max_reconnect_attempts: state.policy.max_attempts(),
            terminal: state.terminal,
            manual_disconnect: state.was_manual_disconnect,
            heartbeats_sent: state.heartbeats_sent,
            last_heartbeat_sent: state.last_heartbeat_sent,
            last_heartbeat_ack: state.last_heartbeat_ack,
        }
    }

    /// Subscribe to state transitions
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.lock_state().state_change_tx.subscribe()
    }
}

/// What the background tasks hold on to. Only the shared state is weak, so
/// the tasks never keep a dropped connection alive.
struct WeakConnection {
    endpoint: Arc<str>,
    options: Arc<LiveConnectionOptions>,
    connector: Arc<dyn Connector>,
    registry: Arc<ListenerRegistry>,
    state: Weak<Mutex<ClientState>>,
}

impl WeakConnection {
    fn upgrade(&self) -> Option<LiveConnection> {
        Some(LiveConnection {
            endpoint: Arc::clone(&self.endpoint),
            options: Arc::clone(&self.options),
            connector: Arc::clone(&self.connector),
            registry: Arc::clone(&self.registry),
            state: self.state.upgrade()?,
        })
    }

    /// Runs the handshake for the attempt started under `epoch`
    async fn establish(&self, epoch: u64) {
        tracing::info!("Connecting to {}", self.endpoint);

        let handshake = self.connector.connect(&self.endpoint);
        let result = match tokio::time::timeout(self.options.timeout(), handshake).await {
            Ok(result) => result,
            Err(_) => Err(LiveError::Timeout),
        };

        let Some(connection) = self.upgrade() else {
            tracing::debug!("Connection dropped during the handshake");
            if let Ok(transport) = result {
                close_unused(transport.sink);
            }
            return;
        };

        match result {
            Ok(transport) => connection.install(epoch, transport),
            Err(e) => {
                tracing::error!("Failed to connect to {}: {}", self.endpoint, e);
                connection.handle_closed(epoch, CloseCause::ConnectFailed(e.to_string()), None);
            }
        }
    }

    /// Body of the reconnect timer armed under `epoch`
    async fn reconnect_attempt(&self, epoch: u64) {
        let Some(connection) = self.upgrade() else {
            return;
        };
        let mut events = Pending::new();
        let attempt_epoch = {
            let mut state = connection.lock_state();
            if state.epoch != epoch
                || state.terminal
                || state.connection_state != ConnectionState::Disconnected
            {
                tracing::debug!("Reconnect timer superseded, skipping");
                return;
            }
            tracing::info!("Attempting to reconnect...");
            begin_attempt(&mut state, &mut events)
        };
        connection.emit_all(events);
        drop(connection);

        self.establish(attempt_epoch).await;
    }

    async fn read_loop(self, epoch: u64, mut stream: Box<dyn FrameStream>) {
        tracing::info!("Starting read task");
        let router = MessageRouter::new(Arc::clone(&self.registry));

        let cause = loop {
            let frame = stream.next_frame().await;
            let Some(connection) = self.upgrade() else {
                tracing::debug!("Connection dropped, stopping read task");
                return;
            };

            match frame {
                Some(Ok(InboundFrame::Text(text))) => {
                    tracing::debug!("Received text message: {}", text);
                    match router.route(&text) {
                        RouteOutcome::HeartbeatProbe => {
                            connection.send(EventEnvelope::heartbeat_response());
                        }
                        RouteOutcome::HeartbeatAck => connection.record_heartbeat_ack(),
                        RouteOutcome::Dispatched | RouteOutcome::Malformed => {}
                    }
                }
                Some(Ok(InboundFrame::Close(frame))) => {
                    match &frame {
                        Some(frame) => tracing::warn!(
                            "Server closed connection: code={}, reason='{}'",
                            frame.code,
                            frame.reason
                        ),
                        None => tracing::warn!("Server closed connection without close frame"),
                    }
                    break CloseCause::Remote(frame);
                }
                Some(Ok(InboundFrame::Other(kind))) => {
                    tracing::debug!("Ignoring {} frame", kind);
                }
                Some(Err(e)) => {
                    tracing::error!("WebSocket read error: {}", e);
                    break CloseCause::ReadFailed(e.to_string());
                }
                None => {
                    tracing::warn!("WebSocket stream ended");
                    break CloseCause::Remote(None);
                }
            }
        };

        if let Some(connection) = self.upgrade() {
            connection.handle_closed(epoch, cause, Some(TaskKind::Reader));
        }
        tracing::info!("Read task finished");
    }
}

/// Close a transport nobody is going to use
fn close_unused(mut sink: Box<dyn FrameSink>) {
    tokio::spawn(async move {
        let _ = sink
            .close(WS_CLOSE_NORMAL, MANUAL_DISCONNECT_REASON.to_string())
            .await;
    });
}

/// Enter `Connecting` under a new epoch
fn begin_attempt(state: &mut ClientState, events: &mut Pending) -> u64 {
    if state.set_state(ConnectionState::Connecting) {
        events.push((
            EventKind::State,
            LiveEvent::State(ConnectionState::Connecting),
        ));
    }
    state.advance_epoch()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::mock::{MockBehavior, MockConnector};
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn connection_with(
        connector: Arc<MockConnector>,
        options: LiveConnectionOptions,
    ) -> LiveConnection {
        LiveConnectionBuilder::new("ws://localhost/ws/monitor", options)
            .unwrap()
            .with_connector(connector)
            .build()
    }

    fn connection(connector: Arc<MockConnector>) -> LiveConnection {
        connection_with(connector, LiveConnectionOptions::default())
    }

    /// Record every event of `kind`
    fn record(connection: &LiveConnection, kind: &str) -> Arc<StdMutex<Vec<LiveEvent>>> {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        connection.on(kind, move |event| sink.lock().unwrap().push(event.clone()));
        seen
    }

    fn closes(seen: &Arc<StdMutex<Vec<LiveEvent>>>) -> Vec<CloseInfo> {
        seen.lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                LiveEvent::Close(info) => Some(info.clone()),
                _ => None,
            })
            .collect()
    }

    /// Let spawned tasks run without moving the paused clock
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_opens_once() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));
        let opens = record(&connection, "open");

        assert_eq!(connection.connect().await, ConnectionState::Connected);
        assert_eq!(connection.connect().await, ConnectionState::Connected);

        assert_eq!(connector.attempt_count(), 1);
        assert_eq!(opens.lock().unwrap().len(), 1);
        assert!(connection.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_events_follow_lifecycle() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));
        let states = record(&connection, "state");
        let mut watcher = connection.state_changes();

        connection.connect().await;
        connection.disconnect().await;

        let seen: Vec<_> = states
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                LiveEvent::State(state) => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(
            seen,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected
            ]
        );
        assert!(watcher.has_changed().unwrap());
        assert_eq!(*watcher.borrow_and_update(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_reach_listeners() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));
        let alerts = record(&connection, "alert");
        let messages = record(&connection, "message");

        connection.connect().await;
        connector.last_server().push_text(
            r#"{"type":"alert","data":{"transaction_id":"tx-1","severity":"HIGH"}}"#,
        );
        settle().await;

        assert_eq!(alerts.lock().unwrap().len(), 1);
        assert_eq!(messages.lock().unwrap().len(), 1);
        match &alerts.lock().unwrap()[0] {
            LiveEvent::Alert(alert) => assert_eq!(alert.transaction_id, "tx-1"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_double_up_to_cap() {
        let connector = MockConnector::refuse_all(6);
        let connection = connection(Arc::clone(&connector));

        connection.connect().await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        let times = connector.attempt_times();
        assert_eq!(times.len(), 7);
        let gaps: Vec<u64> = times
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis() as u64)
            .collect();
        assert_eq!(gaps, vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000]);
        assert!(connection.is_connected());
        assert_eq!(connection.snapshot().reconnect_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_resets_backoff() {
        let connector = MockConnector::scripted(vec![
            MockBehavior::Refuse,
            MockBehavior::Refuse,
            MockBehavior::Accept,
        ]);
        let connection = connection(Arc::clone(&connector));

        connection.connect().await;
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        settle().await;
        assert!(connection.is_connected());
        assert_eq!(connection.snapshot().reconnect_attempts, 0);

        // The next drop starts over at the base delay
        connector.last_server().drop_connection();
        settle().await;
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        tokio::time::sleep(Duration::from_millis(999)).await;
        settle().await;
        assert_eq!(connector.attempt_count(), 3);
        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(connector.attempt_count(), 4);
        assert!(connection.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let connector = MockConnector::refuse_all(100);
        let connection = connection_with(
            Arc::clone(&connector),
            LiveConnectionOptions {
                max_reconnect_attempts: Some(3),
                ..Default::default()
            },
        );
        let events = record(&connection, "close");

        connection.connect().await;
        tokio::time::sleep(Duration::from_secs(600)).await;

        // Initial attempt plus three reconnects
        assert_eq!(connector.attempt_count(), 4);
        let closes = closes(&events);
        assert_eq!(closes.len(), 4);
        assert!(closes[..3].iter().all(|c| c.will_reconnect && !c.terminal));
        assert!(closes[3].terminal);
        assert!(!closes[3].will_reconnect);
        assert_eq!(closes[3].code, WS_CLOSE_ABNORMAL);

        let snapshot = connection.snapshot();
        assert!(snapshot.terminal);
        assert_eq!(snapshot.state, ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_revives_terminal_connection() {
        let connector = MockConnector::refuse_all(2);
        let connection = connection_with(
            Arc::clone(&connector),
            LiveConnectionOptions {
                max_reconnect_attempts: Some(1),
                ..Default::default()
            },
        );

        connection.connect().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert!(connection.snapshot().terminal);

        assert_eq!(connection.connect().await, ConnectionState::Connected);
        let snapshot = connection.snapshot();
        assert!(!snapshot.terminal);
        assert_eq!(snapshot.reconnect_attempts, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_cancels_pending_reconnect() {
        let connector = MockConnector::refuse_all(1);
        let connection = connection(Arc::clone(&connector));

        connection.connect().await;
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        connection.connect().await;
        assert!(connection.is_connected());

        // The timer armed by the first failure never fires
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempt_count(), 2);
        assert_eq!(connector.max_live(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_disconnect_is_clean() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));
        let events = record(&connection, "close");

        connection.connect().await;
        connection.disconnect().await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        let server = connector.last_server();
        assert_eq!(
            server.closed_with(),
            Some((WS_CLOSE_NORMAL, MANUAL_DISCONNECT_REASON.to_string()))
        );
        assert_eq!(connector.live(), 0);
        assert_eq!(connector.attempt_count(), 1);

        let closes = closes(&events);
        assert_eq!(closes.len(), 1);
        assert!(closes[0].clean);
        assert!(!closes[0].will_reconnect);
        assert!(connection.snapshot().manual_disconnect);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_while_disconnected_is_silent() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));
        let events = record(&connection, "close");

        connection.disconnect().await;

        assert!(closes(&events).is_empty());
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_then_connect_keeps_single_transport() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));

        for _ in 0..5 {
            connection.connect().await;
            connection.disconnect().await;
        }
        connection.connect().await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(connector.max_live(), 1);
        assert_eq!(connector.live(), 1);
        assert_eq!(connector.attempt_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));

        connection.connect().await;
        connector.last_server().fail_read();
        settle().await;
        connection.disconnect().await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(connector.attempt_count(), 1);
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_normal_close_does_not_reconnect() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));
        let events = record(&connection, "close");

        connection.connect().await;
        connector.last_server().close_with(WS_CLOSE_NORMAL);
        settle().await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(connector.attempt_count(), 1);
        let closes = closes(&events);
        assert_eq!(closes.len(), 1);
        assert!(closes[0].clean);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abnormal_close_reports_error_then_reconnects() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));
        let errors = record(&connection, "error");
        let events = record(&connection, "close");

        connection.connect().await;
        connector.last_server().fail_read();
        settle().await;

        assert_eq!(errors.lock().unwrap().len(), 1);
        let closes = closes(&events);
        assert_eq!(closes.len(), 1);
        assert_eq!(closes[0].code, WS_CLOSE_ABNORMAL);
        assert!(closes[0].will_reconnect);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        settle().await;
        assert!(connection.is_connected());
        assert_eq!(connector.accepted_count(), 2);
        assert_eq!(connector.max_live(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_every_interval_and_stops_after_close() {
        let connector = MockConnector::new();
        let connection = connection_with(
            Arc::clone(&connector),
            LiveConnectionOptions {
                heartbeat_interval: Some(1_000),
                ..Default::default()
            },
        );

        connection.connect().await;
        let server = connector.last_server();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        settle().await;
        assert_eq!(server.sent_types(), vec!["heartbeat"; 3]);
        assert_eq!(connection.snapshot().heartbeats_sent, 3);

        connection.disconnect().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(server.sent_types().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_not_duplicated_across_reconnects() {
        let connector = MockConnector::new();
        let connection = connection_with(
            Arc::clone(&connector),
            LiveConnectionOptions {
                heartbeat_interval: Some(5_000),
                ..Default::default()
            },
        );

        connection.connect().await;
        connector.last_server().drop_connection();
        settle().await;
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        settle().await;
        assert!(connection.is_connected());

        let server = connector.last_server();
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        settle().await;
        assert_eq!(server.sent_types(), vec!["heartbeat"]);
        assert_eq!(connector.server(0).sent_types(), Vec::<String>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn test_answers_server_heartbeat() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));

        connection.connect().await;
        let server = connector.last_server();
        server.push_text(r#"{"type":"heartbeat"}"#);
        server.push_text(r#"{"type":"heartbeat_response","timestamp":1700000000000}"#);
        settle().await;

        assert_eq!(server.sent_types(), vec!["heartbeat_response"]);
        assert!(connection.snapshot().last_heartbeat_ack.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_open_connection() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));

        assert!(!connection.send_event("ack", json!({"id": 1})));

        connection.connect().await;
        assert!(connection.send_event("ack", json!({"id": 2})));
        settle().await;

        let sent = connector.last_server().sent();
        assert_eq!(sent.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(value, json!({"type": "ack", "data": {"id": 2}}));

        connection.disconnect().await;
        assert!(!connection.send_event("ack", json!({"id": 3})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_stops_delivery() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));
        let count = Arc::new(StdMutex::new(0));
        let count_inner = Arc::clone(&count);
        let id = connection.on("status", move |_| *count_inner.lock().unwrap() += 1);

        connection.connect().await;
        let server = connector.last_server();
        server.push_text(r#"{"type":"status","data":{"api":"healthy"}}"#);
        settle().await;
        assert!(connection.off("status", id));
        assert!(!connection.off("status", id));
        server.push_text(r#"{"type":"status","data":{"api":"healthy"}}"#);
        settle().await;

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_reconnect_waits_then_connects() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));

        connection.connect().await;
        let started = tokio::time::Instant::now();
        assert_eq!(connection.reconnect().await, ConnectionState::Connected);

        assert!(started.elapsed() >= Duration::from_millis(1_000));
        assert_eq!(connector.attempt_count(), 2);
        assert_eq!(connector.max_live(), 1);
        assert!(!connection.snapshot().manual_disconnect);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_connect_still_completes() {
        let connector = MockConnector::delayed(Duration::from_millis(500));
        let connection = connection(Arc::clone(&connector));

        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), connection.connect()).await;
        assert!(abandoned.is_err());
        assert_eq!(connection.state(), ConnectionState::Connecting);

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert!(connection.is_connected());
        assert_eq!(connector.attempt_count(), 1);
        assert_eq!(connection.connect().await, ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_aborts_pending_handshake() {
        let connector = MockConnector::delayed(Duration::from_millis(500));
        let connection = connection(Arc::clone(&connector));

        let first = tokio::spawn({
            let connection = connection.clone();
            async move { connection.connect().await }
        });
        settle().await;
        assert_eq!(connector.attempt_count(), 1);

        connection.disconnect().await;
        assert_eq!(connection.connect().await, ConnectionState::Connected);
        first.await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(connector.attempt_count(), 2);
        assert_eq!(connector.accepted_count(), 1);
        assert_eq!(connector.max_live(), 1);
        assert!(connection.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_last_handle_closes_transport() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));

        connection.connect().await;
        let server = connector.last_server();
        assert_eq!(connector.live(), 1);

        drop(connection);
        settle().await;

        assert_eq!(connector.live(), 0);
        assert_eq!(
            server.closed_with(),
            Some((WS_CLOSE_NORMAL, MANUAL_DISCONNECT_REASON.to_string()))
        );
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(server.sent_types(), Vec::<String>::new());
        assert_eq!(connector.attempt_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_last_handle_cancels_reconnect() {
        let connector = MockConnector::new();
        let connection = connection(Arc::clone(&connector));

        connection.connect().await;
        connector.last_server().fail_read();
        settle().await;
        assert_eq!(connection.state(), ConnectionState::Disconnected);

        drop(connection);
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(connector.attempt_count(), 1);
        assert_eq!(connector.live(), 0);
    }
}
