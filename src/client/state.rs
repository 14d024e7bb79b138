use super::connection::{ConnectionManager, ConnectionState};
use crate::infrastructure::{ReconnectPolicy, TaskKind, TaskManager};
use crate::types::constants::{MANUAL_DISCONNECT_REASON, WS_CLOSE_NORMAL};
use tokio::sync::watch;

/// Consolidated mutable state for LiveConnection.
///
/// Guarded by a single `std::sync::Mutex`; never held across an await point
/// or while listeners run.
pub struct ClientState {
    pub connection_state: ConnectionState,

    /// Bumped whenever a transport cycle starts or ends. Tasks and timers
    /// carry the epoch they were created under and go inert once it moves.
    pub epoch: u64,

    pub policy: ReconnectPolicy,

    /// Reconnect attempts exhausted
    pub terminal: bool,

    /// Whether the last close was requested through `disconnect()`
    pub was_manual_disconnect: bool,

    /// Writer of the current transport, present only while connected
    pub writer: Option<ConnectionManager>,

    /// Background task manager
    pub task_manager: TaskManager,

    pub heartbeats_sent: u64,
    pub last_heartbeat_sent: Option<i64>,
    pub last_heartbeat_ack: Option<i64>,

    /// Sender for state change notifications
    pub state_change_tx: watch::Sender<ConnectionState>,
}

impl ClientState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        let (state_change_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connection_state: ConnectionState::Disconnected,
            epoch: 0,
            policy,
            terminal: false,
            was_manual_disconnect: false,
            writer: None,
            task_manager: TaskManager::new(),
            heartbeats_sent: 0,
            last_heartbeat_sent: None,
            last_heartbeat_ack: None,
            state_change_tx,
        }
    }

    /// Start a new epoch and return it
    pub fn advance_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Record a transition. Returns whether the state actually changed.
    pub fn set_state(&mut self, new_state: ConnectionState) -> bool {
        if self.connection_state == new_state {
            return false;
        }
        tracing::debug!(
            "Connection state {} -> {}",
            self.connection_state.as_str(),
            new_state.as_str()
        );
        self.connection_state = new_state;
        self.state_change_tx.send_replace(new_state);
        true
    }
}

impl Drop for ClientState {
    /// Runs when the last `LiveConnection` handle goes away
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            tracing::info!("Connection dropped, closing transport");
            if writer
                .request_close(WS_CLOSE_NORMAL, MANUAL_DISCONNECT_REASON)
                .is_ok()
            {
                // The writer exits on its own once the close frame is out
                self.task_manager.detach(TaskKind::Writer);
            }
        }
        self.task_manager.abort_all();
    }
}
