use crate::client::{ClientState, ConnectionState};
use crate::types::constants::HEARTBEAT_INTERVAL;
use crate::types::{EventEnvelope, now_millis};
use std::sync::{Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(HEARTBEAT_INTERVAL);

/// Periodic liveness probe for one transport cycle.
///
/// Sends `{"type":"heartbeat","timestamp":...}` every interval while the
/// connection is `Connected` in the epoch it was armed for. Replies are
/// informational; a missing reply never closes the connection.
pub struct HeartbeatManager {
    interval: Duration,
    epoch: u64,
    state: Weak<Mutex<ClientState>>,
}

impl HeartbeatManager {
    pub fn new(state: Weak<Mutex<ClientState>>, epoch: u64) -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            epoch,
            state,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The heartbeat loop. First probe goes out one interval after arming.
    pub async fn run(self) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !self.beat() {
                break;
            }
        }
    }

    /// Send one probe. Returns false once this heartbeat has no cycle to serve.
    fn beat(&self) -> bool {
        // Connection dropped, exit heartbeat task
        let Some(shared) = self.state.upgrade() else {
            return false;
        };
        let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);

        if state.epoch != self.epoch || state.connection_state != ConnectionState::Connected {
            tracing::debug!("Heartbeat armed for a finished cycle, stopping");
            return false;
        }

        let Some(writer) = state.writer.clone() else {
            return false;
        };

        let text = match serde_json::to_string(&EventEnvelope::heartbeat()) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("[Heartbeat] Failed to encode: {}", e);
                return true;
            }
        };

        match writer.send_text(text) {
            Ok(()) => {
                state.heartbeats_sent += 1;
                state.last_heartbeat_sent = Some(now_millis());
                tracing::debug!("Sent heartbeat #{}", state.heartbeats_sent);
                true
            }
            Err(e) => {
                tracing::error!("[Heartbeat] Failed to send: {}", e);
                false
            }
        }
    }
}
