use super::{ClientState, LiveConnection};
use crate::infrastructure::{ReconnectPolicy, monitor_endpoint};
use crate::messaging::ListenerRegistry;
use crate::types::constants::{
    CLOSE_FLUSH_TIMEOUT, DEFAULT_TIMEOUT, HEARTBEAT_INTERVAL, MANUAL_RECONNECT_DELAY,
    MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY, RECONNECT_MAX_DELAY,
};
use crate::types::{LiveError, Result};
use crate::websocket::{Connector, WebSocketFactory};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tuning for a [`LiveConnection`]. Durations are in milliseconds; `None`
/// means the documented default.
#[derive(Debug, Clone, Default)]
pub struct LiveConnectionOptions {
    /// Handshake timeout. Default: 10000.
    pub timeout: Option<u64>,
    /// Interval between outbound heartbeats. Default: 30000.
    pub heartbeat_interval: Option<u64>,
    /// First reconnect delay. Default: 1000.
    pub reconnect_base_delay: Option<u64>,
    /// Upper bound of a reconnect delay. Default: 30000.
    pub reconnect_max_delay: Option<u64>,
    /// Automatic reconnects before the connection gives up. Default: 10.
    pub max_reconnect_attempts: Option<u32>,
    /// Pause inside [`LiveConnection::reconnect`]. Default: 1000.
    pub manual_reconnect_delay: Option<u64>,
}

impl LiveConnectionOptions {
    /// Read overrides from `FRAUDWATCH_*` environment variables. Unset or
    /// unparsable variables leave the default in place.
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str) -> Option<T> {
            let raw = std::env::var(name).ok()?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring unparsable {}={}", name, raw);
                    None
                }
            }
        }

        Self {
            timeout: var("FRAUDWATCH_TIMEOUT_MS"),
            heartbeat_interval: var("FRAUDWATCH_HEARTBEAT_INTERVAL_MS"),
            reconnect_base_delay: var("FRAUDWATCH_RECONNECT_BASE_DELAY_MS"),
            reconnect_max_delay: var("FRAUDWATCH_RECONNECT_MAX_DELAY_MS"),
            max_reconnect_attempts: var("FRAUDWATCH_MAX_RECONNECT_ATTEMPTS"),
            manual_reconnect_delay: var("FRAUDWATCH_MANUAL_RECONNECT_DELAY_MS"),
        }
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
    }

    pub(crate) fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval.unwrap_or(HEARTBEAT_INTERVAL))
    }

    pub(crate) fn manual_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.manual_reconnect_delay.unwrap_or(MANUAL_RECONNECT_DELAY))
    }

    pub(crate) fn close_flush_timeout(&self) -> Duration {
        Duration::from_millis(CLOSE_FLUSH_TIMEOUT)
    }

    pub(crate) fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect_base_delay.unwrap_or(RECONNECT_BASE_DELAY)),
            Duration::from_millis(self.reconnect_max_delay.unwrap_or(RECONNECT_MAX_DELAY)),
            self.max_reconnect_attempts.unwrap_or(MAX_RECONNECT_ATTEMPTS),
        )
    }

    fn validate(&self) -> Result<()> {
        if self.heartbeat_interval == Some(0) {
            return Err(LiveError::Config(
                "heartbeat interval must be greater than zero".to_string(),
            ));
        }
        if self.timeout == Some(0) {
            return Err(LiveError::Config("timeout must be greater than zero".to_string()));
        }
        if self.reconnect_base_delay == Some(0) {
            return Err(LiveError::Config(
                "reconnect base delay must be greater than zero".to_string(),
            ));
        }
        let base = self.reconnect_base_delay.unwrap_or(RECONNECT_BASE_DELAY);
        let cap = self.reconnect_max_delay.unwrap_or(RECONNECT_MAX_DELAY);
        if cap < base {
            return Err(LiveError::Config(format!(
                "reconnect max delay ({}ms) is below the base delay ({}ms)",
                cap, base
            )));
        }
        Ok(())
    }
}

/// Builder for LiveConnection that validates configuration
pub struct LiveConnectionBuilder {
    endpoint: String,
    options: LiveConnectionOptions,
    connector: Arc<dyn Connector>,
}

impl LiveConnectionBuilder {
    /// Create a builder for an explicit endpoint URL. The URL is not parsed
    /// here; a malformed endpoint surfaces as failed connection attempts.
    pub fn new(endpoint: impl Into<String>, options: LiveConnectionOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            endpoint: endpoint.into(),
            options,
            connector: Arc::new(WebSocketFactory),
        })
    }

    /// Create a builder for the monitor socket of the page at `page_origin`
    pub fn for_page(page_origin: &str, options: LiveConnectionOptions) -> Result<Self> {
        Self::new(monitor_endpoint(page_origin)?, options)
    }

    /// Replace the transport connector
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn build(self) -> LiveConnection {
        let state = ClientState::new(self.options.reconnect_policy());
        LiveConnection {
            endpoint: Arc::from(self.endpoint),
            options: Arc::new(self.options),
            connector: self.connector,
            registry: Arc::new(ListenerRegistry::new()),
            state: Arc::new(Mutex::new(state)),
        }
    }
}
