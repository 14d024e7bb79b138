use super::RiskBand;
use crate::client::{ConnectionState, LiveConnection};
use crate::messaging::{
    AlertEvent, CloseInfo, EventKind, ListenerId, LiveEvent, RawMessageEvent, Severity,
    StatusEvent, TransactionEvent,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub const MAX_RECENT_TRANSACTIONS: usize = 20;
pub const MAX_RECENT_ALERTS: usize = 10;

const TRANSACTION_NOTICE_DURATION: Duration = Duration::from_millis(5_000);
const ALERT_NOTICE_DURATION: Duration = Duration::from_millis(7_000);
const CONNECTION_LOST_MESSAGE: &str = "Connection lost. Please refresh the page to reconnect.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Danger,
    Error,
}

/// A toast the dashboard should show
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// How long to show it; `None` stays until dismissed
    pub duration: Option<Duration>,
}

/// Render description of the connection indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionBadge {
    pub state: ConnectionState,
}

impl ConnectionBadge {
    pub fn label(&self) -> &'static str {
        match self.state {
            ConnectionState::Connected => "Connected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Disconnected => "Disconnected",
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Health of one backend component as last reported by a `status` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentHealth {
    pub healthy: bool,
    pub raw: String,
}

impl ComponentHealth {
    pub fn label(&self) -> &'static str {
        if self.healthy { "Online" } else { "Offline" }
    }
}

/// Dashboard model fed by a [`LiveConnection`].
///
/// Holds what the monitoring page renders: the most recent transactions and
/// alerts (newest first), running counters, component health, the
/// connection badge, and notices waiting to be shown.
#[derive(Debug)]
pub struct LiveFeed {
    transactions: VecDeque<TransactionEvent>,
    alerts: VecDeque<AlertEvent>,
    transaction_count: u64,
    alert_count: u64,
    components: BTreeMap<String, ComponentHealth>,
    badge: ConnectionBadge,
    notices: Vec<Notice>,
    connection_lost: bool,
}

/// A feed shared with the listeners that update it
pub type SharedFeed = Arc<Mutex<LiveFeed>>;

impl LiveFeed {
    pub fn new() -> Self {
        Self {
            transactions: VecDeque::with_capacity(MAX_RECENT_TRANSACTIONS),
            alerts: VecDeque::with_capacity(MAX_RECENT_ALERTS),
            transaction_count: 0,
            alert_count: 0,
            components: BTreeMap::new(),
            badge: ConnectionBadge {
                state: ConnectionState::Disconnected,
            },
            notices: Vec::new(),
            connection_lost: false,
        }
    }

    /// Subscribe a new feed to `connection`.
    ///
    /// The returned ids can be passed to [`LiveFeed::detach`] to stop the
    /// updates.
    pub fn attach(connection: &LiveConnection) -> (SharedFeed, Vec<(EventKind, ListenerId)>) {
        let feed: SharedFeed = Arc::new(Mutex::new(Self::new()));
        let kinds = [
            EventKind::Transaction,
            EventKind::Alert,
            EventKind::Status,
            EventKind::State,
            EventKind::Open,
            EventKind::Close,
        ];

        let ids = kinds
            .into_iter()
            .map(|kind| {
                let feed = Arc::clone(&feed);
                let id = connection.on(kind.clone(), move |event| {
                    feed.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .apply(event);
                });
                (kind, id)
            })
            .collect();

        (feed, ids)
    }

    pub fn detach(connection: &LiveConnection, listeners: Vec<(EventKind, ListenerId)>) {
        for (kind, id) in listeners {
            connection.off(kind, id);
        }
    }

    /// Fold one event into the model
    pub fn apply(&mut self, event: &LiveEvent) {
        match event {
            LiveEvent::Transaction(transaction) => self.on_transaction(transaction),
            LiveEvent::Alert(alert) => self.on_alert(alert),
            LiveEvent::Status(status) => self.on_status(status),
            LiveEvent::State(state) => self.badge = ConnectionBadge { state: *state },
            LiveEvent::Close(info) => self.on_close(info),
            LiveEvent::Open => self.connection_lost = false,
            LiveEvent::Raw(raw) => self.on_raw(raw),
            LiveEvent::Error(_) | LiveEvent::Message(_) => {}
        }
    }

    fn on_transaction(&mut self, transaction: &TransactionEvent) {
        tracing::debug!("New transaction: {}", transaction.transaction_id);
        self.transaction_count += 1;
        self.transactions.push_front(transaction.clone());
        self.transactions.truncate(MAX_RECENT_TRANSACTIONS);

        if RiskBand::classify(transaction.fraud_probability) == RiskBand::High {
            let amount = transaction
                .amount
                .map_or_else(|| "unknown amount".to_string(), |a| a.to_string());
            let risk = transaction.fraud_probability.unwrap_or_default() * 100.0;
            self.notices.push(Notice {
                level: NoticeLevel::Warning,
                message: format!(
                    "High-risk transaction detected: {} ({:.1}% risk)",
                    amount, risk
                ),
                duration: Some(TRANSACTION_NOTICE_DURATION),
            });
        }
    }

    fn on_alert(&mut self, alert: &AlertEvent) {
        tracing::debug!("New fraud alert: {}", alert.transaction_id);
        self.alert_count += 1;
        self.alerts.push_front(alert.clone());
        self.alerts.truncate(MAX_RECENT_ALERTS);

        let severity = alert.severity_level();
        let level = if severity >= Severity::High {
            NoticeLevel::Danger
        } else {
            NoticeLevel::Warning
        };
        let label = alert.severity.as_deref().unwrap_or(severity.as_str());
        self.notices.push(Notice {
            level,
            message: format!("{} fraud alert: Transaction {}", label, alert.transaction_id),
            duration: Some(ALERT_NOTICE_DURATION),
        });
    }

    fn on_status(&mut self, status: &StatusEvent) {
        for (component, value) in &status.components {
            let raw = match value.as_str() {
                Some(text) => text.to_string(),
                None => value.to_string(),
            };
            self.components.insert(
                component.clone(),
                ComponentHealth {
                    healthy: status.is_healthy(component),
                    raw,
                },
            );
        }
    }

    /// A transaction or alert whose payload did not fit the typed shape still
    /// counts, but cannot be listed
    fn on_raw(&mut self, raw: &RawMessageEvent) {
        match raw.kind.as_str() {
            "transaction" => self.transaction_count += 1,
            "alert" => self.alert_count += 1,
            _ => return,
        }
        tracing::debug!("Counted untyped '{}' payload", raw.kind);
    }

    fn on_close(&mut self, info: &CloseInfo) {
        if info.terminal && !self.connection_lost {
            self.connection_lost = true;
            self.notices.push(Notice {
                level: NoticeLevel::Error,
                message: CONNECTION_LOST_MESSAGE.to_string(),
                duration: None,
            });
        }
    }

    pub fn recent_transactions(&self) -> impl Iterator<Item = &TransactionEvent> {
        self.transactions.iter()
    }

    pub fn recent_alerts(&self) -> impl Iterator<Item = &AlertEvent> {
        self.alerts.iter()
    }

    pub fn transaction_count(&self) -> u64 {
        self.transaction_count
    }

    pub fn alert_count(&self) -> u64 {
        self.alert_count
    }

    pub fn component_health(&self) -> &BTreeMap<String, ComponentHealth> {
        &self.components
    }

    pub fn badge(&self) -> ConnectionBadge {
        self.badge
    }

    /// Whether the connection gave up reconnecting
    pub fn is_connection_lost(&self) -> bool {
        self.connection_lost
    }

    /// Notices queued since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new()
    }
}
