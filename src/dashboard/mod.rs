// Dashboard module - Render model driven by live events
pub mod feed;
pub mod risk;

pub use feed::{
    ComponentHealth, ConnectionBadge, LiveFeed, MAX_RECENT_ALERTS, MAX_RECENT_TRANSACTIONS,
    Notice, NoticeLevel, SharedFeed,
};
pub use risk::RiskBand;
