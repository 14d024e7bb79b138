// Infrastructure module - Core background services and utilities
pub mod endpoint;
pub mod heartbeat;
pub mod task_manager;
pub mod timer;

pub use endpoint::monitor_endpoint;
pub use heartbeat::HeartbeatManager;
pub use task_manager::{TaskKind, TaskManager};
pub use timer::ReconnectPolicy;
