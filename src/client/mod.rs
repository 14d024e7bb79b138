// Module declarations
mod builder;
mod connection;
mod live;
mod state;

// Public API exports
pub use builder::{LiveConnectionBuilder, LiveConnectionOptions};
pub use connection::{ConnectionManager, ConnectionState};
pub use live::{ConnectionSnapshot, LiveConnection};
pub use state::ClientState;
