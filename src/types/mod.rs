pub mod constants;
pub mod error;
pub mod message;

pub use constants::*;
pub use error::{LiveError, Result};
pub use message::{EventEnvelope, Timestamp, now_millis};
