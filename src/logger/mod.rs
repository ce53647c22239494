//! Process-wide `tracing` setup. `bin/protocol_demo.rs` shows the bootstrap
//! then reload sequence the server uses.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
