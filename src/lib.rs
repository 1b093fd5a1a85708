#![forbid(unsafe_code)]

//! `camelot-bridge` relays newline-delimited text between the evaluation
//! Platform (TCP) and a Camelot child process (stdio).

pub mod camelot;
pub mod config;
pub mod errors;
pub mod logging;
pub mod orchestrator;
pub mod platform;
pub mod pump;
pub mod queue;
pub mod shutdown;

pub use config::RelayConfig;
pub use errors::{AppError, Result};
pub use orchestrator::{Relay, RelayReport};
pub use shutdown::{ShutdownCoordinator, ShutdownReason};
