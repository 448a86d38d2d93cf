//! Logging utilities.
//!
//! The engine itself only emits through the `log` facade; hosts that do not
//! install their own logger can call [`init_logging`].

mod init;

pub use init::{init_logging, LoggingConfig};
