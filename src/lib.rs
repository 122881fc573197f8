//! Daemon and cli that measure how long your tools run while you are at the computer and keep that
//! time under a daily limit. No runtimes or services needed, everything is stored as plain json
//! next to the logs.
//!

pub mod cli;
pub mod daemon;
pub mod fs;
pub mod system_api;
pub mod utils;
