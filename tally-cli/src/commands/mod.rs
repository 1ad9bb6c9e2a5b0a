//! CLI command implementations.

pub mod clear;
pub mod drain;
pub mod enqueue;
pub mod history;
pub mod status;
pub mod watch;
