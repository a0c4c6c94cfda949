//! I/O adapters for hook handlers and CLI commands.

pub mod artifact_store;
pub mod clock;
pub mod config;
pub mod context_store;
pub mod init;
pub mod json_file;
pub mod preserved;
pub mod progress;
pub mod session;
