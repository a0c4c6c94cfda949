//! Deterministic, pure logic shared by the harness.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests;
//! timestamps are always passed in by the caller.

pub mod artifact;
pub mod classifier;
pub mod context;
pub mod gate;
pub mod information;
pub mod intent;
pub mod phase;
pub mod report;
pub mod schema;
pub mod types;
