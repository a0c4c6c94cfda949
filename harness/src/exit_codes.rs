//! Stable exit codes for harness CLI commands.
//!
//! Hook subcommands always exit with [`OK`]; failures are reported in the
//! response JSON instead.

/// Command succeeded, or the checked gate allowed or warned.
pub const OK: i32 = 0;
/// Command failed due to missing scaffolding, invalid config, or other errors.
pub const INVALID: i32 = 1;
/// `harness gate` returned a block verdict.
pub const BLOCKED: i32 = 2;
