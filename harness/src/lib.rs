//! Phase-gated workflow harness for long-running coding agents.
//!
//! The harness watches an agent's actions (delivered as hook events) and
//! answers two questions: is enough known or planned to move to the next
//! phase, and how much of what entered the agent's working memory is useful.
//! The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (artifacts, phase derivation,
//!   gates, change and information classifiers, context tracking). No I/O.
//! - **[`io`]**: Side-effecting adapters (config, artifact files, context
//!   state, session ledgers, progress log).
//!
//! Hook handlers ([`pre_tool`], [`post_tool`], [`compact`], [`subagent`],
//! [`status`], [`user_prompt`]) combine the two for one event and return a
//! [`response::HookResponse`].

pub mod compact;
pub mod core;
pub mod env;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod post_tool;
pub mod pre_tool;
pub mod response;
pub mod status;
pub mod subagent;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod user_prompt;
