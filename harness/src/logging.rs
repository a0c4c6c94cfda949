//! Diagnostics for hook invocations.
//!
//! Every hook runs as a short-lived process whose stdout is the JSON response
//! read by the agent host, so tracing output goes to stderr only, without
//! ANSI colors (hosts usually capture stderr into a log file). Anything the
//! agent should see belongs in the response or in `harness-progress.txt`.

use std::env;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DIRECTIVES: &str = "warn";

/// `HARNESS_LOG` wins over `RUST_LOG`; blank values are ignored.
fn filter_directives(harness_log: Option<String>, rust_log: Option<String>) -> String {
    [harness_log, rust_log]
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVES.to_string())
}

/// Install the stderr subscriber.
///
/// ```bash
/// HARNESS_LOG=harness=debug harness post-tool-use < event.json
/// ```
pub fn init() {
    let directives = filter_directives(env::var("HARNESS_LOG").ok(), env::var("RUST_LOG").ok());
    let filter =
        EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .compact(),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harness_log_takes_precedence() {
        let pick = |harness: Option<&str>, rust: Option<&str>| {
            filter_directives(harness.map(String::from), rust.map(String::from))
        };
        assert_eq!(pick(Some("harness=debug"), Some("info")), "harness=debug");
        assert_eq!(pick(Some("  "), Some("info")), "info");
        assert_eq!(pick(None, None), "warn");
    }
}
