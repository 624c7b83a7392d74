//! Diagnostic logging setup.
//!
//! Library code only emits `tracing` events; the binary decides where they go.
//! Output goes to stderr so command output on stdout stays scriptable.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `llmdesk=debug`).
pub const LOG_ENV_VAR: &str = "LLMDESK_LOG";
const DEFAULT_FILTER: &str = "warn";

/// Builds the filter from `LLMDESK_LOG`, an explicit override, or `warn`.
pub fn build_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("llmdesk=debug,warn");
    }
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Safe to call more than once.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init(false);
        init(false);
    }
}
