//! Logging setup for the vitals binaries.
//!
//! Log lines go to stderr so command output on stdout stays parseable.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used by the CLI for `verbose`
pub fn level_for(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Filter directives raising our own crates to `level`
///
/// Dependencies stay at `warn` whatever the level.
pub fn directives(level: &str) -> String {
    format!("warn,vitals_core={0},vitals={0}", level)
}

/// Initialize logging for the CLI
pub fn init(verbose: bool) {
    init_with_level(level_for(verbose))
}

/// Initialize logging with a specific default level
///
/// RUST_LOG still overrides it. Calling this twice is harmless.
pub fn init_with_level(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(default_level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// Initialize logging for testing (captures logs for test output)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new(directives("debug")))
        .try_init();
}
