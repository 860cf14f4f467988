//! Structured log sink setup.
//!
//! A single process-wide subscriber is installed at startup: leveled,
//! env-filterable via `RUST_LOG`, written to stderr. `-v`/`-vv` on the CLI
//! set the default floor when `RUST_LOG` is unset.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Must be called exactly once, as
/// early as possible in `main`.
pub fn init(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
