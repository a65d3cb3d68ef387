//! Diagnostic logging setup
//!
//! All diagnostics go to stderr through `tracing`. Stdout is reserved for the
//! run's result line, and the live status line shares stderr, so events are
//! kept compact (no timestamps or targets).

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Initialize logging at `level` unless `RUST_LOG` overrides it
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logging(level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_thread_ids(false);

    let _ = Registry::default().with(env_filter).with(fmt_layer).try_init();
}

/// Log level for the command line `--debug` switch
pub fn level_for(debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

fn default_directive(level: Level) -> String {
    format!("precondition={},warn", level)
}
