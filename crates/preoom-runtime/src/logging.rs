//! Diagnostic logging to stderr.

use std::io::IsTerminal;

use preoom_core::config::defaults;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global `tracing` subscriber.
///
/// `directive` takes anything `EnvFilter` understands (`warn`,
/// `preoom_runtime=debug`, ...). An invalid directive falls back to the
/// default level. Calling this twice is a no-op.
pub fn init_logging(directive: &str) {
    let filter =
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(defaults::LOG_LEVEL));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false),
        )
        .with(filter)
        .try_init();
}
