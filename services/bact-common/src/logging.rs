//! Logging bootstrap.
//!
//! Library code logs through `tracing`; only the binary installs a
//! subscriber, exactly once at startup. User-visible step output does not
//! go through here — it goes to the run's console writer.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Initialize logging with the given level and format (`"json"` or
/// `"pretty"`). `RUST_LOG` overrides the level when set.
pub fn init_logging(log_level: &str, log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::debug!(log_level = %log_level, log_format = %log_format, "logging initialized");
}
