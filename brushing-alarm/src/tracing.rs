//! Logging setup.
//!
//! Modules pull the `tracing` macros in through [`prelude`] so the
//! logging backend can change in one place.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod prelude {
    pub use ::tracing::{debug, error, info, trace, warn};
}

/// Default filter when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// Logs go to journald when the process was started by systemd with its
/// output connected to the journal (`JOURNAL_STREAM` is set), and to
/// stdout otherwise.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if std::env::var_os("JOURNAL_STREAM").is_some() {
        match tracing_journald::layer() {
            Ok(journald) => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(journald)
                    .init();
                return;
            }
            Err(e) => {
                eprintln!("journald unavailable, logging to stdout: {e}");
            }
        }
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_timer(fmt::time::LocalTime::rfc_3339()))
        .init();
}
