//! Logging setup
//!
//! Progress messages go through `tracing` at info level, so quiet mode is
//! just a stricter filter. `RUST_LOG` overrides the level picked from the
//! command line flags.

use std::fmt;

use chrono::Local;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

use crate::config::Verbosity;
use crate::error::{BahmError, BahmResult};

/// Local wall-clock timestamps, e.g. `2024-03-15 02:00:07`
struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "[{}]", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Default filter directive for a verbosity level
pub fn filter_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "borgbahm=warn",
        Verbosity::Normal => "borgbahm=info",
        Verbosity::Debug => "borgbahm=debug",
    }
}

/// Install the global subscriber; call once, from `main`
pub fn init_logging(verbosity: Verbosity) -> BahmResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_timer(LocalTimestamp)
        .with_target(verbosity.is_debug())
        .try_init()
        .map_err(|e| BahmError::Config(format!("Failed to initialize logging: {}", e)))
}
