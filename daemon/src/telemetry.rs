//! Logging setup for the daemon
//!
//! Console output always; a plain-text copy goes to a file when one is
//! configured. `RUST_LOG` overrides the configured level.

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::Path;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::parse_level;

const TIME_FORMAT: &str = "%H:%M:%S";

/// Install the global subscriber.
///
/// The returned guard flushes the log file on drop and must be held until
/// the process exits.
pub fn init_logging(log_level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = parse_level(log_level).unwrap_or(tracing::Level::INFO);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()));

    let (file_layer, guard) = match log_file {
        Some(log_path) => {
            let dir = log_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;

            let file_appender = rolling::never(
                dir,
                log_path.file_name().unwrap_or_else(|| OsStr::new("sshsync.log")),
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("installing the log subscriber")?;

    Ok(guard)
}

fn default_directive(level: tracing::Level) -> String {
    format!("sshsync={}", level.to_string().to_lowercase())
}
