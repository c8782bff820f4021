//! Tracing subscriber setup.
//!
//! Console output always goes to stderr so command output on stdout stays
//! machine-readable. With `[logging] dir` set, a daily-rolling file is
//! written as well; keep the returned guard alive until exit or buffered
//! lines are lost.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::sweep_config::LoggingSection;

const LOG_FILE_PREFIX: &str = "photosweep.log";

/// Filter from `RUST_LOG`, then the configured level, then `info`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init(logging: &LoggingSection) -> Result<Option<WorkerGuard>> {
    let console_text = (!logging.json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });
    let console_json = logging
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));

    let (file_layer, guard) = match &logging.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(&logging.level))
        .with(console_text)
        .with(console_json)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_falls_back() {
        // Must not panic on a malformed directive.
        let filter = env_filter("photosweep=[");
        let _ = filter.to_string();
    }
}
