//! Diagnostic logging via `tracing`.
//!
//! Events go to stderr, filtered by `FLASHBACK_LOG` (an `EnvFilter`
//! directive) or, when unset, `warn` normally and `debug` with `--verbose`.
//! With `logging.file` configured, every debug-level event is also appended
//! to that file without colors.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the filter directive
pub const LOG_ENV: &str = "FLASHBACK_LOG";

/// Filter used for the stderr layer
#[must_use]
pub fn stderr_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "flashback=debug" } else { "warn" })
    })
}

/// Install the global subscriber.
///
/// Calling it twice is harmless; the second call leaves the first subscriber
/// in place.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened for appending.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact()
        .with_filter(stderr_filter(verbose));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_filter(EnvFilter::new("flashback=debug")),
            )
        }
        None => None,
    };

    // Already initialized (e.g. by a test harness) is not an error
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_with_log_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = dir.path().join("logs/flashback.log");
        init(true, Some(&log))?;
        assert!(log.exists());
        init(false, None)?;
        Ok(())
    }
}
