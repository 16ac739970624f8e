use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::Error;
use crate::result::Result;

/// Log levels accepted by configuration files
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Whether `level` names one of the supported log levels
pub fn is_valid_level(level: &str) -> bool {
    LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
}

fn build_filter(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| Error::logging(format!("Invalid log level '{}': {}", log_level, e)))
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `log_level`. Console output goes to stderr;
/// when `log_dir` is set a daily-rolling `nation-dao.log` is written there too.
pub fn init_logging(log_level: &str, log_dir: Option<&Path>) -> Result<()> {
    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(build_filter(log_level)?);

    let file_layer = match log_dir {
        Some(dir) => {
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "nation-dao.log");
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(file_appender)
                    .with_filter(build_filter(log_level)?),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::logging(format!("Failed to initialize logging: {}", e)))?;

    tracing::debug!(
        "Logging initialized at {} (file output: {})",
        log_level,
        log_dir.map(|d| d.display().to_string()).unwrap_or_else(|| "off".to_string())
    );
    Ok(())
}
