//! Structured logging for the monitoring controller
//!
//! Console output plus daily-rotated JSON log files under the
//! platform config directory.

pub mod macros;

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging system
///
/// Creates the log directory and sets up daily rotating log files
/// alongside a compact console layer on stderr.
///
/// Set `RUST_LOG` to control the level (`info` by default):
/// - `RUST_LOG=debug` for debug level
/// - `RUST_LOG=trace` for trace level
pub fn init_logging() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "netpulse.log");

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .json();

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let init_result = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(e) = init_result {
        // Avoid panicking when a test harness already installed a global subscriber.
        if e.to_string().contains("already been set") {
            return Ok(log_dir);
        }
        return Err(Box::new(e));
    }

    crate::log_stderr!("Logging initialized. Log directory: {}", log_dir.display());

    Ok(log_dir)
}

/// Log directory path
///
/// Returns: `%APPDATA%/netpulse/logs` on Windows,
///          `~/.config/netpulse/logs` on Linux/macOS
fn get_log_directory() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .ok_or("Could not find APPDATA directory")?
            .join("netpulse")
    } else {
        dirs::config_dir()
            .ok_or("Could not find config directory")?
            .join("netpulse")
    };

    Ok(base_dir.join("logs"))
}
