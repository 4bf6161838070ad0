//! Configuration for the monitoring controller
//!
//! Constants plus the environment-driven `Config` loaded once at
//! startup. Invalid values are fatal: the process must not come up
//! with a half-understood configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Consecutive failed probes required before a previously UP device is
/// published as DOWN. Failures 1 and 2 retain the last UP observation.
pub const FAILURE_THRESHOLD: u32 = 3;

/// Default control loop period when `CONTROL_LOOP_PERIOD` is unset.
pub const DEFAULT_CONTROL_LOOP_PERIOD: Duration = Duration::from_secs(30);

/// Environment variable carrying the control loop period in seconds.
pub const ENV_CONTROL_LOOP_PERIOD: &str = "CONTROL_LOOP_PERIOD";

/// Environment variable overriding the inventory database location.
pub const ENV_DB_PATH: &str = "NETPULSE_DB_PATH";

/// Environment variable naming an external checksum generator binary.
/// When unset the in-process SHA-256 generator is used.
pub const ENV_CHECKSUM_BIN: &str = "CHECKSUM_GENERATOR_BIN";

// ====== Adapter transport configuration ======

/// Timeout for establishing a transport to a device endpoint.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for one request/response exchange after connecting.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

// ====== Device simulator configuration ======

/// Default listen address for the standalone device simulator.
pub const DEFAULT_SIMULATOR_LISTEN: &str = "127.0.0.1:50151";

/// Environment variable forcing the simulator's reported status.
/// Accepts `UP`, `DOWN`, or `UNHEALTHY`.
pub const ENV_SIMULATOR_STATUS: &str = "DEVICE_SIMULATOR_DEVICE_STATUS";

/// Environment variable overriding the simulator's HW model string.
pub const ENV_SIMULATOR_HW_MODEL: &str = "DEVICE_SIMULATOR_HW_MODEL";

/// Environment variable overriding the simulator's SW version string.
pub const ENV_SIMULATOR_SW_VERSION: &str = "DEVICE_SIMULATOR_SW_VERSION";

/// Environment variable overriding the simulator's FW version string.
pub const ENV_SIMULATOR_FW_VERSION: &str = "DEVICE_SIMULATOR_FW_VERSION";

/// Immutable process configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub control_loop_period: Duration,
    pub db_path: PathBuf,
    pub checksum_bin: Option<String>,
}

impl Config {
    /// Resolves configuration from the environment.
    ///
    /// A missing `CONTROL_LOOP_PERIOD` falls back to the default with a
    /// warning; a malformed one is an error the caller must treat as
    /// fatal.
    pub fn from_env() -> Result<Self> {
        let control_loop_period = match std::env::var(ENV_CONTROL_LOOP_PERIOD) {
            Ok(raw) => parse_period_secs(&raw)
                .with_context(|| format!("Failed to parse {}", ENV_CONTROL_LOOP_PERIOD))?,
            Err(_) => {
                crate::log_warn!(
                    "Environment variable {} is not set, using default period of {}s",
                    ENV_CONTROL_LOOP_PERIOD,
                    DEFAULT_CONTROL_LOOP_PERIOD.as_secs()
                );
                DEFAULT_CONTROL_LOOP_PERIOD
            }
        };

        let db_path = std::env::var(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_db_path());

        let checksum_bin = std::env::var(ENV_CHECKSUM_BIN)
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            control_loop_period,
            db_path,
            checksum_bin,
        })
    }
}

/// Default inventory database path under the platform data directory.
pub fn default_db_path() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("netpulse").join("inventory.db")
}

/// Parses a control loop period given as positive integer seconds.
pub fn parse_period_secs(raw: &str) -> Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid period '{}': expected integer seconds", raw))?;
    if secs == 0 {
        anyhow::bail!("Invalid period '{}': must be at least 1 second", raw);
    }
    Ok(Duration::from_secs(secs))
}
