//! Network device simulator
//!
//! A small TCP server that stands in for a device's management agent.
//! Protocol adapters are developed and tested against it. The reported
//! status and version strings come from a shared, mutable profile so
//! tests can flip device behavior mid-run; environment variables seed
//! the profile for standalone use.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::wire::{ProbeOp, ProbeRequest, ProbeResponse};
use crate::checksum::sha256_hex;
use crate::config::{
    ENV_SIMULATOR_FW_VERSION, ENV_SIMULATOR_HW_MODEL, ENV_SIMULATOR_STATUS,
    ENV_SIMULATOR_SW_VERSION,
};
use crate::models::DeviceState;

const DEFAULT_HW_MODEL: &str = "HW-XYZ";
const DEFAULT_SW_VERSION: &str = "1.0.0";
const DEFAULT_FW_VERSION: &str = "0.1.0";

/// Status a simulated device reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimStatus {
    Up,
    Down,
    Unhealthy,
}

impl SimStatus {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "UP" => Some(SimStatus::Up),
            "DOWN" => Some(SimStatus::Down),
            "UNHEALTHY" => Some(SimStatus::Unhealthy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ProfileInner {
    status: SimStatus,
    hw_model: String,
    sw_version: String,
    fw_version: String,
    /// When set, reported instead of the real SW checksum. Lets tests
    /// exercise a device reporting a tampered version/hash pair.
    sw_checksum_override: Option<String>,
    fw_checksum_override: Option<String>,
}

impl Default for ProfileInner {
    fn default() -> Self {
        Self {
            status: SimStatus::Up,
            hw_model: DEFAULT_HW_MODEL.to_string(),
            sw_version: DEFAULT_SW_VERSION.to_string(),
            fw_version: DEFAULT_FW_VERSION.to_string(),
            sw_checksum_override: None,
            fw_checksum_override: None,
        }
    }
}

/// Shared handle to a simulator's behavior profile.
#[derive(Debug, Clone, Default)]
pub struct SimProfile {
    inner: Arc<Mutex<ProfileInner>>,
}

impl SimProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile seeded from the `DEVICE_SIMULATOR_*` environment
    /// variables; unset variables fall back to defaults.
    pub fn from_env() -> Self {
        let profile = Self::new();

        match std::env::var(ENV_SIMULATOR_STATUS) {
            Ok(raw) => match SimStatus::parse(&raw) {
                Some(status) => profile.set_status(status),
                None => crate::log_warn!(
                    "Ignoring unknown {} value '{}', defaulting to UP",
                    ENV_SIMULATOR_STATUS,
                    raw
                ),
            },
            Err(_) => crate::log_warn!(
                "Environment variable {} is not set, reporting UP",
                ENV_SIMULATOR_STATUS
            ),
        }
        if let Ok(hw) = std::env::var(ENV_SIMULATOR_HW_MODEL) {
            profile.set_hw_model(hw);
        }
        if let Ok(sw) = std::env::var(ENV_SIMULATOR_SW_VERSION) {
            profile.set_sw_version(sw);
        }
        if let Ok(fw) = std::env::var(ENV_SIMULATOR_FW_VERSION) {
            profile.set_fw_version(fw);
        }

        profile
    }

    pub fn set_status(&self, status: SimStatus) {
        self.with_inner(|inner| inner.status = status);
    }

    pub fn set_hw_model(&self, hw_model: impl Into<String>) {
        let hw_model = hw_model.into();
        self.with_inner(|inner| inner.hw_model = hw_model);
    }

    pub fn set_sw_version(&self, sw_version: impl Into<String>) {
        let sw_version = sw_version.into();
        self.with_inner(|inner| inner.sw_version = sw_version);
    }

    pub fn set_fw_version(&self, fw_version: impl Into<String>) {
        let fw_version = fw_version.into();
        self.with_inner(|inner| inner.fw_version = fw_version);
    }

    pub fn set_sw_checksum_override(&self, checksum: Option<String>) {
        self.with_inner(|inner| inner.sw_checksum_override = checksum);
    }

    pub fn set_fw_checksum_override(&self, checksum: Option<String>) {
        self.with_inner(|inner| inner.fw_checksum_override = checksum);
    }

    fn with_inner(&self, apply: impl FnOnce(&mut ProfileInner)) {
        let mut inner = self.inner.lock().expect("simulator profile lock poisoned");
        apply(&mut inner);
    }

    fn snapshot(&self) -> ProfileInner {
        self.inner
            .lock()
            .expect("simulator profile lock poisoned")
            .clone()
    }
}

/// A running device simulator bound to a local TCP address.
pub struct DeviceSimulator {
    local_addr: SocketAddr,
    profile: SimProfile,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl DeviceSimulator {
    /// Binds the simulator with an environment-seeded profile.
    pub async fn bind(addr: &str) -> Result<Self> {
        Self::bind_with_profile(addr, SimProfile::from_env()).await
    }

    /// Binds the simulator with an explicit profile. Use port 0 to let
    /// the OS pick one (tests do).
    pub async fn bind_with_profile(addr: &str, profile: SimProfile) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind device simulator on {addr}"))?;
        let local_addr = listener
            .local_addr()
            .context("Failed to resolve simulator listen address")?;

        let shutdown = CancellationToken::new();
        let accept_token = shutdown.clone();
        let accept_profile = profile.clone();

        let handle = tokio::spawn(async move {
            crate::log_stderr!("Device simulator listening on {}", local_addr);
            loop {
                tokio::select! {
                    _ = accept_token.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            crate::log_debug!("Simulator accepted connection from {}", peer);
                            let profile = accept_profile.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, profile).await {
                                    crate::log_debug!("Simulator connection ended: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            crate::log_warn!("Simulator failed to accept connection: {}", e);
                        }
                    },
                }
            }
            crate::log_stderr!("Device simulator on {} stopped", local_addr);
        });

        Ok(Self {
            local_addr,
            profile,
            shutdown,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Listen port as the string form endpoints are stored in.
    pub fn port(&self) -> String {
        self.local_addr.port().to_string()
    }

    /// Handle for flipping the simulated device's behavior.
    pub fn profile(&self) -> SimProfile {
        self.profile.clone()
    }

    /// Stops accepting connections and waits for the accept loop.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}

async fn handle_connection(stream: TcpStream, profile: SimProfile) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = respond(&line, &profile);
        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        writer.write_all(payload.as_bytes()).await?;
    }

    Ok(())
}

fn respond(raw: &str, profile: &SimProfile) -> ProbeResponse {
    let request: ProbeRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(e) => {
            crate::log_warn!("Simulator received malformed request: {}", e);
            return ProbeResponse::failure(format!("malformed request: {e}"));
        }
    };

    let state = profile.snapshot();
    match request.op {
        ProbeOp::GetStatus => match state.status {
            // a down device cannot answer its own status probe
            SimStatus::Down => ProbeResponse::failure("device is unreachable"),
            SimStatus::Up => ProbeResponse::status(DeviceState::Up.to_string()),
            SimStatus::Unhealthy => ProbeResponse::status(DeviceState::Unhealthy.to_string()),
        },
        ProbeOp::GetHwVersion => ProbeResponse::version(state.hw_model),
        ProbeOp::GetSwVersion => {
            let checksum = state
                .sw_checksum_override
                .unwrap_or_else(|| sha256_hex(state.sw_version.as_bytes()));
            ProbeResponse::checksummed_version(state.sw_version, checksum)
        }
        ProbeOp::GetFwVersion => {
            let checksum = state
                .fw_checksum_override
                .unwrap_or_else(|| sha256_hex(state.fw_version.as_bytes()));
            ProbeResponse::checksummed_version(state.fw_version, checksum)
        }
    }
}
