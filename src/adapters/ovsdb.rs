//! OVSDB protocol adapter
//!
//! Covers endpoints registered with `PROTOCOL_OPEN_V_SWITCH`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::transport::{
    ProbeTransport, hw_from_response, status_from_response, version_from_response,
};
use super::{AdapterError, DeviceAdapter};
use crate::models::{DeviceState, Endpoint, VersionInfo};
use crate::sim::wire::ProbeOp;

/// Handles status and version probes for Open vSwitch devices.
pub struct OvsdbAdapter {
    endpoint: Endpoint,
}

impl OvsdbAdapter {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    fn transport(&self) -> ProbeTransport {
        ProbeTransport::new(&self.endpoint)
    }
}

#[async_trait]
impl DeviceAdapter for OvsdbAdapter {
    async fn get_status(&self, ctx: &CancellationToken) -> Result<DeviceState, AdapterError> {
        crate::log_debug!(
            "Checking status for {}:{} via OVSDB",
            self.endpoint.host,
            self.endpoint.port
        );
        match self.transport().exchange(ctx, ProbeOp::GetStatus).await {
            Ok(response) => status_from_response(&response),
            Err(AdapterError::Transport(e)) => {
                crate::log_error!(
                    "Error establishing OVSDB connection, reporting that device is down: {}",
                    e
                );
                Ok(DeviceState::Down)
            }
            Err(e) => {
                crate::log_error!(
                    "Failed to retrieve device status for {}:{} via OVSDB: {}",
                    self.endpoint.host,
                    self.endpoint.port,
                    e
                );
                Err(e)
            }
        }
    }

    async fn get_hw_version(&self, ctx: &CancellationToken) -> Result<String, AdapterError> {
        crate::log_debug!(
            "Checking HW version for {}:{} via OVSDB",
            self.endpoint.host,
            self.endpoint.port
        );
        let response = self.transport().exchange(ctx, ProbeOp::GetHwVersion).await?;
        hw_from_response(&response)
    }

    async fn get_sw_version(&self, ctx: &CancellationToken) -> Result<VersionInfo, AdapterError> {
        crate::log_debug!(
            "Checking SW version for {}:{} via OVSDB",
            self.endpoint.host,
            self.endpoint.port
        );
        let response = self.transport().exchange(ctx, ProbeOp::GetSwVersion).await?;
        version_from_response(&response)
    }

    async fn get_fw_version(&self, ctx: &CancellationToken) -> Result<VersionInfo, AdapterError> {
        crate::log_debug!(
            "Checking FW version for {}:{} via OVSDB",
            self.endpoint.host,
            self.endpoint.port
        );
        let response = self.transport().exchange(ctx, ProbeOp::GetFwVersion).await?;
        version_from_response(&response)
    }
}
