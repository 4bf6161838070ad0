//! Protocol adapters
//!
//! A uniform, four-operation capability over one device endpoint. The
//! control loop never sees a concrete protocol: it asks the factory
//! for an adapter matching the endpoint and works against the trait.
//! New protocols are added by implementing [`DeviceAdapter`] and
//! extending [`for_endpoint`].

mod netconf;
mod ovsdb;
mod restconf;
mod snmp;
mod transport;

pub use netconf::NetconfAdapter;
pub use ovsdb::OvsdbAdapter;
pub use restconf::RestconfAdapter;
pub use snmp::SnmpAdapter;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::{DeviceState, Endpoint, Protocol, VersionInfo};

/// Adapter error taxonomy.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// No connection to the device could be established. `get_status`
    /// swallows this and reports DOWN instead.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection was made but the remote operation failed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The endpoint's protocol has no adapter.
    #[error("unsupported protocol: {0}")]
    Unsupported(String),

    /// The probe context was cancelled before the call finished.
    #[error("probe cancelled")]
    Cancelled,
}

/// Uniform capability over a single device endpoint.
///
/// Every call opens a fresh transport and releases it on all exit
/// paths, cancellation included.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    /// Probes device liveness. `Ok(Down)` with no error means the
    /// transport itself could not be established.
    async fn get_status(&self, ctx: &CancellationToken) -> Result<DeviceState, AdapterError>;

    /// Hardware revision string as the device reports it.
    async fn get_hw_version(&self, ctx: &CancellationToken) -> Result<String, AdapterError>;

    /// Software version together with the checksum the device claims.
    async fn get_sw_version(&self, ctx: &CancellationToken) -> Result<VersionInfo, AdapterError>;

    /// Firmware version together with the checksum the device claims.
    async fn get_fw_version(&self, ctx: &CancellationToken) -> Result<VersionInfo, AdapterError>;
}

/// Returns the adapter matching the endpoint's protocol.
pub fn for_endpoint(endpoint: &Endpoint) -> Result<Box<dyn DeviceAdapter>, AdapterError> {
    match endpoint.protocol {
        Protocol::Snmp => Ok(Box::new(SnmpAdapter::new(endpoint.clone()))),
        Protocol::Netconf => Ok(Box::new(NetconfAdapter::new(endpoint.clone()))),
        Protocol::Restconf => Ok(Box::new(RestconfAdapter::new(endpoint.clone()))),
        Protocol::OpenVSwitch => Ok(Box::new(OvsdbAdapter::new(endpoint.clone()))),
        Protocol::Unspecified => {
            crate::log_warn!(
                "Protocol {} is not supported for endpoint {}:{}",
                endpoint.protocol,
                endpoint.host,
                endpoint.port
            );
            Err(AdapterError::Unsupported(endpoint.protocol.to_string()))
        }
    }
}
