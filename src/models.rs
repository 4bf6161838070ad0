//! Domain model for the monitoring controller
//!
//! Devices own their endpoints; statuses and versions are reached
//! through the inventory store. Enum spellings follow the wire values
//! exposed northbound and must stay stable.

use serde::{Deserialize, Serialize};

/// A managed network device with eagerly loaded edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub vendor: Vendor,
    pub model: String,
    /// Empty until the first successful probe reports one.
    #[serde(default)]
    pub hw_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fw_version: Option<Version>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// A `(host, port, protocol)` triple at which a device can be reached.
///
/// `(host, port)` is globally unique across the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub host: String,
    pub port: String,
    pub protocol: Protocol,
}

/// Input shape for endpoint creation, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub host: String,
    pub port: String,
    pub protocol: Protocol,
}

/// A persisted software/firmware version record.
///
/// `(value, checksum)` tuples are deduplicated by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: String,
    pub value: String,
    pub checksum: String,
}

/// A version as reported by a device, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub value: String,
    pub checksum: String,
}

/// Latest published observation for a device. At most one per device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub id: String,
    pub device_id: String,
    pub state: DeviceState,
    /// RFC 3339 timestamp of the last alive probe; empty while the
    /// device has not been seen alive in the current down streak.
    pub last_seen: String,
    pub consecutive_failures: u32,
}

/// Aggregate health counters over the inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringSummary {
    pub total: u32,
    pub up: u32,
    pub unhealthy: u32,
    pub down: u32,
}

/// Device vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vendor {
    #[serde(rename = "VENDOR_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "VENDOR_UBIQUITI")]
    Ubiquiti,
    #[serde(rename = "VENDOR_CISCO")]
    Cisco,
    #[serde(rename = "VENDOR_JUNIPER")]
    Juniper,
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vendor::Unspecified => write!(f, "VENDOR_UNSPECIFIED"),
            Vendor::Ubiquiti => write!(f, "VENDOR_UBIQUITI"),
            Vendor::Cisco => write!(f, "VENDOR_CISCO"),
            Vendor::Juniper => write!(f, "VENDOR_JUNIPER"),
        }
    }
}

impl std::str::FromStr for Vendor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VENDOR_UNSPECIFIED" => Ok(Vendor::Unspecified),
            "VENDOR_UBIQUITI" => Ok(Vendor::Ubiquiti),
            "VENDOR_CISCO" => Ok(Vendor::Cisco),
            "VENDOR_JUNIPER" => Ok(Vendor::Juniper),
            _ => Err(format!("Unknown vendor: {}", s)),
        }
    }
}

/// Management protocol spoken at an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "PROTOCOL_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "PROTOCOL_SNMP")]
    Snmp,
    #[serde(rename = "PROTOCOL_NETCONF")]
    Netconf,
    #[serde(rename = "PROTOCOL_RESTCONF")]
    Restconf,
    #[serde(rename = "PROTOCOL_OPEN_V_SWITCH")]
    OpenVSwitch,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Unspecified => write!(f, "PROTOCOL_UNSPECIFIED"),
            Protocol::Snmp => write!(f, "PROTOCOL_SNMP"),
            Protocol::Netconf => write!(f, "PROTOCOL_NETCONF"),
            Protocol::Restconf => write!(f, "PROTOCOL_RESTCONF"),
            Protocol::OpenVSwitch => write!(f, "PROTOCOL_OPEN_V_SWITCH"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROTOCOL_UNSPECIFIED" => Ok(Protocol::Unspecified),
            "PROTOCOL_SNMP" => Ok(Protocol::Snmp),
            "PROTOCOL_NETCONF" => Ok(Protocol::Netconf),
            "PROTOCOL_RESTCONF" => Ok(Protocol::Restconf),
            "PROTOCOL_OPEN_V_SWITCH" => Ok(Protocol::OpenVSwitch),
            _ => Err(format!("Unknown protocol: {}", s)),
        }
    }
}

/// Published liveness state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    #[serde(rename = "STATUS_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "STATUS_DEVICE_UP")]
    Up,
    #[serde(rename = "STATUS_DEVICE_UNHEALTHY")]
    Unhealthy,
    #[serde(rename = "STATUS_DEVICE_DOWN")]
    Down,
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Unspecified => write!(f, "STATUS_UNSPECIFIED"),
            DeviceState::Up => write!(f, "STATUS_DEVICE_UP"),
            DeviceState::Unhealthy => write!(f, "STATUS_DEVICE_UNHEALTHY"),
            DeviceState::Down => write!(f, "STATUS_DEVICE_DOWN"),
        }
    }
}

impl std::str::FromStr for DeviceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STATUS_UNSPECIFIED" => Ok(DeviceState::Unspecified),
            "STATUS_DEVICE_UP" => Ok(DeviceState::Up),
            "STATUS_DEVICE_UNHEALTHY" => Ok(DeviceState::Unhealthy),
            "STATUS_DEVICE_DOWN" => Ok(DeviceState::Down),
            _ => Err(format!("Unknown device state: {}", s)),
        }
    }
}
