//! Inventory store
//!
//! Persisted CRUD over devices, endpoints, statuses, and versions.
//! The control loop and the northbound service only ever see the
//! [`InventoryStore`] trait; the SQLite implementation lives in
//! [`sqlite`].

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use thiserror::Error;

use crate::models::{
    Device, DeviceState, DeviceStatus, EndpointSpec, Vendor, VersionInfo,
};

/// Store error taxonomy surfaced to callers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint would be violated.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A precondition on the input was violated (missing required
    /// field, empty enum value).
    #[error("invalid input: {0}")]
    Invalid(String),

    /// The backing database failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("no matching row".into()),
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::AlreadyExists(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// Persisted CRUD over the device inventory.
///
/// Implementations must be safe for concurrent use: within a tick one
/// reconciler runs per device and they all share the store.
pub trait InventoryStore: Send + Sync {
    /// All devices with their endpoints eagerly loaded.
    fn list_devices(&self) -> Result<Vec<Device>, StoreError>;

    /// One device by id, with endpoints and version edges loaded.
    fn get_device(&self, id: &str) -> Result<Device, StoreError>;

    /// Reverse lookup through an endpoint address. `(host, port)` is
    /// unique, so this resolves to at most one device.
    fn get_device_by_endpoint(&self, host: &str, port: &str) -> Result<Device, StoreError>;

    /// Creates a device together with its endpoints.
    fn create_device(
        &self,
        vendor: Vendor,
        model: &str,
        endpoints: &[EndpointSpec],
    ) -> Result<Device, StoreError>;

    /// Updates user-editable device fields; `None` keeps the stored value.
    fn update_device(
        &self,
        id: &str,
        model: Option<&str>,
        vendor: Option<Vendor>,
    ) -> Result<Device, StoreError>;

    /// Attaches additional endpoints to an existing device.
    fn add_endpoints(&self, device_id: &str, endpoints: &[EndpointSpec])
    -> Result<Device, StoreError>;

    /// Deletes a device; its endpoints and status go with it.
    fn delete_device(&self, id: &str) -> Result<(), StoreError>;

    /// Latest published status for a device; `NotFound` before the
    /// first reconciliation.
    fn get_device_status(&self, device_id: &str) -> Result<DeviceStatus, StoreError>;

    /// All published statuses.
    fn list_device_statuses(&self) -> Result<Vec<DeviceStatus>, StoreError>;

    /// Publishes a status observation for a device, creating the row
    /// on first use. `NotFound` if the device itself is gone.
    fn update_device_status_by_device_id(
        &self,
        device_id: &str,
        state: DeviceState,
        last_seen: &str,
        consecutive_failures: u32,
    ) -> Result<DeviceStatus, StoreError>;

    /// Updates version edges from a probe observation. An empty `hw`
    /// and a `None` for `sw`/`fw` leave the stored value untouched;
    /// observed `(value, checksum)` pairs are deduplicated against
    /// existing version records.
    fn update_device_versions(
        &self,
        device_id: &str,
        hw: &str,
        sw: Option<&VersionInfo>,
        fw: Option<&VersionInfo>,
    ) -> Result<Device, StoreError>;
}
