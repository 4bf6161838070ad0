//! Northbound device service
//!
//! CRUD over the inventory plus the aggregate health summary. The CLI
//! drives this layer; the control loop never goes through it.

use std::sync::Arc;

use crate::models::{
    Device, DeviceState, DeviceStatus, EndpointSpec, MonitoringSummary, Vendor,
};
use crate::store::{InventoryStore, StoreError};

/// A device as submitted by an operator, before ids are assigned.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub vendor: Vendor,
    pub model: String,
    pub endpoints: Vec<EndpointSpec>,
}

/// Operator-facing operations over the inventory.
pub struct DeviceService {
    store: Arc<dyn InventoryStore>,
}

impl DeviceService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Onboards a device. Rejected when any requested endpoint address
    /// already belongs to an onboarded device.
    pub fn add_device(
        &self,
        vendor: Vendor,
        model: &str,
        endpoints: &[EndpointSpec],
    ) -> Result<Device, StoreError> {
        crate::log_stderr!("Adding device {} {}", vendor, model);

        for spec in endpoints {
            if let Ok(existing) = self.store.get_device_by_endpoint(&spec.host, &spec.port) {
                return Err(StoreError::AlreadyExists(format!(
                    "network device ({}) already owns endpoint {}:{}",
                    existing.id, spec.host, spec.port
                )));
            }
        }

        self.store.create_device(vendor, model, endpoints)
    }

    pub fn delete_device(&self, id: &str) -> Result<(), StoreError> {
        crate::log_stderr!("Removing network device ({})", id);
        if id.is_empty() {
            return Err(StoreError::Invalid("device id is not specified".into()));
        }
        self.store.delete_device(id)
    }

    pub fn get_device(&self, id: &str) -> Result<Device, StoreError> {
        self.store.get_device(id)
    }

    pub fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        crate::log_debug!("Retrieving all available network devices");
        self.store.list_devices()
    }

    /// Updates user-editable fields; `None` keeps the stored value.
    pub fn update_device(
        &self,
        id: &str,
        model: Option<&str>,
        vendor: Option<Vendor>,
    ) -> Result<Device, StoreError> {
        crate::log_stderr!("Updating network device ({})", id);
        self.store.update_device(id, model, vendor)
    }

    /// Attaches additional endpoints to an onboarded device. Rejected
    /// when any requested address is already registered.
    pub fn add_endpoints(
        &self,
        id: &str,
        endpoints: &[EndpointSpec],
    ) -> Result<Device, StoreError> {
        crate::log_stderr!(
            "Adding {} endpoint(s) to network device ({})",
            endpoints.len(),
            id
        );

        for spec in endpoints {
            if let Ok(existing) = self.store.get_device_by_endpoint(&spec.host, &spec.port) {
                return Err(StoreError::AlreadyExists(format!(
                    "network device ({}) already owns endpoint {}:{}",
                    existing.id, spec.host, spec.port
                )));
            }
        }

        self.store.add_endpoints(id, endpoints)
    }

    /// Latest published status. `NotFound` until the control loop has
    /// reconciled the device at least once.
    pub fn get_device_status(&self, id: &str) -> Result<DeviceStatus, StoreError> {
        crate::log_debug!("Retrieving network device status ({})", id);
        // resolve the device first so a bogus id reads as such, not as
        // a device that merely has no status yet
        self.store.get_device(id)?;
        self.store.get_device_status(id)
    }

    pub fn list_statuses(&self) -> Result<Vec<DeviceStatus>, StoreError> {
        self.store.list_device_statuses()
    }

    /// Counts devices by published state. Devices the control loop has
    /// not observed yet are skipped.
    pub fn summary(&self) -> Result<MonitoringSummary, StoreError> {
        crate::log_debug!("Retrieving network device summary");
        let mut summary = MonitoringSummary::default();

        for device in self.store.list_devices()? {
            match self.store.get_device_status(&device.id) {
                Ok(status) => {
                    summary.total += 1;
                    match status.state {
                        DeviceState::Up => summary.up += 1,
                        DeviceState::Unhealthy => summary.unhealthy += 1,
                        DeviceState::Down => summary.down += 1,
                        DeviceState::Unspecified => {}
                    }
                }
                Err(StoreError::NotFound(_)) => {
                    crate::log_debug!("Network device ({}) has no status yet", device.id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(summary)
    }

    /// Replaces the whole inventory with the provided devices.
    pub fn swap_devices(&self, devices: &[NewDevice]) -> Result<Vec<Device>, StoreError> {
        crate::log_stderr!("Swapping the network device inventory");
        if devices.is_empty() {
            return Err(StoreError::Invalid(
                "at least one device is required".into(),
            ));
        }

        for existing in self.store.list_devices()? {
            self.store.delete_device(&existing.id)?;
        }

        let mut added = Vec::with_capacity(devices.len());
        for device in devices {
            added.push(self.add_device(device.vendor, &device.model, &device.endpoints)?);
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Protocol;
    use crate::store::SqliteStore;

    fn service() -> (DeviceService, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        (DeviceService::new(store.clone()), store)
    }

    fn endpoint(host: &str, port: &str, protocol: Protocol) -> EndpointSpec {
        EndpointSpec {
            host: host.to_string(),
            port: port.to_string(),
            protocol,
        }
    }

    #[test]
    fn add_device_rejects_occupied_endpoint_address() {
        let (service, _) = service();
        service
            .add_device(
                Vendor::Ubiquiti,
                "XYZ",
                &[endpoint("localhost", "50151", Protocol::Netconf)],
            )
            .unwrap();

        let clash = service.add_device(
            Vendor::Cisco,
            "xyz",
            &[endpoint("localhost", "50151", Protocol::Snmp)],
        );
        assert!(matches!(clash, Err(StoreError::AlreadyExists(_))));
        assert_eq!(service.list_devices().unwrap().len(), 1);
    }

    #[test]
    fn add_endpoints_extends_a_device_and_rejects_taken_addresses() {
        let (service, _) = service();
        let device = service
            .add_device(
                Vendor::Ubiquiti,
                "XYZ",
                &[endpoint("localhost", "50151", Protocol::Netconf)],
            )
            .unwrap();
        let other = service
            .add_device(
                Vendor::Cisco,
                "xyz",
                &[endpoint("localhost", "50152", Protocol::Snmp)],
            )
            .unwrap();

        let updated = service
            .add_endpoints(
                &device.id,
                &[endpoint("localhost", "50161", Protocol::Restconf)],
            )
            .unwrap();
        assert_eq!(updated.endpoints.len(), 2);
        assert_eq!(updated.endpoints[1].protocol, Protocol::Restconf);

        // an address owned by another device is rejected up front
        let clash = service.add_endpoints(
            &device.id,
            &[endpoint("localhost", "50152", Protocol::Restconf)],
        );
        assert!(matches!(clash, Err(StoreError::AlreadyExists(_))));
        assert_eq!(service.get_device(&other.id).unwrap().endpoints.len(), 1);

        // an unknown device reads as such
        let missing = service.add_endpoints(
            "netdev-missing",
            &[endpoint("localhost", "50170", Protocol::Snmp)],
        );
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn status_is_not_found_before_first_reconciliation() {
        let (service, _) = service();
        let device = service
            .add_device(
                Vendor::Juniper,
                "Zyx",
                &[endpoint("localhost", "50154", Protocol::OpenVSwitch)],
            )
            .unwrap();

        let status = service.get_device_status(&device.id);
        assert!(matches!(status, Err(StoreError::NotFound(_))));

        // a bogus id is also NotFound, resolved against the device
        let bogus = service.get_device_status("netdev-bogus");
        assert!(matches!(bogus, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn summary_counts_only_observed_devices() {
        let (service, store) = service();
        let up = service
            .add_device(
                Vendor::Ubiquiti,
                "XYZ",
                &[endpoint("localhost", "50151", Protocol::Netconf)],
            )
            .unwrap();
        let down = service
            .add_device(
                Vendor::Cisco,
                "xyz",
                &[endpoint("localhost", "50152", Protocol::Snmp)],
            )
            .unwrap();
        // a third device was onboarded but never reconciled
        service
            .add_device(
                Vendor::Juniper,
                "Zyx",
                &[endpoint("localhost", "50153", Protocol::Restconf)],
            )
            .unwrap();

        store
            .update_device_status_by_device_id(&up.id, DeviceState::Up, "2026-01-01T00:00:00Z", 0)
            .unwrap();
        store
            .update_device_status_by_device_id(&down.id, DeviceState::Down, "", 3)
            .unwrap();

        let summary = service.summary().unwrap();
        assert_eq!(
            summary,
            MonitoringSummary {
                total: 2,
                up: 1,
                unhealthy: 0,
                down: 1,
            }
        );
    }

    #[test]
    fn swap_replaces_the_whole_inventory() {
        let (service, _) = service();
        service
            .add_device(
                Vendor::Ubiquiti,
                "old-model",
                &[endpoint("localhost", "50151", Protocol::Netconf)],
            )
            .unwrap();

        let swapped = service
            .swap_devices(&[
                NewDevice {
                    vendor: Vendor::Cisco,
                    model: "new-a".to_string(),
                    endpoints: vec![endpoint("localhost", "50161", Protocol::Snmp)],
                },
                NewDevice {
                    vendor: Vendor::Juniper,
                    model: "new-b".to_string(),
                    endpoints: vec![endpoint("localhost", "50162", Protocol::Restconf)],
                },
            ])
            .unwrap();
        assert_eq!(swapped.len(), 2);

        let models: Vec<String> = service
            .list_devices()
            .unwrap()
            .into_iter()
            .map(|d| d.model)
            .collect();
        assert_eq!(models, vec!["new-a".to_string(), "new-b".to_string()]);
    }

    #[test]
    fn swap_requires_at_least_one_device() {
        let (service, _) = service();
        assert!(matches!(
            service.swap_devices(&[]),
            Err(StoreError::Invalid(_))
        ));
    }
}
