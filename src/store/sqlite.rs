//! SQLite-backed inventory store
//!
//! Thread-safe connection wrapper plus the query layer. Resources get
//! prefixed random ids so operators can tell record kinds apart at a
//! glance.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::schema;
use super::{InventoryStore, StoreError};
use crate::models::{
    Device, DeviceState, DeviceStatus, Endpoint, EndpointSpec, Vendor, Version, VersionInfo,
};

// Resource id prefixes, kept for operator convenience only.
const DEVICE_PREFIX: &str = "netdev-";
const ENDPOINT_PREFIX: &str = "endpoint-";
const DEVICE_STATUS_PREFIX: &str = "devstat-";
const VERSION_PREFIX: &str = "version-";

fn new_id(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4())
}

/// Inventory store backed by a single SQLite database file.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStore {
    /// Opens (and if necessary creates) the inventory database.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("Failed to create data directory: {e}")))?;
        }

        let conn = Connection::open(&path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory inventory (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::create_tables(&conn).map_err(|e| StoreError::Backend(format!("{e:#}")))?;
        Ok(())
    }

    /// Database location (`:memory:` for test stores).
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("inventory connection lock poisoned".into()))
    }
}

impl Clone for SqliteStore {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            path: self.path.clone(),
        }
    }
}

fn parse_enum<T: FromStr<Err = String>>(raw: &str) -> Result<T, StoreError> {
    T::from_str(raw).map_err(StoreError::Backend)
}

fn load_version(conn: &Connection, id: &str) -> Result<Version, StoreError> {
    let version = conn
        .query_row(
            "SELECT id, value, checksum FROM versions WHERE id = ?1",
            params![id],
            |row| {
                Ok(Version {
                    id: row.get(0)?,
                    value: row.get(1)?,
                    checksum: row.get(2)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("version ({id})")))?;
    Ok(version)
}

fn load_endpoints(conn: &Connection, device_id: &str) -> Result<Vec<Endpoint>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, host, port, protocol FROM endpoints WHERE device_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![device_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut endpoints = Vec::new();
    for row in rows {
        let (id, host, port, protocol) = row?;
        endpoints.push(Endpoint {
            id,
            host,
            port,
            protocol: parse_enum(&protocol)?,
        });
    }
    Ok(endpoints)
}

/// Loads a device with all its edges eagerly materialized.
fn load_device(conn: &Connection, id: &str) -> Result<Device, StoreError> {
    let row = conn
        .query_row(
            "SELECT vendor, model, hw_version, sw_version_id, fw_version_id
             FROM devices WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(format!("network device ({id})")))?;

    let (vendor, model, hw_version, sw_id, fw_id) = row;
    let sw_version = sw_id.map(|v| load_version(conn, &v)).transpose()?;
    let fw_version = fw_id.map(|v| load_version(conn, &v)).transpose()?;

    Ok(Device {
        id: id.to_string(),
        vendor: parse_enum(&vendor)?,
        model,
        hw_version,
        sw_version,
        fw_version,
        endpoints: load_endpoints(conn, id)?,
    })
}

fn insert_endpoint(
    conn: &Connection,
    device_id: &str,
    spec: &EndpointSpec,
) -> Result<(), StoreError> {
    if spec.host.is_empty() || spec.port.is_empty() {
        return Err(StoreError::Invalid(
            "endpoint host and port must be non-empty".into(),
        ));
    }
    conn.execute(
        "INSERT INTO endpoints (id, device_id, host, port, protocol) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new_id(ENDPOINT_PREFIX),
            device_id,
            spec.host,
            spec.port,
            spec.protocol.to_string()
        ],
    )
    .map_err(|e| match StoreError::from(e) {
        StoreError::AlreadyExists(_) => StoreError::AlreadyExists(format!(
            "endpoint {}:{} is already registered",
            spec.host, spec.port
        )),
        other => other,
    })?;
    Ok(())
}

fn get_or_create_version(conn: &Connection, info: &VersionInfo) -> Result<String, StoreError> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM versions WHERE value = ?1 AND checksum = ?2",
            params![info.value, info.checksum],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let id = new_id(VERSION_PREFIX);
    conn.execute(
        "INSERT INTO versions (id, value, checksum) VALUES (?1, ?2, ?3)",
        params![id, info.value, info.checksum],
    )?;
    Ok(id)
}

fn device_exists(conn: &Connection, id: &str) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM devices WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn status_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String, u32)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn into_status(
    raw: (String, String, String, String, u32),
) -> Result<DeviceStatus, StoreError> {
    let (id, device_id, state, last_seen, consecutive_failures) = raw;
    Ok(DeviceStatus {
        id,
        device_id,
        state: parse_enum(&state)?,
        last_seen,
        consecutive_failures,
    })
}

impl InventoryStore for SqliteStore {
    fn list_devices(&self) -> Result<Vec<Device>, StoreError> {
        let conn = self.lock()?;
        let ids: Vec<String> = conn
            .prepare("SELECT id FROM devices ORDER BY rowid")?
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        let mut devices = Vec::with_capacity(ids.len());
        for id in ids {
            devices.push(load_device(&conn, &id)?);
        }
        Ok(devices)
    }

    fn get_device(&self, id: &str) -> Result<Device, StoreError> {
        let conn = self.lock()?;
        load_device(&conn, id)
    }

    fn get_device_by_endpoint(&self, host: &str, port: &str) -> Result<Device, StoreError> {
        let conn = self.lock()?;
        let device_id: Option<String> = conn
            .query_row(
                "SELECT device_id FROM endpoints WHERE host = ?1 AND port = ?2",
                params![host, port],
                |row| row.get(0),
            )
            .optional()?;

        match device_id {
            Some(id) => load_device(&conn, &id),
            None => Err(StoreError::NotFound(format!(
                "no network device reachable at {host}:{port}"
            ))),
        }
    }

    fn create_device(
        &self,
        vendor: Vendor,
        model: &str,
        endpoints: &[EndpointSpec],
    ) -> Result<Device, StoreError> {
        if model.is_empty() {
            return Err(StoreError::Invalid("device model must be non-empty".into()));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let id = new_id(DEVICE_PREFIX);
        tx.execute(
            "INSERT INTO devices (id, vendor, model) VALUES (?1, ?2, ?3)",
            params![id, vendor.to_string(), model],
        )?;
        for spec in endpoints {
            insert_endpoint(&tx, &id, spec)?;
        }

        let device = load_device(&tx, &id)?;
        tx.commit()?;
        crate::log_debug!("Created network device ({}) {} by {}", id, model, vendor);
        Ok(device)
    }

    fn update_device(
        &self,
        id: &str,
        model: Option<&str>,
        vendor: Option<Vendor>,
    ) -> Result<Device, StoreError> {
        let conn = self.lock()?;
        if !device_exists(&conn, id)? {
            return Err(StoreError::NotFound(format!("network device ({id})")));
        }

        if let Some(model) = model {
            if model.is_empty() {
                return Err(StoreError::Invalid("device model must be non-empty".into()));
            }
            conn.execute(
                "UPDATE devices SET model = ?2 WHERE id = ?1",
                params![id, model],
            )?;
        }
        if let Some(vendor) = vendor {
            conn.execute(
                "UPDATE devices SET vendor = ?2 WHERE id = ?1",
                params![id, vendor.to_string()],
            )?;
        }

        load_device(&conn, id)
    }

    fn add_endpoints(
        &self,
        device_id: &str,
        endpoints: &[EndpointSpec],
    ) -> Result<Device, StoreError> {
        if endpoints.is_empty() {
            return Err(StoreError::Invalid(
                "at least one endpoint is required".into(),
            ));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if !device_exists(&tx, device_id)? {
            return Err(StoreError::NotFound(format!("network device ({device_id})")));
        }
        for spec in endpoints {
            insert_endpoint(&tx, device_id, spec)?;
        }
        let device = load_device(&tx, device_id)?;
        tx.commit()?;
        Ok(device)
    }

    fn delete_device(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM devices WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("network device ({id})")));
        }
        crate::log_debug!("Deleted network device ({})", id);
        Ok(())
    }

    fn get_device_status(&self, device_id: &str) -> Result<DeviceStatus, StoreError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT id, device_id, state, last_seen, consecutive_failures
                 FROM device_statuses WHERE device_id = ?1",
                params![device_id],
                status_row,
            )
            .optional()?
            .ok_or_else(|| {
                StoreError::NotFound(format!("no status recorded for network device ({device_id})"))
            })?;
        into_status(raw)
    }

    fn list_device_statuses(&self) -> Result<Vec<DeviceStatus>, StoreError> {
        let conn = self.lock()?;
        let raws: Vec<_> = conn
            .prepare(
                "SELECT id, device_id, state, last_seen, consecutive_failures
                 FROM device_statuses ORDER BY rowid",
            )?
            .query_map([], status_row)?
            .collect::<Result<_, _>>()?;

        raws.into_iter().map(into_status).collect()
    }

    fn update_device_status_by_device_id(
        &self,
        device_id: &str,
        state: DeviceState,
        last_seen: &str,
        consecutive_failures: u32,
    ) -> Result<DeviceStatus, StoreError> {
        let conn = self.lock()?;
        if !device_exists(&conn, device_id)? {
            return Err(StoreError::NotFound(format!(
                "network device ({device_id}) - it must be created before a status can be recorded"
            )));
        }

        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM device_statuses WHERE device_id = ?1",
                params![device_id],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE device_statuses
                     SET state = ?2, last_seen = ?3, consecutive_failures = ?4
                     WHERE id = ?1",
                    params![id, state.to_string(), last_seen, consecutive_failures],
                )?;
                id
            }
            None => {
                let id = new_id(DEVICE_STATUS_PREFIX);
                conn.execute(
                    "INSERT INTO device_statuses (id, device_id, state, last_seen, consecutive_failures)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![id, device_id, state.to_string(), last_seen, consecutive_failures],
                )?;
                id
            }
        };

        Ok(DeviceStatus {
            id,
            device_id: device_id.to_string(),
            state,
            last_seen: last_seen.to_string(),
            consecutive_failures,
        })
    }

    fn update_device_versions(
        &self,
        device_id: &str,
        hw: &str,
        sw: Option<&VersionInfo>,
        fw: Option<&VersionInfo>,
    ) -> Result<Device, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if !device_exists(&tx, device_id)? {
            return Err(StoreError::NotFound(format!("network device ({device_id})")));
        }

        if !hw.is_empty() {
            tx.execute(
                "UPDATE devices SET hw_version = ?2 WHERE id = ?1",
                params![device_id, hw],
            )?;
        }
        if let Some(info) = sw {
            let version_id = get_or_create_version(&tx, info)?;
            tx.execute(
                "UPDATE devices SET sw_version_id = ?2 WHERE id = ?1",
                params![device_id, version_id],
            )?;
        }
        if let Some(info) = fw {
            let version_id = get_or_create_version(&tx, info)?;
            tx.execute(
                "UPDATE devices SET fw_version_id = ?2 WHERE id = ?1",
                params![device_id, version_id],
            )?;
        }

        let device = load_device(&tx, device_id)?;
        tx.commit()?;
        Ok(device)
    }
}
