//! Inventory schema definitions
//!
//! Creates and manages the SQLite tables backing the device inventory.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all inventory tables
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Version records, deduplicated on (value, checksum)
        CREATE TABLE IF NOT EXISTS versions (
            id TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            checksum TEXT NOT NULL,
            UNIQUE(value, checksum)
        );

        -- Managed network devices
        CREATE TABLE IF NOT EXISTS devices (
            id TEXT PRIMARY KEY,
            vendor TEXT NOT NULL,
            model TEXT NOT NULL,
            hw_version TEXT NOT NULL DEFAULT '',
            sw_version_id TEXT REFERENCES versions(id),
            fw_version_id TEXT REFERENCES versions(id)
        );

        -- Endpoints: (host, port) is unique across the whole inventory
        -- so that reverse lookup by address is single-valued
        CREATE TABLE IF NOT EXISTS endpoints (
            id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            host TEXT NOT NULL,
            port TEXT NOT NULL,
            protocol TEXT NOT NULL,
            UNIQUE(host, port)
        );

        -- Latest published observation, at most one row per device
        CREATE TABLE IF NOT EXISTS device_statuses (
            id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL UNIQUE REFERENCES devices(id) ON DELETE CASCADE,
            state TEXT NOT NULL,
            last_seen TEXT NOT NULL DEFAULT '',
            consecutive_failures INTEGER NOT NULL DEFAULT 0
        );

        -- Indexes for the hot lookups
        CREATE INDEX IF NOT EXISTS idx_endpoints_device ON endpoints(device_id);
        CREATE INDEX IF NOT EXISTS idx_endpoints_addr ON endpoints(host, port);
        CREATE INDEX IF NOT EXISTS idx_statuses_device ON device_statuses(device_id);
        CREATE INDEX IF NOT EXISTS idx_versions_tuple ON versions(value, checksum);
        "#,
    )
    .context("Failed to create inventory tables")?;

    Ok(())
}
