//! NetPulse — Network Device Monitoring Controller
//!
//! This crate maintains an authoritative inventory of managed network
//! devices and keeps it fresh:
//! - Periodic southbound control loop polling every device
//! - Protocol adapters over SNMP / NETCONF / RESTCONF / OVSDB endpoints
//! - Consecutive-failure hysteresis before publishing DOWN
//! - Independent checksum verification of reported versions
//! - SQLite-backed inventory store
//! - Device simulator for adapter development and testing

pub mod adapters;
pub mod app;
pub mod checksum;
pub mod cli;
mod command_handlers;
pub mod config;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod service;
pub mod sim;
pub mod store;

pub use adapters::{AdapterError, DeviceAdapter};
pub use checksum::{ChecksumGenerator, ExternalGenerator, Sha256Generator, sha256_hex};
pub use config::{Config, FAILURE_THRESHOLD};
pub use models::*;
pub use monitor::{ControlLoop, LoopConfig, LoopState, reconcile_device};
pub use service::{DeviceService, NewDevice};
pub use sim::{DeviceSimulator, SimProfile, SimStatus};
pub use store::{InventoryStore, SqliteStore, StoreError};
