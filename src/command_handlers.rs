use std::sync::Arc;

use anyhow::{Context, Result};

use crate::app::AppContext;
use crate::checksum::{ChecksumGenerator, ExternalGenerator, Sha256Generator};
use crate::config::{Config, DEFAULT_SIMULATOR_LISTEN};
use crate::models::{EndpointSpec, Vendor};
use crate::monitor::{ControlLoop, LoopConfig};
use crate::service::DeviceService;
use crate::sim::DeviceSimulator;
use crate::store::{InventoryStore, SqliteStore};

fn open_store(context: &AppContext) -> Result<Arc<dyn InventoryStore>> {
    let store = SqliteStore::open(context.db_path().to_path_buf())
        .with_context(|| format!("Failed to open inventory at {:?}", context.db_path()))?;
    Ok(Arc::new(store))
}

fn open_service(context: &AppContext) -> Result<DeviceService> {
    Ok(DeviceService::new(open_store(context)?))
}

fn build_verifier(config: &Config) -> Result<Arc<dyn ChecksumGenerator>> {
    match &config.checksum_bin {
        Some(bin) => {
            crate::log_stderr!("Using external checksum generator: {}", bin);
            Ok(Arc::new(ExternalGenerator::new(bin.clone())?))
        }
        None => Ok(Arc::new(Sha256Generator)),
    }
}

/// Runs the controller until interrupted: open the inventory, start
/// the control loop, wait for Ctrl-C, drain in-flight work.
pub(crate) async fn handle_run(context: &AppContext) -> Result<()> {
    let config = Config::from_env()?;
    let store = open_store(context)?;
    let verifier = build_verifier(&config)?;

    let control = ControlLoop::new(
        store,
        verifier,
        LoopConfig {
            period: config.control_loop_period,
        },
    );
    control.start()?;
    context.emit_line(&format!(
        "Control loop running every {}s over inventory {:?}. Press Ctrl-C to stop.",
        config.control_loop_period.as_secs(),
        context.db_path()
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    crate::log_stderr!("Shutdown signal received");

    control.stop().await;
    context.emit_line("Control loop stopped.");
    Ok(())
}

/// Runs a standalone device simulator until interrupted.
pub(crate) async fn handle_simulate(listen: Option<String>, context: &AppContext) -> Result<()> {
    let addr = listen.unwrap_or_else(|| DEFAULT_SIMULATOR_LISTEN.to_string());
    let sim = DeviceSimulator::bind(&addr).await?;
    context.emit_line(&format!(
        "Device simulator listening on {}. Press Ctrl-C to stop.",
        sim.local_addr()
    ));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    sim.shutdown().await;
    context.emit_line("Device simulator stopped.");
    Ok(())
}

pub(crate) async fn handle_devices(context: &AppContext) -> Result<()> {
    let service = open_service(context)?;
    let devices = service.list_devices()?;
    if devices.is_empty() {
        context.emit_line("No network devices onboarded.");
        return Ok(());
    }
    context.emit_line(&serde_json::to_string_pretty(&devices)?);
    Ok(())
}

pub(crate) async fn handle_add_device(
    vendor: Vendor,
    model: &str,
    endpoints: &[EndpointSpec],
    context: &AppContext,
) -> Result<()> {
    let service = open_service(context)?;
    let device = service.add_device(vendor, model, endpoints)?;
    context.emit_line(&format!("Added network device ({})", device.id));
    context.emit_line(&serde_json::to_string_pretty(&device)?);
    Ok(())
}

pub(crate) async fn handle_add_endpoints(
    id: &str,
    endpoints: &[EndpointSpec],
    context: &AppContext,
) -> Result<()> {
    let service = open_service(context)?;
    let device = service.add_endpoints(id, endpoints)?;
    context.emit_line(&format!(
        "Network device ({}) now has {} endpoint(s)",
        device.id,
        device.endpoints.len()
    ));
    context.emit_line(&serde_json::to_string_pretty(&device)?);
    Ok(())
}

pub(crate) async fn handle_delete_device(id: &str, context: &AppContext) -> Result<()> {
    let service = open_service(context)?;
    service.delete_device(id)?;
    context.emit_line(&format!("Deleted network device ({})", id));
    Ok(())
}

pub(crate) async fn handle_status(id: &str, context: &AppContext) -> Result<()> {
    let service = open_service(context)?;
    let status = service.get_device_status(id)?;
    context.emit_line(&serde_json::to_string_pretty(&status)?);
    Ok(())
}

pub(crate) async fn handle_summary(context: &AppContext) -> Result<()> {
    let service = open_service(context)?;
    let summary = service.summary()?;
    context.emit_line(&serde_json::to_string_pretty(&summary)?);
    Ok(())
}
