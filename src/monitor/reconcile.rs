//! Per-device reconciliation
//!
//! One reconciler runs per device per tick: pick the first responsive
//! endpoint, read status and versions, verify version checksums, and
//! publish the result back to the inventory. A device seen UP is not
//! flipped to DOWN on the first missed probe; see [`resolve_status`].

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::adapters;
use crate::checksum::ChecksumGenerator;
use crate::config::FAILURE_THRESHOLD;
use crate::models::{Device, DeviceState, DeviceStatus, VersionInfo};
use crate::store::{InventoryStore, StoreError};

/// Raw result of walking a device's endpoints once.
#[derive(Debug)]
struct ProbeOutcome {
    alive: bool,
    state: DeviceState,
    hw: String,
    sw: Option<VersionInfo>,
    fw: Option<VersionInfo>,
}

impl Default for ProbeOutcome {
    fn default() -> Self {
        Self {
            alive: false,
            state: DeviceState::Down,
            hw: String::new(),
            sw: None,
            fw: None,
        }
    }
}

/// What gets published to the status row after hysteresis.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct StatusResolution {
    pub(crate) state: DeviceState,
    pub(crate) last_seen: String,
    pub(crate) consecutive_failures: u32,
}

/// Probes one device and writes the observation back to the store.
///
/// Store failures are logged and swallowed: one device must not abort
/// the rest of the tick. Cancelling `ctx` drops outstanding writes.
pub async fn reconcile_device(
    ctx: CancellationToken,
    device: Device,
    store: Arc<dyn InventoryStore>,
    verifier: Arc<dyn ChecksumGenerator>,
) {
    crate::log_debug!("Processing network device ({})", device.id);

    let outcome = probe_endpoints(&ctx, &device).await;

    let prev = match store.get_device_status(&device.id) {
        Ok(status) => Some(status),
        Err(StoreError::NotFound(_)) => None,
        Err(e) => {
            crate::log_error!(
                "Failed to read previous status for network device ({}): {}",
                device.id,
                e
            );
            None
        }
    };

    let now = Utc::now().to_rfc3339();
    let resolution = resolve_status(prev.as_ref(), outcome.alive, outcome.state, now);

    if ctx.is_cancelled() {
        crate::log_debug!(
            "Reconciliation of network device ({}) cancelled, dropping writes",
            device.id
        );
        return;
    }
    if let Err(e) = store.update_device_status_by_device_id(
        &device.id,
        resolution.state,
        &resolution.last_seen,
        resolution.consecutive_failures,
    ) {
        crate::log_error!(
            "Failed to update status for network device ({}): {}",
            device.id,
            e
        );
    }

    // versions with a checksum the verifier cannot reproduce are
    // treated as never observed
    let sw = verify_version(verifier.as_ref(), outcome.sw).await;
    let fw = verify_version(verifier.as_ref(), outcome.fw).await;

    if ctx.is_cancelled() {
        crate::log_debug!(
            "Reconciliation of network device ({}) cancelled, dropping version writes",
            device.id
        );
        return;
    }
    if let Err(e) =
        store.update_device_versions(&device.id, &outcome.hw, sw.as_ref(), fw.as_ref())
    {
        crate::log_error!(
            "Failed to update versions for network device ({}): {}",
            device.id,
            e
        );
    }
}

/// Walks endpoints in insertion order until one answers the status
/// probe, then reads versions from that same endpoint.
async fn probe_endpoints(ctx: &CancellationToken, device: &Device) -> ProbeOutcome {
    let mut outcome = ProbeOutcome::default();

    for endpoint in &device.endpoints {
        let adapter = match adapters::for_endpoint(endpoint) {
            Ok(adapter) => adapter,
            // unsupported protocol, already logged by the factory
            Err(_) => continue,
        };

        let state = match adapter.get_status(ctx).await {
            Ok(state) => state,
            Err(e) => {
                crate::log_debug!(
                    "Endpoint {}:{} not responsive, trying the next one: {}",
                    endpoint.host,
                    endpoint.port,
                    e
                );
                continue;
            }
        };

        outcome.alive = true;
        outcome.state = state;

        // individual version failures are non-fatal and leave that
        // particular value unobserved
        if let Ok(hw) = adapter.get_hw_version(ctx).await {
            outcome.hw = hw;
        }
        if let Ok(sw) = adapter.get_sw_version(ctx).await {
            outcome.sw = Some(sw);
        }
        if let Ok(fw) = adapter.get_fw_version(ctx).await {
            outcome.fw = Some(fw);
        }

        // no need to sniff the remaining endpoints
        break;
    }

    outcome
}

/// Applies the consecutive-failure rule to one probe outcome.
///
/// An alive probe (UNHEALTHY included) resets the failure counter. A
/// missed probe increments it; while the count stays below
/// `FAILURE_THRESHOLD` and the device was last published UP, the
/// previous UP observation is retained so a transient glitch does not
/// flip a healthy device to DOWN.
pub(crate) fn resolve_status(
    prev: Option<&DeviceStatus>,
    alive: bool,
    observed: DeviceState,
    now: String,
) -> StatusResolution {
    if alive {
        return StatusResolution {
            state: observed,
            last_seen: now,
            consecutive_failures: 0,
        };
    }

    let (prev_state, prev_last_seen, prev_failures) = match prev {
        Some(status) => (
            status.state,
            status.last_seen.clone(),
            status.consecutive_failures,
        ),
        None => (DeviceState::Unspecified, String::new(), 0),
    };

    let failures = prev_failures.saturating_add(1);
    if failures < FAILURE_THRESHOLD && prev_state == DeviceState::Up {
        StatusResolution {
            state: DeviceState::Up,
            last_seen: prev_last_seen,
            consecutive_failures: failures,
        }
    } else {
        StatusResolution {
            state: DeviceState::Down,
            last_seen: String::new(),
            consecutive_failures: failures,
        }
    }
}

/// Re-computes the checksum over a reported version and discards the
/// version when the device's claim cannot be reproduced.
async fn verify_version(
    verifier: &dyn ChecksumGenerator,
    observed: Option<VersionInfo>,
) -> Option<VersionInfo> {
    let info = observed?;
    match verifier.compute(info.value.as_bytes()).await {
        Ok(computed) if computed == info.checksum => Some(info),
        Ok(computed) => {
            crate::log_error!(
                "Checksum verification failed for version '{}': computed {} but device reported {}",
                info.value,
                computed,
                info.checksum
            );
            None
        }
        Err(e) => {
            crate::log_error!(
                "Checksum generation failed for version '{}': {:#}",
                info.value,
                e
            );
            None
        }
    }
}
