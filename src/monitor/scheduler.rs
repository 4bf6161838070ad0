//! Control loop scheduler
//!
//! Periodically fans one reconciler task out per device. Ticks never
//! overlap: a tick is awaited in full before the interval timer is
//! polled again, so a slow tick delays the next one instead of
//! stacking on top of it. Each tick carries a cancellation token with
//! a deadline equal to the period; reconcilers still running at the
//! deadline are cancelled and their pending writes dropped.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;

use super::reconcile::reconcile_device;
use crate::checksum::ChecksumGenerator;
use crate::config::DEFAULT_CONTROL_LOOP_PERIOD;
use crate::store::InventoryStore;

/// Scheduler lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Immutable scheduler configuration.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Tick period; also the per-tick deadline.
    pub period: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_CONTROL_LOOP_PERIOD,
        }
    }
}

/// The southbound control loop.
pub struct ControlLoop {
    store: Arc<dyn InventoryStore>,
    verifier: Arc<dyn ChecksumGenerator>,
    config: LoopConfig,
    state: Arc<Mutex<LoopState>>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ControlLoop {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        verifier: Arc<dyn ChecksumGenerator>,
        config: LoopConfig,
    ) -> Self {
        Self {
            store,
            verifier,
            config,
            state: Arc::new(Mutex::new(LoopState::Idle)),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> LoopState {
        *self.state.lock().expect("control loop state lock poisoned")
    }

    /// Starts periodic execution. Valid only from `Idle`; the first
    /// tick runs immediately.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock().expect("control loop state lock poisoned");
            if *state != LoopState::Idle {
                bail!("control loop can only be started while idle (currently {state:?})");
            }
            *state = LoopState::Running;
        }

        crate::log_stderr!(
            "Starting periodical ({}s) execution of main control loop",
            self.config.period.as_secs()
        );

        let store = Arc::clone(&self.store);
        let verifier = Arc::clone(&self.verifier);
        let period = self.config.period;
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        crate::log_debug!("Stopping main control loop");
                        break;
                    }
                    _ = ticker.tick() => {
                        run_tick(&store, &verifier, period, &cancel).await;
                    }
                }
            }
        });

        *self.handle.lock().expect("control loop handle lock poisoned") = Some(handle);
        Ok(())
    }

    /// Stops the loop: cancels the current tick's context and waits
    /// for in-flight reconcilers to finish. Idempotent.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().expect("control loop state lock poisoned");
            match *state {
                LoopState::Running => *state = LoopState::Stopping,
                LoopState::Stopping | LoopState::Stopped => return,
                LoopState::Idle => {
                    *state = LoopState::Stopped;
                    return;
                }
            }
        }

        crate::log_stderr!("Stopping control loop...");
        self.cancel.cancel();

        let handle = self
            .handle
            .lock()
            .expect("control loop handle lock poisoned")
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                crate::log_warn!("Control loop task ended abnormally: {}", e);
            }
        }

        *self.state.lock().expect("control loop state lock poisoned") = LoopState::Stopped;
        crate::log_stderr!("Control loop stopped");
    }

    /// Executes exactly one tick with the configured deadline. Used by
    /// the tests to drive reconciliation deterministically.
    pub async fn run_once(&self) {
        run_tick(&self.store, &self.verifier, self.config.period, &self.cancel).await;
    }
}

/// One scheduler tick: list devices, fan a reconciler out per device,
/// wait for all of them or the deadline, whichever comes first.
async fn run_tick(
    store: &Arc<dyn InventoryStore>,
    verifier: &Arc<dyn ChecksumGenerator>,
    period: Duration,
    parent: &CancellationToken,
) {
    crate::log_debug!("Executing main control loop routine");
    let tick = parent.child_token();

    let devices = match store.list_devices() {
        Ok(devices) => devices,
        Err(e) => {
            crate::log_error!("Failed to list network devices: {}", e);
            return;
        }
    };
    if devices.is_empty() {
        crate::log_warn!("No network devices found in the inventory");
        return;
    }

    let mut tasks: JoinSet<()> = JoinSet::new();
    for device in devices {
        tasks.spawn(reconcile_device(
            tick.child_token(),
            device,
            Arc::clone(store),
            Arc::clone(verifier),
        ));
    }

    if timeout(period, drain(&mut tasks)).await.is_err() {
        crate::log_warn!(
            "Tick deadline of {}s exceeded, cancelling in-flight reconcilers",
            period.as_secs()
        );
        tick.cancel();
        // reconcilers return promptly on cancellation; no task may
        // outlive its tick
        drain(&mut tasks).await;
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            crate::log_warn!("Reconciler task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Sha256Generator;
    use crate::store::SqliteStore;

    fn control_loop() -> ControlLoop {
        let store: Arc<dyn InventoryStore> = Arc::new(SqliteStore::in_memory().unwrap());
        let verifier: Arc<dyn ChecksumGenerator> = Arc::new(Sha256Generator);
        ControlLoop::new(
            store,
            verifier,
            LoopConfig {
                period: Duration::from_millis(250),
            },
        )
    }

    #[tokio::test]
    async fn starts_only_from_idle() {
        let control = control_loop();
        assert_eq!(control.state(), LoopState::Idle);

        control.start().expect("first start should succeed");
        assert_eq!(control.state(), LoopState::Running);
        assert!(control.start().is_err(), "second start must be rejected");

        control.stop().await;
        assert_eq!(control.state(), LoopState::Stopped);
        assert!(control.start().is_err(), "restart after stop must be rejected");
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let control = control_loop();
        control.start().unwrap();
        control.stop().await;
        control.stop().await;
        assert_eq!(control.state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn stop_without_start_settles_in_stopped() {
        let control = control_loop();
        control.stop().await;
        assert_eq!(control.state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn empty_inventory_tick_makes_no_writes() {
        let store = SqliteStore::in_memory().unwrap();
        let shared: Arc<dyn InventoryStore> = Arc::new(store.clone());
        let control = ControlLoop::new(
            shared,
            Arc::new(Sha256Generator),
            LoopConfig {
                period: Duration::from_millis(250),
            },
        );

        control.run_once().await;

        assert!(store.list_device_statuses().unwrap().is_empty());
    }
}
