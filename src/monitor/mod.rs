//! Southbound control loop
//!
//! The scheduler ticks on a fixed period and fans out one reconciler
//! per device; the reconciler reads fresh data from the device and
//! writes it back to the inventory under the consecutive-failure rule.

mod reconcile;
mod scheduler;

pub use reconcile::reconcile_device;
pub use scheduler::{ControlLoop, LoopConfig, LoopState};
