//! Device simulator used to develop and test protocol adapters
//!
//! See [`server::DeviceSimulator`] for the TCP server and
//! [`wire`] for the request/response format adapters speak.

mod server;
pub mod wire;

pub use server::{DeviceSimulator, SimProfile, SimStatus};
