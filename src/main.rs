//! NetPulse — Network Device Monitoring Controller
//!
//! Southbound control loop plus operator CLI:
//! - periodic liveness and version polling over SNMP / NETCONF /
//!   RESTCONF / OVSDB endpoints
//! - consecutive-failure hysteresis before a device is published DOWN
//! - checksum verification of reported versions
//! - SQLite-backed device inventory

#[tokio::main]
async fn main() {
    if let Err(e) = netpulse::logging::init_logging() {
        eprintln!("[WARN] Failed to initialize structured logging: {}", e);
    }

    match netpulse::app::run(std::env::args()).await {
        Ok(()) => {}
        Err(e) => {
            netpulse::log_error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
