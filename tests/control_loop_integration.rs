//! End-to-end control loop behavior against live device simulators.
//!
//! Every test drives ticks explicitly through `ControlLoop::run_once`
//! so the assertions are deterministic: a tick only returns once all
//! of its reconcilers have finished.

use std::sync::Arc;
use std::time::Duration;

use netpulse::{
    ControlLoop, DeviceService, DeviceSimulator, DeviceState, EndpointSpec, InventoryStore,
    LoopConfig, MonitoringSummary, Protocol, Sha256Generator, SimProfile, SimStatus, SqliteStore,
    StoreError, Vendor,
};

const TEST_PERIOD: Duration = Duration::from_millis(500);

struct Harness {
    store: Arc<SqliteStore>,
    service: DeviceService,
    control: ControlLoop,
}

fn harness() -> Harness {
    let store = Arc::new(SqliteStore::in_memory().expect("in-memory store should initialize"));
    let shared: Arc<dyn InventoryStore> = store.clone();
    Harness {
        service: DeviceService::new(Arc::clone(&shared)),
        control: ControlLoop::new(
            shared,
            Arc::new(Sha256Generator),
            LoopConfig {
                period: TEST_PERIOD,
            },
        ),
        store,
    }
}

async fn spawn_simulator() -> DeviceSimulator {
    DeviceSimulator::bind_with_profile("127.0.0.1:0", SimProfile::new())
        .await
        .expect("simulator should bind an ephemeral port")
}

fn endpoint_for(sim: &DeviceSimulator, protocol: Protocol) -> EndpointSpec {
    EndpointSpec {
        host: "127.0.0.1".to_string(),
        port: sim.port(),
        protocol,
    }
}

/// Port of the original monitoring lifecycle: onboard four devices on
/// four protocols, watch them come UP, then watch the hysteresis walk
/// them DOWN after three consecutive missed probes.
#[tokio::test]
async fn full_monitoring_lifecycle() {
    let h = harness();

    let sims = [
        spawn_simulator().await,
        spawn_simulator().await,
        spawn_simulator().await,
        spawn_simulator().await,
    ];

    // an empty inventory tick is a no-op
    h.control.run_once().await;
    assert!(h.service.list_statuses().unwrap().is_empty());
    assert_eq!(h.service.summary().unwrap(), MonitoringSummary::default());

    let d1 = h
        .service
        .add_device(
            Vendor::Ubiquiti,
            "XYZ",
            &[endpoint_for(&sims[0], Protocol::Netconf)],
        )
        .unwrap();
    let d2 = h
        .service
        .add_device(
            Vendor::Ubiquiti,
            "XYZ-nextgen",
            &[endpoint_for(&sims[1], Protocol::Restconf)],
        )
        .unwrap();
    let d3 = h
        .service
        .add_device(
            Vendor::Cisco,
            "xyz",
            &[endpoint_for(&sims[2], Protocol::Snmp)],
        )
        .unwrap();
    let d4 = h
        .service
        .add_device(
            Vendor::Juniper,
            "Zyx",
            &[endpoint_for(&sims[3], Protocol::OpenVSwitch)],
        )
        .unwrap();
    let device_ids = [&d1.id, &d2.id, &d3.id, &d4.id];

    assert_eq!(h.service.list_devices().unwrap().len(), 4);

    // no status exists before the first reconciliation
    for id in device_ids {
        assert!(matches!(
            h.service.get_device_status(id),
            Err(StoreError::NotFound(_))
        ));
    }

    // tick 1: everything is healthy
    h.control.run_once().await;
    for id in device_ids {
        let status = h.service.get_device_status(id).unwrap();
        assert_eq!(status.state, DeviceState::Up);
        assert_eq!(status.consecutive_failures, 0);
        assert!(!status.last_seen.is_empty());
    }
    assert_eq!(
        h.service.summary().unwrap(),
        MonitoringSummary {
            total: 4,
            up: 4,
            unhealthy: 0,
            down: 0,
        }
    );

    // all simulated devices stop answering their status probe
    for sim in &sims {
        sim.profile().set_status(SimStatus::Down);
    }

    // ticks 2 and 3: the devices stay published UP while the failure
    // counter climbs
    h.control.run_once().await;
    for id in device_ids {
        let status = h.service.get_device_status(id).unwrap();
        assert_eq!(status.state, DeviceState::Up);
        assert_eq!(status.consecutive_failures, 1);
        assert!(!status.last_seen.is_empty());
    }

    h.control.run_once().await;
    for id in device_ids {
        let status = h.service.get_device_status(id).unwrap();
        assert_eq!(status.state, DeviceState::Up);
        assert_eq!(status.consecutive_failures, 2);
    }

    // tick 4: the third consecutive miss crosses the threshold
    h.control.run_once().await;
    for id in device_ids {
        let status = h.service.get_device_status(id).unwrap();
        assert_eq!(status.state, DeviceState::Down);
        assert_eq!(status.consecutive_failures, 3);
        assert_eq!(status.last_seen, "");
    }
    assert_eq!(
        h.service.summary().unwrap(),
        MonitoringSummary {
            total: 4,
            up: 0,
            unhealthy: 0,
            down: 4,
        }
    );

    // tearing the inventory down removes the statuses with it
    for id in device_ids {
        h.service.delete_device(id).unwrap();
    }
    assert!(h.service.list_devices().unwrap().is_empty());
    assert!(h.service.list_statuses().unwrap().is_empty());

    for sim in sims {
        sim.shutdown().await;
    }
}

#[tokio::test]
async fn recovery_resets_the_failure_counter() {
    let h = harness();
    let sim = spawn_simulator().await;
    let device = h
        .service
        .add_device(
            Vendor::Cisco,
            "Catalyst-9300",
            &[endpoint_for(&sim, Protocol::Netconf)],
        )
        .unwrap();

    h.control.run_once().await;
    sim.profile().set_status(SimStatus::Down);
    h.control.run_once().await;
    h.control.run_once().await;

    let degraded = h.service.get_device_status(&device.id).unwrap();
    assert_eq!(degraded.state, DeviceState::Up);
    assert_eq!(degraded.consecutive_failures, 2);

    // the device comes back just before the threshold would trip
    sim.profile().set_status(SimStatus::Up);
    h.control.run_once().await;

    let recovered = h.service.get_device_status(&device.id).unwrap();
    assert_eq!(recovered.state, DeviceState::Up);
    assert_eq!(recovered.consecutive_failures, 0);
    assert!(!recovered.last_seen.is_empty());

    sim.shutdown().await;
}

#[tokio::test]
async fn consecutive_ticks_are_idempotent_on_a_stable_environment() {
    let h = harness();
    let sim = spawn_simulator().await;
    let device = h
        .service
        .add_device(
            Vendor::Juniper,
            "MX204",
            &[endpoint_for(&sim, Protocol::Snmp)],
        )
        .unwrap();

    h.control.run_once().await;
    let first_status = h.service.get_device_status(&device.id).unwrap();
    let first_device = h.service.get_device(&device.id).unwrap();

    h.control.run_once().await;
    let second_status = h.service.get_device_status(&device.id).unwrap();
    let second_device = h.service.get_device(&device.id).unwrap();

    assert_eq!(first_status.state, second_status.state);
    assert_eq!(
        first_status.consecutive_failures,
        second_status.consecutive_failures
    );

    // repeated (value, checksum) observations reuse the version rows
    assert_eq!(
        first_device.sw_version.as_ref().unwrap().id,
        second_device.sw_version.as_ref().unwrap().id
    );
    assert_eq!(
        first_device.fw_version.as_ref().unwrap().id,
        second_device.fw_version.as_ref().unwrap().id
    );

    sim.shutdown().await;
}

#[tokio::test]
async fn reconciler_falls_through_to_the_first_responsive_endpoint() {
    let h = harness();

    // endpoint A answers the connection but fails the status exchange;
    // endpoint B is healthy
    let sim_a = spawn_simulator().await;
    sim_a.profile().set_status(SimStatus::Down);
    sim_a.profile().set_sw_version("a-side-1.0.0");
    let sim_b = spawn_simulator().await;
    sim_b.profile().set_sw_version("b-side-1.0.0");

    let device = h
        .service
        .add_device(
            Vendor::Ubiquiti,
            "UDM-Pro",
            &[
                endpoint_for(&sim_a, Protocol::Netconf),
                endpoint_for(&sim_b, Protocol::Netconf),
            ],
        )
        .unwrap();

    h.control.run_once().await;

    let status = h.service.get_device_status(&device.id).unwrap();
    assert_eq!(status.state, DeviceState::Up);
    assert_eq!(status.consecutive_failures, 0);

    // versions must come from the endpoint that answered
    let device = h.service.get_device(&device.id).unwrap();
    assert_eq!(device.sw_version.unwrap().value, "b-side-1.0.0");

    sim_a.shutdown().await;
    sim_b.shutdown().await;
}

#[tokio::test]
async fn unsupported_protocol_endpoints_are_silently_skipped() {
    let h = harness();
    let sim = spawn_simulator().await;

    let device = h
        .service
        .add_device(
            Vendor::Cisco,
            "Nexus-9000",
            &[
                // no adapter exists for this one
                EndpointSpec {
                    host: "127.0.0.1".to_string(),
                    port: "1".to_string(),
                    protocol: Protocol::Unspecified,
                },
                endpoint_for(&sim, Protocol::Restconf),
            ],
        )
        .unwrap();

    h.control.run_once().await;

    let status = h.service.get_device_status(&device.id).unwrap();
    assert_eq!(status.state, DeviceState::Up);

    sim.shutdown().await;
}

#[tokio::test]
async fn device_with_zero_endpoints_walks_down_through_the_threshold() {
    let h = harness();
    let device = h
        .service
        .add_device(Vendor::Juniper, "unprovisioned", &[])
        .unwrap();

    for expected_failures in 1..=3 {
        h.control.run_once().await;
        let status = h.service.get_device_status(&device.id).unwrap();
        assert_eq!(status.state, DeviceState::Down);
        assert_eq!(status.consecutive_failures, expected_failures);
        assert_eq!(status.last_seen, "");
    }

    // versions were never observed, so none were written
    let device = h.service.get_device(&device.id).unwrap();
    assert_eq!(device.hw_version, "");
    assert!(device.sw_version.is_none());
    assert!(device.fw_version.is_none());
}

#[tokio::test]
async fn unreachable_transport_reports_down_without_an_error() {
    let h = harness();

    // bind then drop a listener so the port is known to refuse
    let closed_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let device = h
        .service
        .add_device(
            Vendor::Cisco,
            "dark-device",
            &[EndpointSpec {
                host: "127.0.0.1".to_string(),
                port: closed_port.to_string(),
                protocol: Protocol::Snmp,
            }],
        )
        .unwrap();

    h.control.run_once().await;

    // a refused transport is a definitive DOWN observation, not a
    // missed probe: the failure counter does not engage
    let status = h.service.get_device_status(&device.id).unwrap();
    assert_eq!(status.state, DeviceState::Down);
    assert_eq!(status.consecutive_failures, 0);
}

#[tokio::test]
async fn unhealthy_devices_are_published_unhealthy() {
    let h = harness();
    let sim = spawn_simulator().await;
    sim.profile().set_status(SimStatus::Unhealthy);

    let device = h
        .service
        .add_device(
            Vendor::Ubiquiti,
            "USW-24",
            &[endpoint_for(&sim, Protocol::OpenVSwitch)],
        )
        .unwrap();

    h.control.run_once().await;

    let status = h.service.get_device_status(&device.id).unwrap();
    assert_eq!(status.state, DeviceState::Unhealthy);
    assert_eq!(status.consecutive_failures, 0);
    assert!(!status.last_seen.is_empty());

    let summary = h.service.summary().unwrap();
    assert_eq!(summary.unhealthy, 1);
    assert_eq!(summary.up, 0);

    sim.shutdown().await;
}

#[tokio::test]
async fn exactly_one_status_row_per_device_across_many_ticks() {
    let h = harness();
    let sim = spawn_simulator().await;
    h.service
        .add_device(
            Vendor::Ubiquiti,
            "XYZ",
            &[endpoint_for(&sim, Protocol::Netconf)],
        )
        .unwrap();

    for _ in 0..4 {
        h.control.run_once().await;
    }
    assert_eq!(h.store.list_device_statuses().unwrap().len(), 1);

    sim.shutdown().await;
}
