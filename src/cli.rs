use anyhow::Result;

use crate::models::{EndpointSpec, Protocol, Vendor};

#[derive(Debug, PartialEq)]
pub enum CliCommand {
    Run,
    Simulate {
        listen: Option<String>,
    },
    Devices,
    AddDevice {
        vendor: Vendor,
        model: String,
        endpoints: Vec<EndpointSpec>,
    },
    AddEndpoints {
        id: String,
        endpoints: Vec<EndpointSpec>,
    },
    DeleteDevice {
        id: String,
    },
    Status {
        id: String,
    },
    Summary,
    Help,
    Version,
}

pub fn version_text() -> String {
    format!("netpulse {}", env!("CARGO_PKG_VERSION"))
}

pub fn usage_text() -> String {
    format!(
        "{version}
NetPulse — Network Device Monitoring Controller

Usage:
  netpulse run
  netpulse simulate [--listen <ADDR>]
  netpulse devices
  netpulse add-device --vendor <VENDOR> --model <MODEL> [--endpoint <HOST:PORT:PROTOCOL>]...
  netpulse add-endpoints <ID> --endpoint <HOST:PORT:PROTOCOL>...
  netpulse delete-device <ID>
  netpulse status <ID>
  netpulse summary
  netpulse --help
  netpulse --version

Options:
      --listen <ADDR>       Simulator listen address (default: 127.0.0.1:50151)
      --vendor <VENDOR>     Device vendor: ubiquiti, cisco, juniper
      --model <MODEL>       Device model string
      --endpoint <SPEC>     Endpoint as HOST:PORT:PROTOCOL, repeatable.
                            Protocols: snmp, netconf, restconf, ovsdb
  -h, --help                Show this help text
  -V, --version             Show version

Environment:
  CONTROL_LOOP_PERIOD       Polling period in seconds (default: 30)
  NETPULSE_DB_PATH          Inventory database location
  CHECKSUM_GENERATOR_BIN    External checksum generator binary",
        version = version_text()
    )
}

fn parse_vendor_arg(raw: &str) -> Result<Vendor> {
    match raw.to_ascii_lowercase().as_str() {
        "ubiquiti" | "vendor_ubiquiti" => Ok(Vendor::Ubiquiti),
        "cisco" | "vendor_cisco" => Ok(Vendor::Cisco),
        "juniper" | "vendor_juniper" => Ok(Vendor::Juniper),
        "unspecified" | "vendor_unspecified" => Ok(Vendor::Unspecified),
        _ => Err(anyhow::anyhow!(
            "Unknown vendor '{}'. Expected ubiquiti, cisco, or juniper.\n\n{}",
            raw,
            usage_text()
        )),
    }
}

fn parse_protocol_arg(raw: &str) -> Result<Protocol> {
    match raw.to_ascii_lowercase().as_str() {
        "snmp" | "protocol_snmp" => Ok(Protocol::Snmp),
        "netconf" | "protocol_netconf" => Ok(Protocol::Netconf),
        "restconf" | "protocol_restconf" => Ok(Protocol::Restconf),
        "ovsdb" | "open-v-switch" | "protocol_open_v_switch" => Ok(Protocol::OpenVSwitch),
        "unspecified" | "protocol_unspecified" => Ok(Protocol::Unspecified),
        _ => Err(anyhow::anyhow!(
            "Unknown protocol '{}'. Expected snmp, netconf, restconf, or ovsdb.\n\n{}",
            raw,
            usage_text()
        )),
    }
}

fn parse_endpoint_arg(raw: &str) -> Result<EndpointSpec> {
    // split from the right so hosts containing ':' still parse
    let mut parts = raw.rsplitn(3, ':');
    let protocol = parts.next().unwrap_or_default();
    let port = parts.next().unwrap_or_default();
    let host = parts.next().unwrap_or_default();

    if host.is_empty() || port.is_empty() || protocol.is_empty() {
        return Err(anyhow::anyhow!(
            "Invalid endpoint '{}'. Expected HOST:PORT:PROTOCOL.\n\n{}",
            raw,
            usage_text()
        ));
    }

    Ok(EndpointSpec {
        host: host.to_string(),
        port: port.to_string(),
        protocol: parse_protocol_arg(protocol)?,
    })
}

pub fn parse_cli_args<I, S>(args: I) -> Result<CliCommand>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    let _program_name = iter.next();

    let mut command: Option<String> = None;
    let mut positional: Option<String> = None;
    let mut listen: Option<String> = None;
    let mut vendor: Option<String> = None;
    let mut model: Option<String> = None;
    let mut endpoints: Vec<String> = Vec::new();

    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        match arg {
            "-h" | "--help" => return Ok(CliCommand::Help),
            "-V" | "--version" => return Ok(CliCommand::Version),
            "run" | "simulate" | "devices" | "add-device" | "add-endpoints" | "delete-device"
            | "status" | "summary" => {
                if command.as_deref().is_some_and(|existing| existing != arg) {
                    return Err(anyhow::anyhow!(
                        "Multiple commands provided. Use only one command.\n\n{}",
                        usage_text()
                    ));
                }
                command = Some(arg.to_string());
            }
            "--listen" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --listen.\n\n{}", usage_text())
                })?;
                listen = Some(value.as_ref().to_string());
            }
            "--vendor" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --vendor.\n\n{}", usage_text())
                })?;
                vendor = Some(value.as_ref().to_string());
            }
            "--model" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --model.\n\n{}", usage_text())
                })?;
                model = Some(value.as_ref().to_string());
            }
            "--endpoint" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("Missing value for --endpoint.\n\n{}", usage_text())
                })?;
                endpoints.push(value.as_ref().to_string());
            }
            _ if arg.starts_with("--listen=") => {
                let value = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
                if value.is_empty() {
                    return Err(anyhow::anyhow!(
                        "Missing value for --listen.\n\n{}",
                        usage_text()
                    ));
                }
                listen = Some(value.to_string());
            }
            _ if arg.starts_with("--vendor=") => {
                let value = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
                if value.is_empty() {
                    return Err(anyhow::anyhow!(
                        "Missing value for --vendor.\n\n{}",
                        usage_text()
                    ));
                }
                vendor = Some(value.to_string());
            }
            _ if arg.starts_with("--model=") => {
                let value = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
                if value.is_empty() {
                    return Err(anyhow::anyhow!(
                        "Missing value for --model.\n\n{}",
                        usage_text()
                    ));
                }
                model = Some(value.to_string());
            }
            _ if arg.starts_with("--endpoint=") => {
                let value = arg.split_once('=').map(|(_, v)| v).unwrap_or_default();
                if value.is_empty() {
                    return Err(anyhow::anyhow!(
                        "Missing value for --endpoint.\n\n{}",
                        usage_text()
                    ));
                }
                endpoints.push(value.to_string());
            }
            _ if arg.starts_with('-') => {
                return Err(anyhow::anyhow!(
                    "Unknown argument: {arg}\n\n{}",
                    usage_text()
                ));
            }
            _ => {
                if positional.is_some() {
                    return Err(anyhow::anyhow!(
                        "Unexpected argument: {arg}\n\n{}",
                        usage_text()
                    ));
                }
                positional = Some(arg.to_string());
            }
        }
    }

    let reject_device_flags = |cmd: &str| -> Result<()> {
        if vendor.is_some() || model.is_some() {
            return Err(anyhow::anyhow!(
                "--vendor/--model are only valid with add-device, not {cmd}.\n\n{}",
                usage_text()
            ));
        }
        Ok(())
    };
    let reject_endpoint_flags = |cmd: &str| -> Result<()> {
        if !endpoints.is_empty() {
            return Err(anyhow::anyhow!(
                "--endpoint is only valid with add-device or add-endpoints, not {cmd}.\n\n{}",
                usage_text()
            ));
        }
        Ok(())
    };

    match command.as_deref() {
        None => {
            if positional.is_some() || listen.is_some() {
                return Err(anyhow::anyhow!("No command provided.\n\n{}", usage_text()));
            }
            reject_device_flags("bare invocation")?;
            reject_endpoint_flags("bare invocation")?;
            Ok(CliCommand::Help)
        }
        Some("run") => {
            reject_device_flags("run")?;
            reject_endpoint_flags("run")?;
            Ok(CliCommand::Run)
        }
        Some("simulate") => {
            reject_device_flags("simulate")?;
            reject_endpoint_flags("simulate")?;
            Ok(CliCommand::Simulate { listen })
        }
        Some("devices") => {
            reject_device_flags("devices")?;
            reject_endpoint_flags("devices")?;
            Ok(CliCommand::Devices)
        }
        Some("summary") => {
            reject_device_flags("summary")?;
            reject_endpoint_flags("summary")?;
            Ok(CliCommand::Summary)
        }
        Some("add-device") => {
            let vendor = parse_vendor_arg(&vendor.ok_or_else(|| {
                anyhow::anyhow!("add-device requires --vendor.\n\n{}", usage_text())
            })?)?;
            let model = model.ok_or_else(|| {
                anyhow::anyhow!("add-device requires --model.\n\n{}", usage_text())
            })?;
            let endpoints = endpoints
                .iter()
                .map(|raw| parse_endpoint_arg(raw))
                .collect::<Result<Vec<_>>>()?;
            Ok(CliCommand::AddDevice {
                vendor,
                model,
                endpoints,
            })
        }
        Some("add-endpoints") => {
            reject_device_flags("add-endpoints")?;
            let id = positional.ok_or_else(|| {
                anyhow::anyhow!("add-endpoints requires a device id.\n\n{}", usage_text())
            })?;
            if endpoints.is_empty() {
                return Err(anyhow::anyhow!(
                    "add-endpoints requires at least one --endpoint.\n\n{}",
                    usage_text()
                ));
            }
            let endpoints = endpoints
                .iter()
                .map(|raw| parse_endpoint_arg(raw))
                .collect::<Result<Vec<_>>>()?;
            Ok(CliCommand::AddEndpoints { id, endpoints })
        }
        Some("delete-device") => {
            reject_device_flags("delete-device")?;
            reject_endpoint_flags("delete-device")?;
            let id = positional.ok_or_else(|| {
                anyhow::anyhow!("delete-device requires a device id.\n\n{}", usage_text())
            })?;
            Ok(CliCommand::DeleteDevice { id })
        }
        Some("status") => {
            reject_device_flags("status")?;
            reject_endpoint_flags("status")?;
            let id = positional.ok_or_else(|| {
                anyhow::anyhow!("status requires a device id.\n\n{}", usage_text())
            })?;
            Ok(CliCommand::Status { id })
        }
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_help_flag() {
        let parsed = parse_cli_args(["netpulse", "--help"]).expect("help args should parse");
        assert_eq!(parsed, CliCommand::Help);
    }

    #[test]
    fn parse_version_flag() {
        let parsed = parse_cli_args(["netpulse", "-V"]).expect("version args should parse");
        assert_eq!(parsed, CliCommand::Version);
    }

    #[test]
    fn bare_invocation_shows_help() {
        let parsed = parse_cli_args(["netpulse"]).expect("bare invocation should parse");
        assert_eq!(parsed, CliCommand::Help);
    }

    #[test]
    fn parse_run_command() {
        let parsed = parse_cli_args(["netpulse", "run"]).expect("run should parse");
        assert_eq!(parsed, CliCommand::Run);
    }

    #[test]
    fn parse_simulate_with_listen_flag() {
        let parsed = parse_cli_args(["netpulse", "simulate", "--listen", "127.0.0.1:6000"])
            .expect("simulate should parse");
        assert_eq!(
            parsed,
            CliCommand::Simulate {
                listen: Some("127.0.0.1:6000".to_string())
            }
        );

        let parsed = parse_cli_args(["netpulse", "simulate", "--listen=127.0.0.1:6001"])
            .expect("simulate with = form should parse");
        assert_eq!(
            parsed,
            CliCommand::Simulate {
                listen: Some("127.0.0.1:6001".to_string())
            }
        );
    }

    #[test]
    fn parse_add_device_with_endpoints() {
        let parsed = parse_cli_args([
            "netpulse",
            "add-device",
            "--vendor",
            "ubiquiti",
            "--model",
            "EdgeRouter-X",
            "--endpoint",
            "192.168.0.1:830:netconf",
            "--endpoint",
            "192.168.0.1:161:snmp",
        ])
        .expect("add-device should parse");

        match parsed {
            CliCommand::AddDevice {
                vendor,
                model,
                endpoints,
            } => {
                assert_eq!(vendor, Vendor::Ubiquiti);
                assert_eq!(model, "EdgeRouter-X");
                assert_eq!(endpoints.len(), 2);
                assert_eq!(endpoints[0].protocol, Protocol::Netconf);
                assert_eq!(endpoints[1].port, "161");
            }
            other => panic!("expected AddDevice, got {:?}", other),
        }
    }

    #[test]
    fn add_device_accepts_zero_endpoints() {
        let parsed = parse_cli_args([
            "netpulse",
            "add-device",
            "--vendor",
            "cisco",
            "--model",
            "Catalyst-9300",
        ])
        .expect("add-device without endpoints should parse");
        match parsed {
            CliCommand::AddDevice { endpoints, .. } => assert!(endpoints.is_empty()),
            other => panic!("expected AddDevice, got {:?}", other),
        }
    }

    #[test]
    fn add_device_requires_vendor_and_model() {
        let err = parse_cli_args(["netpulse", "add-device", "--model", "XYZ"])
            .expect_err("missing vendor should fail");
        assert!(err.to_string().contains("--vendor"));

        let err = parse_cli_args(["netpulse", "add-device", "--vendor", "cisco"])
            .expect_err("missing model should fail");
        assert!(err.to_string().contains("--model"));
    }

    #[test]
    fn parse_add_endpoints_with_id_and_endpoints() {
        let parsed = parse_cli_args([
            "netpulse",
            "add-endpoints",
            "netdev-1234",
            "--endpoint",
            "192.168.0.9:443:restconf",
        ])
        .expect("add-endpoints should parse");

        match parsed {
            CliCommand::AddEndpoints { id, endpoints } => {
                assert_eq!(id, "netdev-1234");
                assert_eq!(endpoints.len(), 1);
                assert_eq!(endpoints[0].protocol, Protocol::Restconf);
            }
            other => panic!("expected AddEndpoints, got {:?}", other),
        }
    }

    #[test]
    fn add_endpoints_requires_id_and_at_least_one_endpoint() {
        let err = parse_cli_args(["netpulse", "add-endpoints", "--endpoint", "h:1:snmp"])
            .expect_err("missing id should fail");
        assert!(err.to_string().contains("device id"));

        let err = parse_cli_args(["netpulse", "add-endpoints", "netdev-1234"])
            .expect_err("missing endpoints should fail");
        assert!(err.to_string().contains("at least one --endpoint"));
    }

    #[test]
    fn endpoint_flag_rejected_outside_endpoint_commands() {
        let err = parse_cli_args(["netpulse", "summary", "--endpoint", "h:1:snmp"])
            .expect_err("summary should reject --endpoint");
        assert!(
            err.to_string()
                .contains("only valid with add-device or add-endpoints")
        );
    }

    #[test]
    fn parse_delete_device_with_id() {
        let parsed = parse_cli_args(["netpulse", "delete-device", "netdev-1234"])
            .expect("delete-device should parse");
        assert_eq!(
            parsed,
            CliCommand::DeleteDevice {
                id: "netdev-1234".to_string()
            }
        );
    }

    #[test]
    fn status_requires_an_id() {
        let err = parse_cli_args(["netpulse", "status"]).expect_err("missing id should fail");
        assert!(err.to_string().contains("device id"));
    }

    #[test]
    fn endpoint_spec_requires_three_fields() {
        let err = parse_cli_args([
            "netpulse",
            "add-device",
            "--vendor",
            "cisco",
            "--model",
            "XYZ",
            "--endpoint",
            "192.168.0.1:830",
        ])
        .expect_err("two-field endpoint should fail");
        assert!(err.to_string().contains("HOST:PORT:PROTOCOL"));
    }

    #[test]
    fn endpoint_protocol_accepts_wire_spelling() {
        let spec = parse_endpoint_arg("10.0.0.1:6640:PROTOCOL_OPEN_V_SWITCH").unwrap();
        assert_eq!(spec.protocol, Protocol::OpenVSwitch);
        let spec = parse_endpoint_arg("10.0.0.1:6640:ovsdb").unwrap();
        assert_eq!(spec.protocol, Protocol::OpenVSwitch);
    }

    #[test]
    fn device_flags_rejected_outside_add_device() {
        let err = parse_cli_args(["netpulse", "summary", "--model", "XYZ"])
            .expect_err("summary should reject device flags");
        assert!(err.to_string().contains("only valid with add-device"));
    }

    #[test]
    fn parse_unknown_argument_errors() {
        let err = parse_cli_args(["netpulse", "--unknown"]).expect_err("unknown flag should fail");
        assert!(err.to_string().contains("Unknown argument"));
    }
}
