use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::cli::{CliCommand, parse_cli_args, usage_text, version_text};
use crate::command_handlers::{
    handle_add_device, handle_add_endpoints, handle_delete_device, handle_devices, handle_run,
    handle_simulate, handle_status, handle_summary,
};
use crate::config;

pub type OutputHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Execution context shared by all command handlers: where the
/// inventory lives and where human-readable output goes.
#[derive(Clone)]
pub struct AppContext {
    db_path: PathBuf,
    output_hook: OutputHook,
}

impl Default for AppContext {
    fn default() -> Self {
        Self::from_env()
    }
}

impl AppContext {
    pub fn from_env() -> Self {
        let db_path = std::env::var(config::ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| config::default_db_path());
        Self {
            db_path,
            output_hook: Arc::new(|line| println!("{}", line)),
        }
    }

    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.db_path = db_path;
        self
    }

    pub fn with_output_hook(mut self, output_hook: OutputHook) -> Self {
        self.output_hook = output_hook;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn emit_line(&self, line: &str) {
        (self.output_hook)(line);
    }
}

/// Run the app by parsing CLI-style args and dispatching the command.
pub async fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let context = AppContext::from_env();
    run_with_context(args, &context).await
}

/// Run the app with an explicit context (db path and output hooks).
pub async fn run_with_context<I, S>(args: I, context: &AppContext) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let command = parse_cli_args(args)?;
    execute_command_with_context(command, context).await
}

/// Execute a pre-parsed command. This is reusable for non-CLI entrypoints.
pub async fn execute_command(command: CliCommand) -> Result<()> {
    let context = AppContext::from_env();
    execute_command_with_context(command, &context).await
}

/// Execute a pre-parsed command with an explicit execution context.
pub async fn execute_command_with_context(command: CliCommand, context: &AppContext) -> Result<()> {
    match command {
        CliCommand::Help => {
            context.emit_line(&usage_text());
            Ok(())
        }
        CliCommand::Version => {
            context.emit_line(&version_text());
            Ok(())
        }
        CliCommand::Run => handle_run(context).await,
        CliCommand::Simulate { listen } => handle_simulate(listen, context).await,
        CliCommand::Devices => handle_devices(context).await,
        CliCommand::AddDevice {
            vendor,
            model,
            endpoints,
        } => handle_add_device(vendor, &model, &endpoints, context).await,
        CliCommand::AddEndpoints { id, endpoints } => {
            handle_add_endpoints(&id, &endpoints, context).await
        }
        CliCommand::DeleteDevice { id } => handle_delete_device(&id, context).await,
        CliCommand::Status { id } => handle_status(&id, context).await,
        CliCommand::Summary => handle_summary(context).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Protocol, Vendor};
    use std::sync::Mutex;

    fn capture_context(db_path: PathBuf) -> (AppContext, Arc<Mutex<Vec<String>>>) {
        let lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let context = AppContext::from_env()
            .with_db_path(db_path)
            .with_output_hook(Arc::new(move |line: &str| {
                sink.lock().unwrap().push(line.to_string());
            }));
        (context, lines)
    }

    #[tokio::test]
    async fn help_command_emits_usage() {
        let dir = tempfile::tempdir().unwrap();
        let (context, lines) = capture_context(dir.path().join("inventory.db"));

        execute_command_with_context(CliCommand::Help, &context)
            .await
            .unwrap();

        let captured = lines.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert!(captured[0].contains("netpulse add-device"));
    }

    #[tokio::test]
    async fn add_list_and_delete_round_trip_through_commands() {
        let dir = tempfile::tempdir().unwrap();
        let (context, lines) = capture_context(dir.path().join("inventory.db"));

        execute_command_with_context(
            CliCommand::AddDevice {
                vendor: Vendor::Ubiquiti,
                model: "EdgeRouter-X".to_string(),
                endpoints: vec![crate::models::EndpointSpec {
                    host: "192.168.0.1".to_string(),
                    port: "830".to_string(),
                    protocol: Protocol::Netconf,
                }],
            },
            &context,
        )
        .await
        .unwrap();

        execute_command_with_context(CliCommand::Devices, &context)
            .await
            .unwrap();

        let device_id = {
            let captured = lines.lock().unwrap();
            let listing = captured.last().unwrap().clone();
            assert!(listing.contains("EdgeRouter-X"));
            let devices: Vec<crate::models::Device> = serde_json::from_str(&listing).unwrap();
            assert_eq!(devices.len(), 1);
            devices[0].id.clone()
        };

        execute_command_with_context(CliCommand::DeleteDevice { id: device_id }, &context)
            .await
            .unwrap();

        execute_command_with_context(CliCommand::Devices, &context)
            .await
            .unwrap();
        let captured = lines.lock().unwrap();
        assert!(captured.last().unwrap().contains("No network devices"));
    }
}
