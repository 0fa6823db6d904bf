//! CLI Tooling
//!
//! Command-line surface over [`ControlApi`]. Devices come from the setup
//! file (optionally narrowed with `--target`); each command returns the text
//! printed by the binary.

use crate::api::ControlApi;
use crate::concurrency::{CancelToken, DeviceOutcome};
use crate::config::{SscConfig, StoragePaths};
use crate::device::Device;
use crate::error::ApiError;
use crate::protocol::Protocol;
use crate::restore::RestoreReport;
use crate::store::{BackupRecord, DeviceSetup, FileSchemaCache};
use crate::transport::{TcpTransport, Transport};
use crate::types::ParamPath;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// ssc-state - schema-driven snapshot and restore for networked loudspeakers
#[derive(Parser, Debug)]
#[command(name = "ssc-state")]
#[command(version)]
#[command(about = "Discover, snapshot and restore loudspeaker parameters over the SSC protocol")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Network interface for IPv6 link-local addresses (e.g. en0)
    #[arg(short, long, global = true)]
    pub interface: Option<String>,

    /// Only act on the device at this index of the setup file
    #[arg(short, long, global = true)]
    pub target: Option<usize>,

    /// Ignore the schema cache and rediscover
    #[arg(long, global = true)]
    pub rescan: bool,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover the parameter schema of each device and refresh the cache
    ScanSchema,
    /// Capture every parameter value into a backup file
    Snapshot {
        /// Backup file (default: backup directory, named by timestamp)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Free-text comment stored in the backup
        #[arg(short, long)]
        comment: Option<String>,
    },
    /// Write a backup file back to its devices
    Restore {
        /// Backup file to replay
        file: PathBuf,
    },
    /// Read one parameter (e.g. audio/out/mute or audio.out.mute)
    Get { path: String },
    /// Write one parameter; VALUE is parsed as JSON, else taken as a string
    Set {
        path: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Persist running settings on the device
    Save,
    /// Manage the device setup file
    Devices {
        #[command(subcommand)]
        command: DeviceCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommands {
    /// Add or update a device
    Add {
        address: String,
        /// Display name (default: read from the device)
        #[arg(long)]
        name: Option<String>,
    },
    /// List known devices with their target index
    List,
    /// Forget a device
    Remove { address: String },
}

impl Cli {
    /// Fold the level, format and output flags into the loaded configuration.
    /// `--log-file` is handed to `init_logging` directly.
    pub fn apply_logging_overrides(&self, config: &mut SscConfig) {
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.logging.output = output.clone();
        }
    }
}

pub struct CliContext {
    api: ControlApi,
    paths: StoragePaths,
    interface: Option<String>,
    target: Option<usize>,
    rescan: bool,
}

impl CliContext {
    /// Context talking TCP to real devices.
    pub fn new(cli: &Cli, config: &SscConfig, cancel: CancelToken) -> Result<Self, ApiError> {
        let transport = Arc::new(TcpTransport::new(config.transport.port, config.transport.timeout()));
        let paths = config.storage.resolve_paths()?;
        Self::with_transport(cli, config, transport, paths, cancel)
    }

    pub fn with_transport(
        cli: &Cli,
        config: &SscConfig,
        transport: Arc<dyn Transport>,
        paths: StoragePaths,
        cancel: CancelToken,
    ) -> Result<Self, ApiError> {
        let protocol = Protocol::new(config.protocol.clone())?;
        let cache = Arc::new(FileSchemaCache::new(paths.schema_cache.clone()));
        let api = ControlApi::new(transport, protocol, cache)
            .with_parallel(config.transport.parallel)
            .with_cancel(cancel);
        Ok(Self {
            api,
            paths,
            interface: cli.interface.clone().or_else(|| config.transport.interface.clone()),
            target: cli.target,
            rescan: cli.rescan,
        })
    }

    pub fn api(&self) -> &ControlApi {
        &self.api
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::ScanSchema => {
                let devices = self.devices()?;
                let outcomes = self.api.refresh_schema(&devices);
                render(outcomes, |tree| format!("{} parameters", tree.leaf_count()))
            }
            Commands::Snapshot { output, comment } => self.snapshot(output.clone(), comment.clone()),
            Commands::Restore { file } => self.restore(file),
            Commands::Get { path } => {
                let path = ParamPath::parse(path)?;
                let outcomes = self.api.get(&self.devices()?, &path);
                render(outcomes, |value| value.to_string())
            }
            Commands::Set { path, value } => {
                let path = ParamPath::parse(path)?;
                let value = parse_value(value);
                let outcomes = self.api.set(&self.devices()?, &path, &value);
                render(outcomes, |reply| reply.to_string())
            }
            Commands::Save => {
                let outcomes = self.api.save_settings(&self.devices()?);
                render(outcomes, |_| "settings saved".to_string())
            }
            Commands::Devices { command } => self.devices_command(command),
        }
    }

    fn snapshot(&self, output: Option<PathBuf>, comment: Option<String>) -> Result<String, ApiError> {
        let devices = self.devices()?;
        let snapshot = self.api.snapshot(&devices, comment, self.rescan);
        if snapshot.record.devices.is_empty() {
            return render(snapshot.outcomes, |_| String::new());
        }
        let path = output.unwrap_or_else(|| self.paths.backup_file(snapshot.record.timestamp));
        snapshot.record.save(&path)?;
        info!(path = %path.display(), "Backup written");

        let mut text = render(snapshot.outcomes, |counts| match counts.unpopulated {
            0 => format!("{} parameters captured", counts.captured),
            missing => format!(
                "{} parameters captured, {} without a value not saved",
                counts.captured, missing
            ),
        })?;
        let _ = write!(text, "\nBackup written to {}", path.display());
        Ok(text)
    }

    fn restore(&self, file: &std::path::Path) -> Result<String, ApiError> {
        let record = BackupRecord::load(file)?;
        let mut devices = self.setup_devices()?;
        if devices.is_empty() {
            devices = record
                .devices
                .keys()
                .map(|identity| Device::new(identity.clone()))
                .collect();
        }
        let devices = self.with_interface(devices);
        let outcomes = self.api.restore(&record, &devices, self.rescan);
        render(outcomes, restore_summary)
    }

    fn devices_command(&self, command: &DeviceCommands) -> Result<String, ApiError> {
        let mut setup = DeviceSetup::load(&self.paths.setup_file)?;
        match command {
            DeviceCommands::Add { address, name } => {
                let mut device = Device::new(address.clone()).with_interface(self.interface.clone());
                device.name = match name {
                    Some(name) => Some(name.clone()),
                    None => self.api.device_name(&device).map_err(|e| {
                        warn!(device = %device, error = %e, "Could not read device name");
                        e
                    }).ok(),
                };
                let added = setup.upsert(device.clone());
                setup.save(&self.paths.setup_file)?;
                Ok(format!("{} {}", if added { "Added" } else { "Updated" }, describe(&device)))
            }
            DeviceCommands::List => {
                if setup.devices.is_empty() {
                    return Ok("No devices in setup file".to_string());
                }
                Ok(setup
                    .devices
                    .iter()
                    .enumerate()
                    .map(|(index, device)| format!("[{}] {}", index, describe(device)))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            DeviceCommands::Remove { address } => {
                if !setup.remove(address) {
                    return Err(ApiError::ConfigError(format!("Unknown device: {}", address)));
                }
                setup.save(&self.paths.setup_file)?;
                Ok(format!("Removed {}", address))
            }
        }
    }

    fn setup_devices(&self) -> Result<Vec<Device>, ApiError> {
        DeviceSetup::load(&self.paths.setup_file)?.select(self.target)
    }

    fn devices(&self) -> Result<Vec<Device>, ApiError> {
        let devices = self.setup_devices()?;
        if devices.is_empty() {
            return Err(ApiError::ConfigError(format!(
                "No devices in {}. Add one with `ssc-state devices add <address>`.",
                self.paths.setup_file.display()
            )));
        }
        Ok(self.with_interface(devices))
    }

    /// Devices without their own interface inherit the configured one.
    fn with_interface(&self, devices: Vec<Device>) -> Vec<Device> {
        devices
            .into_iter()
            .map(|device| match device.interface {
                Some(_) => device,
                None => device.with_interface(self.interface.clone()),
            })
            .collect()
    }
}

fn describe(device: &Device) -> String {
    match &device.name {
        Some(name) => format!("{} ({})", device, name),
        None => device.to_string(),
    }
}

fn restore_summary(report: &RestoreReport) -> String {
    let mut text = format!(
        "{} written, {} skipped, {} failed",
        report.written(),
        report.skipped(),
        report.failed()
    );
    for rejection in report.rejections() {
        let _ = write!(text, "\n  {}", rejection);
    }
    text
}

/// JSON if it parses, else the raw string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// One line per device. Fails only when no device succeeded.
fn render<T>(outcomes: Vec<DeviceOutcome<T>>, summary: impl Fn(&T) -> String) -> Result<String, ApiError> {
    let mut lines = Vec::with_capacity(outcomes.len());
    let mut first_error = None;
    let mut succeeded = 0;
    for outcome in outcomes {
        match outcome.result {
            Ok(value) => {
                succeeded += 1;
                lines.push(format!("{}: {}", outcome.device, summary(&value)));
            }
            Err(e) => {
                error!(device = %outcome.device, error = %e, "Device operation failed");
                lines.push(format!("{}: error: {}", outcome.device, e));
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) if succeeded == 0 => Err(e),
        _ => Ok(lines.join("\n")),
    }
}
