use clap::Parser;
use ssc_state::concurrency::CancelToken;
use ssc_state::config::SscConfig;
use ssc_state::store::{BackupRecord, DeviceSetup};
use ssc_state::tooling::cli::{Cli, CliContext, Commands, DeviceCommands};
use ssc_state::types::ParamPath;
use serde_json::json;

use crate::support::{studio_monitor, Harness, LEFT, RIGHT};

fn context(harness: &Harness, args: &[&str]) -> (Cli, CliContext) {
    let mut argv = vec!["ssc-state"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    let config = SscConfig::default();
    let paths = config.storage.resolve_under(harness.temp.path());
    let context = CliContext::with_transport(
        &cli,
        &config,
        harness.transport.clone(),
        paths,
        CancelToken::new(),
    )
    .unwrap();
    (cli, context)
}

fn run(harness: &Harness, args: &[&str]) -> Result<String, ssc_state::ApiError> {
    let (cli, context) = context(harness, args);
    context.execute(&cli.command)
}

#[test]
fn devices_add_reads_name_and_lists_by_index() {
    let harness = Harness::new()
        .with_device(LEFT, studio_monitor("Left", "1"))
        .with_device(RIGHT, studio_monitor("Right", "2"));

    assert_eq!(run(&harness, &["devices", "add", LEFT]).unwrap(), "Added fe80::1 (Left)");
    run(&harness, &["devices", "add", RIGHT, "--name", "Sub"]).unwrap();
    let listing = run(&harness, &["devices", "list"]).unwrap();
    assert_eq!(listing, "[0] fe80::1 (Left)\n[1] fe80::2 (Sub)");

    let (_, context) = context(&harness, &["devices", "list"]);
    let setup = DeviceSetup::load(&context.paths().setup_file).unwrap();
    assert_eq!(setup.devices.len(), 2);
}

#[test]
fn commands_without_devices_fail() {
    let harness = Harness::new();
    assert!(run(&harness, &["scan-schema"]).is_err());
    assert_eq!(run(&harness, &["devices", "list"]).unwrap(), "No devices in setup file");
}

#[test]
fn snapshot_set_restore_cycle() {
    let harness = Harness::new()
        .with_device(LEFT, studio_monitor("Left", "1"))
        .with_device(RIGHT, studio_monitor("Right", "2"));
    run(&harness, &["devices", "add", LEFT]).unwrap();
    run(&harness, &["devices", "add", RIGHT]).unwrap();

    let scan = run(&harness, &["scan-schema"]).unwrap();
    assert!(scan.contains("fe80::1: "));
    assert!(scan.contains("fe80::2: "));

    let backup = harness.temp.path().join("show.json");
    let backup_arg = backup.to_str().unwrap();
    run(&harness, &["snapshot", "-o", backup_arg, "-c", "soundcheck"]).unwrap();
    let record = BackupRecord::load(&backup).unwrap();
    assert_eq!(record.comment, "soundcheck");
    assert_eq!(record.devices.len(), 2);

    run(&harness, &["set", "ui/logo/brightness", "20", "--target", "0"]).unwrap();
    assert_eq!(
        run(&harness, &["get", "ui.logo.brightness"]).unwrap(),
        "fe80::1: 20\nfe80::2: 80"
    );
    assert!(run(&harness, &["set", "ui/logo/brightness", "120"]).is_err());

    let restored = run(&harness, &["restore", backup_arg]).unwrap();
    assert!(restored.contains("0 failed"));
    let state = harness.transport.device_state(LEFT).unwrap();
    assert_eq!(state.value(&ParamPath::new(["ui", "logo", "brightness"])), Some(&json!(80)));
}

#[test]
fn snapshot_reports_leaves_without_value() {
    let harness = Harness::new().with_device(LEFT, studio_monitor("Left", "1"));
    harness.transport.update_device(LEFT, |d| {
        d.reject_queries.insert(ParamPath::new(["ui", "logo", "brightness"]));
    });
    run(&harness, &["devices", "add", LEFT]).unwrap();

    let backup = harness.temp.path().join("partial.json");
    let text = run(&harness, &["snapshot", "-o", backup.to_str().unwrap()]).unwrap();
    assert!(text.contains("1 without a value not saved"));
}

#[test]
fn save_writes_save_settings() {
    let harness = Harness::new().with_device(LEFT, studio_monitor("Left", "1"));
    run(&harness, &["devices", "add", LEFT]).unwrap();
    run(&harness, &["save"]).unwrap();
    assert_eq!(
        harness.transport.writes_to(LEFT),
        vec![json!({"device": {"save_settings": true}})]
    );
}

#[test]
fn subcommand_variants_parse() {
    let cli = Cli::try_parse_from(["ssc-state", "--rescan", "devices", "remove", LEFT]).unwrap();
    assert!(cli.rescan);
    assert!(matches!(
        cli.command,
        Commands::Devices { command: DeviceCommands::Remove { ref address } } if address == LEFT
    ));
}
