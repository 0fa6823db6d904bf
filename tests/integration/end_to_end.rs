use serde_json::json;
use ssc_state::device::DeviceState;
use ssc_state::restore::LeafOutcome;
use ssc_state::schema::SchemaResolver;
use ssc_state::session::DeviceSession;
use ssc_state::store::BackupRecord;
use ssc_state::transport::DeviceClient;
use ssc_state::types::ParamPath;

use crate::support::{device, scenario_device, studio_monitor, Harness, LEFT};

#[test]
fn snapshot_then_restore_writes_only_writeable_leaf() {
    let harness = Harness::new().with_device(LEFT, scenario_device("3011"));
    let api = harness.api();

    let snapshot = api.snapshot(&[device(LEFT)], None, false);
    let backup = snapshot.record.device(LEFT).unwrap();
    let documents = backup.commands.documents();
    assert!(documents.contains(&json!({"a": {"b": 3}})));
    assert!(documents.contains(&json!({"a": {"c": 7}})));

    harness.transport.clear_requests();
    let outcomes = api.restore(&snapshot.record, &[device(LEFT)], false);
    let report = outcomes[0].result.as_ref().unwrap();

    let scenario_writes: Vec<_> = harness
        .transport
        .writes_to(LEFT)
        .into_iter()
        .filter(|w| w.get("a").is_some())
        .collect();
    assert_eq!(scenario_writes, vec![json!({"a": {"b": 3}})]);
    let outcome_of = |path: &[&str]| {
        report
            .leaves
            .iter()
            .find(|l| l.path.as_ref() == Some(&ParamPath::new(path.iter().copied())))
            .map(|l| l.outcome.clone())
    };
    assert_eq!(outcome_of(&["a", "c"]), Some(LeafOutcome::SkippedReadOnly));
    assert_eq!(outcome_of(&["a", "b"]), Some(LeafOutcome::Written));
}

#[test]
fn backup_file_round_trips_through_disk() {
    let harness = Harness::new().with_device(LEFT, studio_monitor("Left", "17"));
    let api = harness.api();
    let path = harness.temp.path().join("backups").join("gig.json");

    let snapshot = api.snapshot(&[device(LEFT)], Some("FOH".to_string()), false);
    snapshot.record.save(&path).unwrap();
    let loaded = BackupRecord::load(&path).unwrap();
    assert_eq!(loaded, snapshot.record);

    harness.transport.update_device(LEFT, |d| {
        let level = ParamPath::new(["audio", "out", "level"]);
        d.tree.leaf_mut(&level).unwrap().value = Some(json!(-30));
    });
    let outcomes = api.restore(&loaded, &[device(LEFT)], false);
    assert!(outcomes[0].result.is_ok());
    let state = harness.transport.device_state(LEFT).unwrap();
    assert_eq!(state.value(&ParamPath::new(["audio", "out", "level"])), Some(&json!(-6)));
    assert_eq!(state.value(&ParamPath::new(["device", "serial_bus"])), Some(&json!("rs485")));
}

#[test]
fn session_walks_restore_states() {
    let harness = Harness::new().with_device(LEFT, scenario_device("9"));
    let record = harness.api().snapshot(&[device(LEFT)], None, false).record;

    let cache = harness.cache();
    let protocol = ssc_state::protocol::Protocol::default();
    let target = device(LEFT);
    let cancel = ssc_state::concurrency::CancelToken::new();
    let client = DeviceClient::new(harness.transport.as_ref(), &protocol, &target, &cancel);
    let mut session = DeviceSession::new(client, SchemaResolver::new(cache.as_ref()));
    assert_eq!(session.state(), DeviceState::Unconnected);

    let report = session.restore(record.device(LEFT).unwrap(), false).unwrap();
    assert_eq!(session.state(), DeviceState::Restored);
    assert_eq!(report.failed(), 0);
}

#[test]
fn object_valued_parameters_round_trip_through_backup() {
    let monitor = studio_monitor("Left", "1")
        .with_parameter(&["audio", "eq", "band"], json!({"writeable": true}), json!({"freq": 100, "gain": -3}))
        .with_parameter(&["audio", "eq", "bypass"], json!({"writeable": true}), json!({"on": false}));
    let harness = Harness::new().with_device(LEFT, monitor);
    let api = harness.api();
    let snapshot = api.snapshot(&[device(LEFT)], None, false);
    let path = harness.temp.path().join("eq.json");
    snapshot.record.save(&path).unwrap();

    harness.transport.update_device(LEFT, |d| {
        d.tree.leaf_mut(&ParamPath::new(["audio", "eq", "band"])).unwrap().value =
            Some(json!({"freq": 2000, "gain": 6}));
        d.tree.leaf_mut(&ParamPath::new(["audio", "eq", "bypass"])).unwrap().value = Some(json!({"on": true}));
    });

    let record = BackupRecord::load(&path).unwrap();
    let outcomes = api.restore(&record, &[device(LEFT)], false);
    let report = outcomes[0].result.as_ref().unwrap();
    assert_eq!(report.failed(), 0);

    let state = harness.transport.device_state(LEFT).unwrap();
    assert_eq!(
        state.value(&ParamPath::new(["audio", "eq", "band"])),
        Some(&json!({"freq": 100, "gain": -3}))
    );
    assert_eq!(
        state.value(&ParamPath::new(["audio", "eq", "bypass"])),
        Some(&json!({"on": false}))
    );
}
