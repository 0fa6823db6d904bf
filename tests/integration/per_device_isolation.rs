use serde_json::json;
use ssc_state::error::ApiError;
use ssc_state::types::ParamPath;

use crate::support::{device, studio_monitor, Harness, LEFT, RIGHT};

#[test]
fn offline_device_does_not_cancel_sibling() {
    let harness = Harness::new()
        .with_device(LEFT, studio_monitor("Left", "1"))
        .with_device(RIGHT, studio_monitor("Right", "2"));
    harness.transport.update_device(LEFT, |d| d.offline = true);
    let api = harness.api().with_parallel(true);

    let snapshot = api.snapshot(&[device(LEFT), device(RIGHT)], None, false);
    assert_eq!(snapshot.outcomes[0].device.address, LEFT);
    assert!(snapshot.outcomes[0].result.is_err());
    assert!(snapshot.outcomes[1].result.is_ok());
    assert_eq!(snapshot.record.devices.keys().collect::<Vec<_>>(), vec![RIGHT]);
}

#[test]
fn parallel_restore_matches_sequential() {
    let harness = Harness::new()
        .with_device(LEFT, studio_monitor("Left", "1"))
        .with_device(RIGHT, studio_monitor("Right", "2"));
    let devices = [device(LEFT), device(RIGHT)];
    let record = harness.api().snapshot(&devices, None, false).record;
    let level = ParamPath::new(["audio", "out", "level"]);

    for parallel in [false, true] {
        for address in [LEFT, RIGHT] {
            harness.transport.update_device(address, |d| {
                d.tree.leaf_mut(&level).unwrap().value = Some(json!(-42));
            });
        }
        let outcomes = harness.api().with_parallel(parallel).restore(&record, &devices, false);
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        for address in [LEFT, RIGHT] {
            let state = harness.transport.device_state(address).unwrap();
            assert_eq!(state.value(&level), Some(&json!(-6)));
        }
    }
}

#[test]
fn rejected_write_is_reported_not_fatal() {
    let harness = Harness::new().with_device(LEFT, studio_monitor("Left", "1"));
    let api = harness.api();
    let record = api.snapshot(&[device(LEFT)], None, false).record;
    let mute = ParamPath::new(["audio", "out", "mute"]);
    harness.transport.update_device(LEFT, |d| {
        d.reject_writes.insert(mute.clone());
    });

    let outcomes = api.restore(&record, &[device(LEFT)], false);
    let report = outcomes[0].result.as_ref().unwrap();
    let rejections = report.rejections();
    assert_eq!(rejections.len(), 1);
    assert!(matches!(&rejections[0], ApiError::WriteRejected { path, .. } if *path == mute));
    assert!(report.written() > 0);
}
