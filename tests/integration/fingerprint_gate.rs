use serde_json::json;
use ssc_state::error::ApiError;

use crate::support::{device, fingerprint, scenario_device, Harness, LEFT};

fn assert_gate(mutate: impl FnOnce(&mut ssc_state::device::Fingerprint), field: &str) {
    let harness = Harness::new().with_device(LEFT, scenario_device("100"));
    let api = harness.api();
    let mut record = api.snapshot(&[device(LEFT)], None, false).record;
    let entry = record.devices.get_mut(LEFT).unwrap();
    mutate(&mut entry.fingerprint);

    harness.transport.clear_requests();
    let outcomes = api.restore(&record, &[device(LEFT)], false);
    match &outcomes[0].result {
        Err(ApiError::IdentityMismatch { field: f, .. }) => assert_eq!(f, field),
        other => panic!("expected identity mismatch, got {:?}", other),
    }
    assert!(harness.transport.writes_to(LEFT).is_empty());
}

#[test]
fn serial_mismatch_blocks_restore() {
    assert_gate(|f| f.serial = "101".to_string(), "serial");
}

#[test]
fn product_mismatch_blocks_restore() {
    assert_gate(|f| f.product = "KH 310".to_string(), "product");
}

#[test]
fn version_mismatch_blocks_restore() {
    assert_gate(|f| f.version = "1_5_0".to_string(), "version");
}

#[test]
fn vendor_is_not_part_of_the_gate() {
    let harness = Harness::new().with_device(LEFT, scenario_device("100"));
    let api = harness.api();
    let mut record = api.snapshot(&[device(LEFT)], None, false).record;
    record.devices.get_mut(LEFT).unwrap().fingerprint.vendor = "Sennheiser".to_string();

    let outcomes = api.restore(&record, &[device(LEFT)], false);
    assert!(outcomes[0].result.is_ok());
    assert!(harness.transport.writes_to(LEFT).contains(&json!({"a": {"b": 3}})));
}

#[test]
fn record_fingerprint_matches_device() {
    let harness = Harness::new().with_device(LEFT, scenario_device("100"));
    let record = harness.api().snapshot(&[device(LEFT)], None, false).record;
    assert_eq!(record.device(LEFT).unwrap().fingerprint, fingerprint("100"));
}
