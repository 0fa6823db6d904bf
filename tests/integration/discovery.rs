use ssc_state::concurrency::CancelToken;
use ssc_state::error::ApiError;
use ssc_state::protocol::Protocol;
use ssc_state::store::SchemaCacheStore;
use ssc_state::transport::DeviceClient;
use ssc_state::tree::SchemaWalker;

use crate::support::{device, studio_monitor, Harness, LEFT};

#[test]
fn discovery_is_idempotent() {
    let harness = Harness::new().with_device(LEFT, studio_monitor("Left", "1"));
    let protocol = Protocol::default();
    let target = device(LEFT);
    let cancel = CancelToken::new();
    let client = DeviceClient::new(harness.transport.as_ref(), &protocol, &target, &cancel);

    let first = SchemaWalker::new(client).discover_tree().unwrap();
    let second = SchemaWalker::new(client).discover_tree().unwrap();
    assert_eq!(first.leaf_paths(), second.leaf_paths());
    for path in first.leaf_paths() {
        assert_eq!(first.limits(&path), second.limits(&path));
    }
    assert!(!first.children().contains_key("osc"));
}

#[test]
fn cache_hit_issues_no_introspection() {
    let harness = Harness::new().with_device(LEFT, studio_monitor("Left", "1"));
    let api = harness.api();
    let refreshed = api.refresh_schema(&[device(LEFT)]);
    let discovered = refreshed.into_iter().next().unwrap().result.unwrap();
    assert!(!harness.transport.introspection_requests_to(LEFT).is_empty());

    harness.transport.clear_requests();
    let snapshot = api.snapshot(&[device(LEFT)], None, false);
    assert!(snapshot.outcomes[0].result.is_ok());
    assert!(harness.transport.introspection_requests_to(LEFT).is_empty());

    let cached = harness.cache().load(LEFT).unwrap().unwrap();
    assert_eq!(cached, discovered.schema_only());
}

#[test]
fn rescan_bypasses_the_cache() {
    let harness = Harness::new().with_device(LEFT, studio_monitor("Left", "1"));
    let api = harness.api();
    api.refresh_schema(&[device(LEFT)]);

    harness.transport.clear_requests();
    api.snapshot(&[device(LEFT)], None, true);
    assert!(!harness.transport.introspection_requests_to(LEFT).is_empty());
}

#[test]
fn device_without_introspection_is_incompatible() {
    let mut monitor = studio_monitor("Legacy", "1");
    monitor.no_introspection = true;
    let harness = Harness::new().with_device(LEFT, monitor);

    let outcomes = harness.api().refresh_schema(&[device(LEFT)]);
    assert!(matches!(
        outcomes[0].result,
        Err(ApiError::SchemaIncompatible { .. })
    ));
    assert!(harness.cache().load(LEFT).unwrap().is_none());
}
