//! Architectural Contract Test: Write Verification
//!
//! This test verifies that every write is checked against the store's echo
//! and that one failed name does not stop the others.
//!
//! Constraints verified:
//! - An echo that differs from the request is an error
//! - Equivalent address spellings verify
//! - A failing name is reported, the remaining names are still written
//! - The first failure is the one returned
//!
//! If this test fails, someone has:
//! - Trusted a 2xx status without reading the echo
//! - Aborted a multi-name write on the first error

mod common;

use common::*;
use failover_core::error::Error;
use failover_core::{Family, MemoryRecordStore, RecordSet, RecordSynchronizer, SyncOutcome};
use std::sync::Arc;

fn synchronizer(store: &MemoryRecordStore) -> RecordSynchronizer {
    RecordSynchronizer::new(Arc::new(store.clone()), DOMAIN)
}

async fn zone_with_three_names() -> MemoryRecordStore {
    let store = MemoryRecordStore::new(DOMAIN);
    for fqdn in [DOMAIN, "api.example.com", "www.example.com"] {
        store.seed(fqdn, Family::V4, A_V4).await;
    }
    store
}

#[tokio::test]
async fn echo_mismatch_is_a_verification_error() {
    let store = zone_on_node_a().await;
    store.set_echo_override(Some("10.0.0.99")).await;

    let err = synchronizer(&store)
        .reconcile(&RecordSet::anchor_only(), Family::V4, Some(ip(A_V4)), Some(ip(C_V4)))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Verification { .. }));
    assert_eq!(err.to_string(), "Set record @ to 10.0.0.13 failed, still 10.0.0.99");
    assert!(!err.is_guard());
}

#[tokio::test]
async fn equivalent_ipv6_spelling_verifies() {
    let store = zone_on_node_a().await;
    store.set_echo_override(Some("2001:0db8:0000:0000:0000:0000:0000:0012")).await;

    let outcome = synchronizer(&store)
        .reconcile(&RecordSet::anchor_only(), Family::V6, None, Some(ip(B_V6)))
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Updated { count: 1, created: 0 });
}

#[tokio::test]
async fn failing_name_does_not_stop_the_others() {
    let store = zone_with_three_names().await;
    store.fail_writes_for("api.example.com").await;
    let names = RecordSet::new(["@", "api", "www"]).unwrap();

    let err = synchronizer(&store)
        .reconcile(&names, Family::V4, Some(ip(A_V4)), Some(ip(B_V4)))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Provider { .. }));
    assert_eq!(store.update_count(), 3, "every name was attempted");
    assert_eq!(store.contents(DOMAIN, Family::V4).await, vec![B_V4]);
    assert_eq!(store.contents("api.example.com", Family::V4).await, vec![A_V4]);
    assert_eq!(store.contents("www.example.com", Family::V4).await, vec![B_V4]);
}

#[tokio::test]
async fn first_failure_is_reported() {
    let store = zone_with_three_names().await;
    store.fail_writes_for("www.example.com").await;
    store.fail_writes_for("api.example.com").await;
    let names = RecordSet::new(["www", "@", "api"]).unwrap();

    let err = synchronizer(&store)
        .reconcile(&names, Family::V4, Some(ip(A_V4)), Some(ip(B_V4)))
        .await
        .unwrap_err();

    // Set order is anchor, api, www
    let id = match err {
        Error::Provider { ref message, .. } => message.clone(),
        other => panic!("expected provider error, got {:?}", other),
    };
    assert_eq!(id, "Write to rec-0002 rejected");
}

#[tokio::test]
async fn failed_delete_keeps_deleting_the_rest() {
    let store = MemoryRecordStore::new(DOMAIN);
    store.seed(DOMAIN, Family::V4, A_V4).await;
    store.seed(DOMAIN, Family::V6, A_V6).await;
    store.seed("www.example.com", Family::V6, A_V6).await;
    store.fail_writes_for(DOMAIN).await;
    let names = RecordSet::new(["@", "www"]).unwrap();

    let err = synchronizer(&store)
        .reconcile(&names, Family::V6, None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Provider { .. }));
    assert_eq!(store.contents(DOMAIN, Family::V6).await, vec![A_V6]);
    assert!(store.contents("www.example.com", Family::V6).await.is_empty());
}
