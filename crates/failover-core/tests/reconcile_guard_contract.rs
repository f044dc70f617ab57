//! Architectural Contract Test: Reconcile Guards
//!
//! This test verifies the guards in front of every record write.
//!
//! Constraints verified:
//! - The anchor A record must hold the stated source address
//! - The anchor record gates the cooldown for the whole set
//! - A repeated switch is held by the cooldown, then becomes a no-op
//! - AAAA records can be created, removed and re-created
//! - Names missing from the zone are created next to updated ones
//!
//! If this test fails, someone has:
//! - Written without re-reading the zone first
//! - Moved the cooldown off the anchor record
//! - Applied the source check to the wrong family

mod common;

use chrono::Utc;
use common::*;
use failover_core::error::Error;
use failover_core::{Family, MemoryRecordStore, RecordSet, RecordSynchronizer, SyncOutcome};
use std::sync::Arc;
use std::time::Duration;

fn synchronizer(store: &MemoryRecordStore) -> RecordSynchronizer {
    RecordSynchronizer::new(Arc::new(store.clone()), DOMAIN)
}

fn minutes_ago(minutes: i64) -> chrono::DateTime<Utc> {
    Utc::now() - chrono::Duration::minutes(minutes)
}

#[tokio::test]
async fn source_mismatch_blocks_the_write() {
    let store = zone_on_node_a().await;

    let err = synchronizer(&store)
        .reconcile(
            &RecordSet::anchor_only(),
            Family::V4,
            Some(ip(B_V4)),
            Some(ip(C_V4)),
        )
        .await
        .unwrap_err();

    assert!(err.is_guard());
    assert_eq!(err.to_string(), "Stated address is 10.0.0.11, expected 10.0.0.12");
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn aaaa_ignores_the_source_address() {
    let store = zone_on_node_a().await;

    let outcome = synchronizer(&store)
        .reconcile(
            &RecordSet::anchor_only(),
            Family::V6,
            Some(ip("2001:db8::99")),
            Some(ip(B_V6)),
        )
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Updated { count: 1, created: 0 });
}

#[tokio::test]
async fn recent_anchor_is_held_by_cooldown() {
    let store = MemoryRecordStore::new(DOMAIN);
    store
        .seed_at(DOMAIN, Family::V4, A_V4, minutes_ago(5))
        .await;

    let err = synchronizer(&store)
        .reconcile(&RecordSet::anchor_only(), Family::V4, Some(ip(A_V4)), Some(ip(B_V4)))
        .await
        .unwrap_err();

    match err {
        Error::Cooldown {
            record,
            age_secs,
            window_secs,
        } => {
            assert_eq!(record, "@");
            assert!((299..=301).contains(&age_secs), "age was {}", age_secs);
            assert_eq!(window_secs, 600);
        }
        other => panic!("expected cooldown, got {:?}", other),
    }
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn cooldown_expires_after_window() {
    let store = MemoryRecordStore::new(DOMAIN);
    store
        .seed_at(DOMAIN, Family::V4, A_V4, minutes_ago(11))
        .await;

    let outcome = synchronizer(&store)
        .reconcile(&RecordSet::anchor_only(), Family::V4, Some(ip(A_V4)), Some(ip(B_V4)))
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Updated { count: 1, created: 0 });
    assert_eq!(store.contents(DOMAIN, Family::V4).await, vec![B_V4]);
}

#[tokio::test]
async fn configured_window_replaces_default() {
    let store = MemoryRecordStore::new(DOMAIN);
    store
        .seed_at(DOMAIN, Family::V4, A_V4, minutes_ago(2))
        .await;

    let outcome = synchronizer(&store)
        .with_cooldown(Duration::from_secs(60))
        .reconcile(&RecordSet::anchor_only(), Family::V4, None, Some(ip(B_V4)))
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Updated { count: 1, created: 0 });
}

#[tokio::test]
async fn repeated_switch_is_held_then_unchanged() {
    let store = zone_on_node_a().await;
    let sync = synchronizer(&store);
    let names = RecordSet::anchor_only();

    sync.reconcile(&names, Family::V4, Some(ip(A_V4)), Some(ip(B_V4)))
        .await
        .unwrap();
    let writes = store.write_count();

    // Immediately again: the anchor was just touched
    let err = sync
        .reconcile(&names, Family::V4, Some(ip(B_V4)), Some(ip(B_V4)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cooldown { .. }));

    // After the window: nothing left to write
    store.backdate(Duration::from_secs(11 * 60)).await;
    let outcome = sync
        .reconcile(&names, Family::V4, Some(ip(B_V4)), Some(ip(B_V4)))
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Unchanged);
    assert_eq!(store.write_count(), writes);
}

#[tokio::test]
async fn anchor_gates_the_whole_set() {
    let store = MemoryRecordStore::new(DOMAIN);
    store.seed(DOMAIN, Family::V4, A_V4).await;
    // www was touched recently, but only the anchor counts
    store
        .seed_at("www.example.com", Family::V4, A_V4, minutes_ago(1))
        .await;
    let names = RecordSet::new(["@", "www"]).unwrap();

    let outcome = synchronizer(&store)
        .reconcile(&names, Family::V4, Some(ip(A_V4)), Some(ip(C_V4)))
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Updated { count: 2, created: 0 });
    assert_eq!(store.contents("www.example.com", Family::V4).await, vec![C_V4]);
}

#[tokio::test]
async fn missing_names_are_created_next_to_updates() {
    let store = zone_on_node_a().await;
    let names = RecordSet::new(["@", "www", "api"]).unwrap();

    let outcome = synchronizer(&store)
        .reconcile(&names, Family::V4, Some(ip(A_V4)), Some(ip(B_V4)))
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Updated { count: 1, created: 2 });
    for fqdn in [DOMAIN, "www.example.com", "api.example.com"] {
        assert_eq!(store.contents(fqdn, Family::V4).await, vec![B_V4], "{}", fqdn);
    }
}

#[tokio::test]
async fn aaaa_lifecycle_create_delete_create() {
    let store = MemoryRecordStore::new(DOMAIN);
    store.seed(DOMAIN, Family::V4, A_V4).await;
    let sync = synchronizer(&store);
    let names = RecordSet::new(["@", "www"]).unwrap();

    let created = sync
        .reconcile(&names, Family::V6, None, Some(ip(A_V6)))
        .await
        .unwrap();
    assert_eq!(created, SyncOutcome::Created { count: 2 });

    // Removal is not subject to the cooldown
    let deleted = sync.reconcile(&names, Family::V6, None, None).await.unwrap();
    assert_eq!(deleted, SyncOutcome::Deleted { count: 2 });
    assert!(store.contents(DOMAIN, Family::V6).await.is_empty());

    let again = sync
        .reconcile(&names, Family::V6, None, Some(ip(B_V6)))
        .await
        .unwrap();
    assert_eq!(again, SyncOutcome::Created { count: 2 });
    assert_eq!(store.contents("www.example.com", Family::V6).await, vec![B_V6]);

    // The A records were never touched
    assert_eq!(store.contents(DOMAIN, Family::V4).await, vec![A_V4]);
}

#[tokio::test]
async fn a_records_cannot_be_removed() {
    let store = zone_on_node_a().await;

    let err = synchronizer(&store)
        .reconcile(&RecordSet::anchor_only(), Family::V4, None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.list_count(), 0, "rejected before reading the zone");
}

#[tokio::test]
async fn zone_is_looked_up_on_every_call() {
    let store = zone_on_node_a().await;
    let sync = synchronizer(&store);

    for _ in 0..3 {
        sync.reconcile(&RecordSet::anchor_only(), Family::V6, None, Some(ip(A_V6)))
            .await
            .unwrap();
    }

    assert_eq!(store.find_zone_count(), 3);
    assert_eq!(store.write_count(), 0, "already in place");
}
