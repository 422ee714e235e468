mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{lag_settings, store_manager, FakeStore};
use ualflix_admin::models::{LagStatus, MemberRole, ReplicaSetHealth};
use ualflix_admin::services::{ReplicaInspector, SINGLE_NODE_MEMBER};

fn inspector(store: &Arc<FakeStore>, replica_set: Option<&str>) -> ReplicaInspector {
    ReplicaInspector::new(store_manager(store, replica_set), lag_settings(10))
}

#[tokio::test]
async fn test_replicated_sentinel_is_measured_and_removed() {
    let store = FakeStore::replicating();

    let sample = inspector(&store, Some("ualflix-replica-set")).measure_lag().await;

    assert!(sample.working);
    assert_eq!(sample.status, LagStatus::Healthy);
    assert_eq!(sample.attempts, 1);
    assert!(sample.sentinel_id.starts_with("replication_test_"));
    assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
    assert_eq!(store.sentinel_count(), 0);
}

#[tokio::test]
async fn test_unreplicated_sentinel_is_removed_after_all_attempts() {
    let store = FakeStore::replicating();
    store.replicating.store(false, Ordering::SeqCst);

    let sample = inspector(&store, Some("ualflix-replica-set")).measure_lag().await;

    assert!(!sample.working);
    assert_eq!(sample.lag.as_secs_f64(), 999.0);
    assert_eq!(sample.status, LagStatus::Failed);
    assert_eq!(sample.attempts, 10);
    assert_eq!(store.deletes.load(Ordering::SeqCst), 1);
    assert_eq!(store.sentinel_count(), 0);
}

#[tokio::test]
async fn test_failed_write_leaves_nothing_behind() {
    let store = FakeStore::replicating();
    store.fail_writes.store(true, Ordering::SeqCst);

    let sample = inspector(&store, Some("ualflix-replica-set")).measure_lag().await;

    assert!(!sample.working);
    assert_eq!(sample.attempts, 1);
    assert!(sample.detail.unwrap().contains("not primary"));
    assert_eq!(store.sentinel_count(), 0);
}

#[tokio::test]
async fn test_abandoned_measurement_still_cleans_up() {
    let store = FakeStore::replicating();
    store.replicating.store(false, Ordering::SeqCst);
    let inspector = inspector(&store, Some("ualflix-replica-set"));

    let abandoned = tokio::time::timeout(
        std::time::Duration::from_millis(20),
        inspector.measure_lag(),
    )
    .await;
    assert!(abandoned.is_err());

    // The deferred delete runs on a spawned task
    for _ in 0..50 {
        if store.sentinel_count() == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(store.inserts.load(Ordering::SeqCst), 1);
    assert_eq!(store.sentinel_count(), 0);
}

#[tokio::test]
async fn test_stale_sentinels_are_purged_by_the_next_measurement() {
    let store = FakeStore::replicating();
    let written_at = chrono::Utc::now() - chrono::Duration::minutes(10);
    store
        .sentinels
        .lock()
        .insert("replication_test_left_behind".to_string(), written_at);

    let sample = inspector(&store, Some("ualflix-replica-set")).measure_lag().await;

    assert!(sample.working);
    assert_eq!(store.sentinel_count(), 0);
}

#[tokio::test]
async fn test_recent_sentinels_survive_the_purge() {
    let store = FakeStore::replicating();
    store
        .sentinels
        .lock()
        .insert("replication_test_in_flight".to_string(), chrono::Utc::now());

    inspector(&store, Some("ualflix-replica-set")).measure_lag().await;

    assert!(store.sentinels.lock().contains_key("replication_test_in_flight"));
}

#[tokio::test]
async fn test_concurrent_measurements_do_not_collide() {
    let store = FakeStore::replicating();
    let inspector = inspector(&store, Some("ualflix-replica-set"));

    let (a, b, c) = tokio::join!(
        inspector.measure_lag(),
        inspector.measure_lag(),
        inspector.measure_lag()
    );

    assert!(a.working && b.working && c.working);
    assert_ne!(a.sentinel_id, b.sentinel_id);
    assert_ne!(b.sentinel_id, c.sentinel_id);
    assert_eq!(store.sentinel_count(), 0);
}

#[tokio::test]
async fn test_topology_of_healthy_set() {
    let store = FakeStore::replicating();

    let status = inspector(&store, Some("ualflix-replica-set")).get_topology().await;

    assert_eq!(status.overall, ReplicaSetHealth::Healthy);
    assert_eq!(status.set_name, "ualflix-replica-set");
    assert_eq!(status.primary_member.as_deref(), Some("ualflix_db_primary:27017"));
    assert_eq!(status.healthy_members(), 2);
}

#[tokio::test]
async fn test_topology_connection_error() {
    let store = FakeStore::replicating();
    *store.topology.lock() = None;

    let status = inspector(&store, Some("ualflix-replica-set")).get_topology().await;

    assert_eq!(status.overall, ReplicaSetHealth::Error);
    assert!(status.detail.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_single_node_topology_has_one_synthetic_member() {
    let store = FakeStore::replicating();
    *store.topology.lock() = None;

    let status = inspector(&store, None).get_topology().await;

    assert_eq!(status.overall, ReplicaSetHealth::SingleNode);
    assert_eq!(status.members.len(), 1);
    assert_eq!(status.members[0].name, SINGLE_NODE_MEMBER);
    assert_eq!(status.members[0].role, MemberRole::Primary);
}

#[tokio::test]
async fn test_store_metrics_through_both_routes() {
    let store = FakeStore::replicating();

    let metrics = inspector(&store, Some("ualflix-replica-set")).get_metrics().await;

    let primary = metrics.primary.stats().unwrap();
    assert_eq!(primary.data_size_mb, 1.0);
    assert_eq!(primary.storage_size_mb, 2.0);
    assert_eq!(primary.videos_count, 4);
    assert!(metrics.secondary.is_available());
}
