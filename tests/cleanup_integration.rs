//! End-to-end cleanup against a simulated cluster.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::too_many_lines)]

mod common;

use common::{ALL_HOURS, Cluster, StaticRoutes, eventually};
use mapping_gc::models::{TopicOffset, TopicStatsTable};
use mapping_gc::{
    CleanupScheduler, CommitOptions, Error, FileMappingManager, GcConfig, GenerationRecord,
    InMemoryMappingManager, MappingManager, MessageQueue, QueueMappingDetail, RouteSnapshot,
};
use std::sync::Arc;
use std::time::Duration;

fn config() -> GcConfig {
    GcConfig::new()
        .with_node_name("broker-a")
        .with_delete_when(ALL_HOURS)
        .with_scan_interval(Duration::from_secs(3600))
        .with_topic_throttle(Duration::from_millis(1))
        .with_rpc_timeout(Duration::from_secs(1))
}

/// `orders` queue 0 moved from broker-b to broker-a; broker-b is drained.
fn orders() -> QueueMappingDetail {
    QueueMappingDetail::new("orders", 2, "broker-a", 4).with_chain(
        0,
        vec![
            GenerationRecord::new(0, 1, "broker-b", 0).with_offsets(0, 40),
            GenerationRecord::new(1, 0, "broker-a", 40),
        ],
    )
}

/// `payments` queue 0 is believed led by broker-c but now lives on broker-d.
fn payments_local() -> QueueMappingDetail {
    QueueMappingDetail::new("payments", 2, "broker-a", 9)
        .with_chain(
            0,
            vec![
                GenerationRecord::new(0, 0, "broker-a", 0).with_offsets(0, 12),
                GenerationRecord::new(1, 3, "broker-c", 12),
            ],
        )
        .with_chain(1, vec![GenerationRecord::new(0, 1, "broker-a", 0)])
}

fn payments_on_d() -> QueueMappingDetail {
    QueueMappingDetail::new("payments", 2, "broker-d", 9).with_chain(
        0,
        vec![
            GenerationRecord::new(1, 3, "broker-c", 12).with_offsets(12, 30),
            GenerationRecord::new(2, 0, "broker-d", 30),
        ],
    )
}

fn cluster() -> Arc<Cluster> {
    let broker_b = Arc::new(InMemoryMappingManager::new("broker-b"));
    let broker_d = Arc::new(InMemoryMappingManager::new("broker-d"));
    broker_d.insert(payments_on_d());
    let cluster = Cluster::new().with_broker(broker_b).with_broker(broker_d);
    cluster.set_stats(
        "broker-b",
        TopicStatsTable::new()
            .with_offset(MessageQueue::new("orders", "broker-b", 1), TopicOffset::new(40, 40)),
    );
    Arc::new(cluster)
}

fn routes() -> Arc<StaticRoutes> {
    Arc::new(StaticRoutes::new().with_route(RouteSnapshot::new("payments").with_endpoint(0, "broker-d")))
}

#[tokio::test]
async fn test_scheduler_reclaims_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("topicQueueMapping.json");
    let manager = Arc::new(FileMappingManager::open(&path, "broker-a").unwrap());
    manager.insert(orders());
    manager.insert(payments_local());
    let initial = manager.data_version();

    let handle =
        CleanupScheduler::from_config(&config(), manager.clone(), cluster(), routes()).spawn();
    handle.wakeup();

    let reclaimed = eventually(|| {
        let orders = manager.get("orders").unwrap();
        let payments = manager.get("payments").unwrap();
        orders.chain(0).map(Vec::len) == Some(1) && payments.chain(0).is_none()
    })
    .await;
    assert!(reclaimed);
    handle.shutdown().await.unwrap();

    let reopened = FileMappingManager::open(&path, "broker-a").unwrap();
    let orders = reopened.get("orders").unwrap();
    assert_eq!(orders.chain(0).unwrap()[0].bname, "broker-a");
    let payments = reopened.get("payments").unwrap();
    assert!(payments.chain(0).is_none());
    assert_eq!(payments.chain(1).unwrap().len(), 1);
    assert_eq!(reopened.data_version().counter, initial.counter + 2);
}

#[tokio::test]
async fn test_cycle_is_idempotent() {
    let manager = Arc::new(InMemoryMappingManager::new("broker-a"));
    manager.insert(orders());
    manager.insert(payments_local());
    let scheduler = CleanupScheduler::from_config(&config(), manager.clone(), cluster(), routes());
    let stop = mapping_gc::gc::StopSignal::never();

    let first = scheduler.run_cycle(&stop).await;
    let table = manager.snapshot();
    let version = manager.data_version();
    let second = scheduler.run_cycle(&stop).await;

    assert_eq!(first.expired.unwrap().records_removed, 1);
    assert_eq!(first.stale_leader.unwrap().records_removed, 2);
    assert!(!second.expired.unwrap().has_changes());
    assert!(!second.stale_leader.unwrap().has_changes());
    assert_eq!(manager.snapshot(), table);
    assert_eq!(manager.data_version(), version);
    assert_eq!(manager.persist_count(), 2);
}

#[tokio::test]
async fn test_unreachable_broker_leaves_table_untouched() {
    let manager = Arc::new(InMemoryMappingManager::new("broker-a"));
    manager.insert(orders());
    let gateway = Arc::new(Cluster::new());
    let scheduler = CleanupScheduler::from_config(&config(), manager.clone(), gateway.clone(), routes());

    let cycle = scheduler.run_cycle(&mapping_gc::gc::StopSignal::never()).await;

    assert_eq!(gateway.calls(), 1);
    assert!(!cycle.expired.unwrap().has_changes());
    assert_eq!(manager.get("orders").unwrap().chain(0).unwrap().len(), 2);
    assert_eq!(manager.persist_count(), 0);
}

#[tokio::test]
async fn test_foreign_detail_is_never_touched() {
    let manager = Arc::new(InMemoryMappingManager::new("broker-a"));
    let mut foreign = orders();
    foreign.bname = "broker-z".to_string();
    manager.insert(foreign.clone());
    let gateway = cluster();
    let scheduler = CleanupScheduler::from_config(&config(), manager.clone(), gateway.clone(), routes());

    scheduler.run_cycle(&mapping_gc::gc::StopSignal::never()).await;

    assert_eq!(gateway.calls(), 0);
    assert_eq!(*manager.get("orders").unwrap(), foreign);
}

#[test]
fn test_commit_rejects_foreign_owner_and_epoch_regression() {
    let manager = InMemoryMappingManager::new("broker-a");
    manager.insert(orders());

    let mut foreign = orders();
    foreign.bname = "broker-z".to_string();
    let err = manager.commit(foreign, CommitOptions::cleanup()).unwrap_err();
    assert!(matches!(err, Error::OwnerMismatch { .. }));

    let mut older = orders();
    older.epoch = 1;
    let err = manager.commit(older, CommitOptions::cleanup()).unwrap_err();
    assert!(matches!(err, Error::StaleEpoch { current: 4, proposed: 1, .. }));
}
