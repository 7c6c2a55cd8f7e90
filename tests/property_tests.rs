//! Property-based tests for the cleanup invariants.
//!
//! - The reclaimer removes at most one record per chain and never a leader
//! - Only chains whose oldest queue is drained lose a record
//! - Maintenance windows open exactly at the hours they list

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mapping_gc::gc::{AlwaysOpen, PassEnv, StopSignal};
use mapping_gc::models::{TopicOffset, TopicStatsTable};
use mapping_gc::rpc::{ResponseBody, RpcRequest, RpcResponse};
use mapping_gc::{
    BrokerClient, DailyWindow, ExpiredGenerationReclaimer, GenerationRecord,
    InMemoryMappingManager, LeaderTailPolicy, MappingManager, MessageQueue, QueueMappingDetail,
    Result, RpcGateway,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const BROKERS: [&str; 3] = ["broker-b", "broker-c", "broker-d"];

/// Every broker answers with the same stats table.
struct StatsGateway(TopicStatsTable);

#[async_trait]
impl RpcGateway for StatsGateway {
    async fn invoke(&self, _request: RpcRequest, _timeout: Duration) -> Result<RpcResponse> {
        Ok(RpcResponse::ok(ResponseBody::TopicStats(self.0.clone())))
    }
}

/// One chain per queue: `len` generations, the oldest on `BROKERS[host]`,
/// the leader always local.
fn arb_chains() -> impl Strategy<Value = Vec<(usize, usize, bool)>> {
    prop::collection::vec((1usize..4, 0usize..3, any::<bool>()), 1..6)
}

fn build(chains: &[(usize, usize, bool)]) -> (QueueMappingDetail, TopicStatsTable) {
    let mut detail = QueueMappingDetail::new("orders", 8, "broker-a", 1);
    let mut stats = TopicStatsTable::new();
    for (queue_id, (len, host, drained)) in chains.iter().enumerate() {
        let queue_id = u32::try_from(queue_id).unwrap();
        let mut chain = Vec::new();
        for generation in 0..*len {
            let bname = if generation + 1 == *len {
                "broker-a"
            } else {
                BROKERS[*host]
            };
            let generation = i32::try_from(generation).unwrap();
            chain.push(GenerationRecord::new(generation, queue_id, bname, i64::from(generation) * 10));
        }
        let oldest = &chain[0];
        let offset = if *drained {
            TopicOffset::new(7, 7)
        } else {
            TopicOffset::new(0, 7)
        };
        stats = stats.with_offset(
            MessageQueue::new("orders", oldest.bname.clone(), oldest.queue_id),
            offset,
        );
        detail = detail.with_chain(queue_id, chain);
    }
    (detail, stats)
}

fn run_reclaimer(detail: QueueMappingDetail, stats: TopicStatsTable) -> QueueMappingDetail {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async move {
        let manager = Arc::new(InMemoryMappingManager::new("broker-a"));
        manager.insert(detail);
        let env = PassEnv::new(manager.clone(), Arc::new(AlwaysOpen), Duration::ZERO);
        let client = BrokerClient::new(Arc::new(StatsGateway(stats)), Duration::from_secs(1));
        let reclaimer = ExpiredGenerationReclaimer::new(env, client, Arc::new(LeaderTailPolicy));
        reclaimer.run_once(&StopSignal::never()).await;
        (*manager.get("orders").unwrap()).clone()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: a pass removes at most the oldest record of each chain and
    /// never its leader.
    #[test]
    fn prop_reclaimer_trims_at_most_one_record(chains in arb_chains()) {
        let (before, stats) = build(&chains);
        let after = run_reclaimer(before.clone(), stats);

        for (queue_id, old) in &before.hosted_queues {
            let new = after.chain(*queue_id).unwrap();
            prop_assert!(new.len() == old.len() || new.len() + 1 == old.len());
            prop_assert_eq!(new.last(), old.last());
            prop_assert!(!new.is_empty());
        }
    }

    /// Property: a record is removed exactly when its chain has history and
    /// the oldest queue is drained.
    #[test]
    fn prop_only_drained_generations_are_removed(chains in arb_chains()) {
        let (before, stats) = build(&chains);
        let after = run_reclaimer(before.clone(), stats);

        for (queue_id, (len, _, drained)) in chains.iter().enumerate() {
            let queue_id = u32::try_from(queue_id).unwrap();
            let expected = if *len > 1 && *drained { len - 1 } else { *len };
            prop_assert_eq!(after.chain(queue_id).unwrap().len(), expected);
        }
    }

    /// Property: a daily window opens exactly at its listed hours.
    #[test]
    fn prop_daily_window_matches_listed_hours(hours in prop::collection::btree_set(0u32..24, 0..6), hour in 0u32..24) {
        let when = hours
            .iter()
            .map(|h| format!("{h:02}"))
            .collect::<Vec<_>>()
            .join(";");
        let window = DailyWindow::parse(&when);
        let at = Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap();

        prop_assert_eq!(window.hours(), &hours.iter().copied().collect::<BTreeSet<_>>());
        prop_assert_eq!(window.is_open_at(&at), hours.contains(&hour));
    }

    /// Property: drained iff nothing is left between min and max, or the
    /// queue was never written.
    #[test]
    fn prop_drained_definition(min in 0i64..1000, max in 0i64..1000) {
        let offset = TopicOffset::new(min, max);
        prop_assert_eq!(offset.is_drained(), min == max || max == 0);
    }
}
