//! Expired-generation reclaimer.
//!
//! Each reassignment of a logical queue appends a generation to its chain.
//! Once the broker hosting the oldest generation reports the backing queue as
//! drained, that generation no longer serves any reader and is dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use mapping_gc::gc::{DailyWindow, ExpiredGenerationReclaimer, LeaderTailPolicy, PassEnv, StopSignal};
//! use std::sync::Arc;
//!
//! let env = PassEnv::new(manager, Arc::new(DailyWindow::parse("04")), throttle);
//! let reclaimer = ExpiredGenerationReclaimer::new(env, client, Arc::new(LeaderTailPolicy));
//! let report = reclaimer.run_once(&StopSignal::never()).await;
//! println!("{}", report.summary());
//! ```

use super::eligibility::ChainEligibility;
use super::stop::StopSignal;
use super::topic_pass::{PassEnv, PassReport, TopicPass, run_topic_pass};
use crate::Result;
use crate::models::{Chain, MessageQueue, QueueMappingDetail, TopicStatsTable, earliest};
use crate::rpc::BrokerClient;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Drops the oldest generation of chains whose backing queue is drained.
pub struct ExpiredGenerationReclaimer {
    env: PassEnv,
    client: BrokerClient,
    eligibility: Arc<dyn ChainEligibility>,
}

impl ExpiredGenerationReclaimer {
    /// Creates a reclaimer.
    #[must_use]
    pub fn new(env: PassEnv, client: BrokerClient, eligibility: Arc<dyn ChainEligibility>) -> Self {
        Self {
            env,
            client,
            eligibility,
        }
    }

    /// Runs one pass over the table.
    ///
    /// Outside the maintenance window this returns immediately without any
    /// remote call.
    #[instrument(
        name = "mapping_gc.expired_generation",
        skip_all,
        fields(component = "gc", operation = "expired_generation")
    )]
    pub async fn run_once(&self, stop: &StopSignal) -> PassReport {
        run_topic_pass(self, &self.env, stop).await
    }

    async fn fetch_stats<'a>(
        &self,
        topic: &str,
        brokers: BTreeSet<&'a str>,
    ) -> HashMap<&'a str, TopicStatsTable> {
        let mut stats = HashMap::with_capacity(brokers.len());
        for broker in brokers {
            match self.client.topic_stats(topic, broker).await {
                Ok(table) => {
                    stats.insert(broker, table);
                },
                Err(e) => {
                    error!(topic, broker, error = %e, "Failed to fetch topic stats, skipping dependent queues");
                },
            }
        }
        stats
    }
}

impl std::fmt::Debug for ExpiredGenerationReclaimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiredGenerationReclaimer")
            .field("env", &self.env)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TopicPass for ExpiredGenerationReclaimer {
    fn name(&self) -> &'static str {
        "expired_generation"
    }

    async fn clean_topic(&self, detail: &QueueMappingDetail) -> Result<Option<QueueMappingDetail>> {
        let topic = detail.topic.as_str();

        let candidates: Vec<(u32, &Chain)> = detail
            .hosted_queues
            .iter()
            .filter(|(_, chain)| chain.len() > 1)
            .filter(|(_, chain)| self.eligibility.is_eligible(chain, detail))
            .map(|(queue_id, chain)| (*queue_id, chain))
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        let brokers: BTreeSet<&str> = candidates
            .iter()
            .filter_map(|(_, chain)| earliest(chain))
            .map(|record| record.bname.as_str())
            .collect();
        let stats = self.fetch_stats(topic, brokers).await;

        let mut trimmed: BTreeMap<u32, Chain> = BTreeMap::new();
        for (queue_id, chain) in candidates {
            let Some(oldest) = earliest(chain) else {
                continue;
            };
            let Some(table) = stats.get(oldest.bname.as_str()) else {
                continue;
            };
            let queue = MessageQueue::new(topic, oldest.bname.as_str(), oldest.queue_id);
            let Some(offset) = table.offset(&queue) else {
                error!(topic, queue = %queue, "Topic stats carry no entry for the oldest generation");
                continue;
            };
            if !offset.is_drained() {
                debug!(
                    topic,
                    queue_id,
                    min_offset = offset.min_offset,
                    max_offset = offset.max_offset,
                    "Oldest generation still holds data"
                );
                continue;
            }
            info!(
                topic,
                queue_id,
                generation = oldest.generation,
                bname = %oldest.bname,
                min_offset = offset.min_offset,
                max_offset = offset.max_offset,
                "Removing expired generation"
            );
            trimmed.insert(queue_id, chain[1..].to_vec());
        }

        if trimmed.is_empty() {
            return Ok(None);
        }
        let mut replacement = detail.clone();
        replacement.hosted_queues.extend(trimmed);
        Ok(Some(replacement))
    }
}
