//! Stale-leader reconciler.
//!
//! A broker may keep a chain for a logical queue whose leadership has since
//! moved to another broker. The chain is only dropped once the real leader,
//! resolved through routing, confirms with its own mapping detail: same plan
//! (total queues and epoch) and a chain whose tail is that leader.

use super::stop::StopSignal;
use super::topic_pass::{PassEnv, PassReport, TopicPass, run_topic_pass};
use crate::Result;
use crate::models::{MessageQueue, QueueMappingDetail, leader};
use crate::rpc::{BrokerClient, RealLeader, RouteResolver};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Removes chains whose leadership has been confirmed to live elsewhere.
pub struct StaleLeaderReconciler {
    env: PassEnv,
    client: BrokerClient,
    resolver: Arc<dyn RouteResolver>,
}

impl StaleLeaderReconciler {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(env: PassEnv, client: BrokerClient, resolver: Arc<dyn RouteResolver>) -> Self {
        Self {
            env,
            client,
            resolver,
        }
    }

    /// Runs one pass over the table.
    #[instrument(
        name = "mapping_gc.stale_leader",
        skip_all,
        fields(component = "gc", operation = "stale_leader")
    )]
    pub async fn run_once(&self, stop: &StopSignal) -> PassReport {
        run_topic_pass(self, &self.env, stop).await
    }

    /// Fetches the mapping detail each broker holds for `topic`, keeping only
    /// answers the broker gives about itself.
    async fn fetch_remote_details<'a>(
        &self,
        topic: &str,
        brokers: BTreeSet<&'a str>,
    ) -> HashMap<&'a str, QueueMappingDetail> {
        let mut details = HashMap::with_capacity(brokers.len());
        for broker in brokers {
            let config = match self.client.topic_config_and_mapping(topic, broker).await {
                Ok(config) => config,
                Err(e) => {
                    error!(topic, broker, error = %e, "Failed to fetch remote mapping detail");
                    continue;
                },
            };
            match config.mapping_detail {
                Some(remote) if remote.bname == broker => {
                    details.insert(broker, remote);
                },
                Some(remote) => {
                    warn!(
                        topic,
                        broker,
                        reported_owner = %remote.bname,
                        "Remote mapping detail names another owner, ignoring"
                    );
                },
                None => debug!(topic, broker, "Remote broker holds no mapping detail"),
            }
        }
        details
    }
}

impl std::fmt::Debug for StaleLeaderReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaleLeaderReconciler")
            .field("env", &self.env)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TopicPass for StaleLeaderReconciler {
    fn name(&self) -> &'static str {
        "stale_leader"
    }

    async fn clean_topic(&self, detail: &QueueMappingDetail) -> Result<Option<QueueMappingDetail>> {
        let topic = detail.topic.as_str();

        let local_leaders: BTreeMap<u32, &str> = detail
            .hosted_queues
            .iter()
            .filter_map(|(queue_id, chain)| {
                leader(chain)
                    .filter(|record| record.bname != detail.bname)
                    .map(|record| (*queue_id, record.bname.as_str()))
            })
            .collect();
        if local_leaders.is_empty() {
            return Ok(None);
        }

        let route = self.resolver.topic_route(topic, self.client.timeout()).await?;
        let real_leaders: BTreeMap<u32, RealLeader> = local_leaders
            .keys()
            .map(|queue_id| (*queue_id, route.broker_for(&MessageQueue::logical(topic, *queue_id))))
            .collect();

        let brokers: BTreeSet<&str> = real_leaders.values().filter_map(RealLeader::broker).collect();
        let remote_details = self.fetch_remote_details(topic, brokers).await;

        let mut stale = Vec::new();
        for (queue_id, local_leader) in &local_leaders {
            let Some(real_leader) = real_leaders.get(queue_id).and_then(RealLeader::broker) else {
                debug!(topic, queue_id, "Real leader unresolved, keeping chain");
                continue;
            };
            let Some(remote) = remote_details.get(real_leader) else {
                continue;
            };
            if !remote.same_plan_as(detail) {
                debug!(
                    topic,
                    queue_id,
                    local_epoch = detail.epoch,
                    remote_epoch = remote.epoch,
                    "Remote plan differs, keeping chain"
                );
                continue;
            }
            let confirmed = remote
                .chain(*queue_id)
                .and_then(|chain| leader(chain))
                .is_some_and(|record| record.bname == real_leader);
            if confirmed && real_leader != *local_leader {
                stale.push(*queue_id);
            }
        }

        if stale.is_empty() {
            return Ok(None);
        }
        let mut replacement = detail.clone();
        for queue_id in stale {
            if let Some(chain) = replacement.hosted_queues.remove(&queue_id) {
                info!(topic, queue_id, records = chain.len(), chain = ?chain, "Removing stale leader chain");
            }
        }
        Ok(Some(replacement))
    }
}
