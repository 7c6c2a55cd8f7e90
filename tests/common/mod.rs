//! Simulated cluster used by the integration tests.
//!
//! Every broker of the cluster is an [`InMemoryMappingManager`] plus a stats
//! table; the gateway answers requests from that state, the way a real
//! broker would.

#![allow(dead_code)]

use async_trait::async_trait;
use mapping_gc::models::{TopicConfig, TopicConfigAndQueueMapping, TopicStatsTable};
use mapping_gc::rpc::{RequestCode, ResponseBody, RpcRequest, RpcResponse};
use mapping_gc::{
    Error, InMemoryMappingManager, MappingManager, Result, RouteResolver, RouteSnapshot,
    RpcGateway,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Maintenance hours covering the whole day.
pub const ALL_HOURS: &str = "0;1;2;3;4;5;6;7;8;9;10;11;12;13;14;15;16;17;18;19;20;21;22;23";

/// Remote brokers of the simulated cluster.
#[derive(Default)]
pub struct Cluster {
    managers: HashMap<String, Arc<InMemoryMappingManager>>,
    stats: Mutex<HashMap<String, TopicStatsTable>>,
    calls: AtomicUsize,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_broker(mut self, manager: Arc<InMemoryMappingManager>) -> Self {
        self.managers
            .insert(manager.node_name().to_string(), manager);
        self
    }

    pub fn set_stats(&self, broker: &str, table: TopicStatsTable) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(broker.to_string(), table);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcGateway for Cluster {
    async fn invoke(&self, request: RpcRequest, _timeout: Duration) -> Result<RpcResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let broker = request.header.bname.as_str();
        let topic = request.header.topic.as_str();
        let Some(manager) = self.managers.get(broker) else {
            return Err(Error::OperationFailed {
                operation: "connect".to_string(),
                cause: format!("unknown broker {broker}"),
            });
        };

        let response = match request.code {
            RequestCode::GetTopicStatsInfo => {
                let stats = self
                    .stats
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(broker)
                    .cloned();
                stats.map_or_else(
                    || RpcResponse::failure(format!("topic {topic} not exist")),
                    |table| RpcResponse::ok(ResponseBody::TopicStats(table)),
                )
            },
            RequestCode::GetTopicConfig => {
                let config = TopicConfigAndQueueMapping {
                    topic_config: TopicConfig::new(topic, 8),
                    mapping_detail: manager.get(topic).map(|detail| (*detail).clone()),
                };
                RpcResponse::ok(ResponseBody::TopicConfigAndMapping(config))
            },
        };
        Ok(response)
    }
}

/// Routes served from a fixed table.
#[derive(Default)]
pub struct StaticRoutes {
    routes: HashMap<String, RouteSnapshot>,
}

impl StaticRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, route: RouteSnapshot) -> Self {
        self.routes.insert(route.topic().to_string(), route);
        self
    }
}

#[async_trait]
impl RouteResolver for StaticRoutes {
    async fn topic_route(&self, topic: &str, _timeout: Duration) -> Result<RouteSnapshot> {
        Ok(self
            .routes
            .get(topic)
            .cloned()
            .unwrap_or_else(|| RouteSnapshot::new(topic)))
    }
}

/// Polls `check` until it holds or roughly two seconds have passed.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
