//! Fakes shared by the gc unit tests.

use crate::gc::window::MaintenanceWindow;
use crate::models::{
    QueueMappingDetail, TopicConfig, TopicConfigAndQueueMapping, TopicStatsTable,
};
use crate::rpc::{
    RequestCode, ResponseBody, RouteResolver, RouteSnapshot, RpcGateway, RpcRequest, RpcResponse,
};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Gateway answering from per-broker tables and recording every request.
#[derive(Default)]
pub struct ScriptedGateway {
    stats: HashMap<String, TopicStatsTable>,
    details: HashMap<String, QueueMappingDetail>,
    failing: HashSet<String>,
    requests: Mutex<Vec<RpcRequest>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stats(mut self, broker: &str, table: TopicStatsTable) -> Self {
        self.stats.insert(broker.to_string(), table);
        self
    }

    pub fn with_detail(mut self, broker: &str, detail: QueueMappingDetail) -> Self {
        self.details.insert(broker.to_string(), detail);
        self
    }

    pub fn failing(mut self, broker: &str) -> Self {
        self.failing.insert(broker.to_string());
        self
    }

    pub fn requests(&self) -> Vec<RpcRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn brokers_called(&self, code: RequestCode) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.code == code)
            .map(|r| r.header.bname)
            .collect()
    }
}

#[async_trait]
impl RpcGateway for ScriptedGateway {
    async fn invoke(&self, request: RpcRequest, _timeout: Duration) -> Result<RpcResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let broker = request.header.bname.as_str();
        if self.failing.contains(broker) {
            return Err(Error::OperationFailed {
                operation: "invoke".to_string(),
                cause: format!("connection to {broker} refused"),
            });
        }
        let response = match request.code {
            RequestCode::GetTopicStatsInfo => self.stats.get(broker).map_or_else(
                || RpcResponse::failure("topic not exist"),
                |table| RpcResponse::ok(ResponseBody::TopicStats(table.clone())),
            ),
            RequestCode::GetTopicConfig => {
                let config = TopicConfigAndQueueMapping {
                    topic_config: TopicConfig::new(request.header.topic.clone(), 8),
                    mapping_detail: self.details.get(broker).cloned(),
                };
                RpcResponse::ok(ResponseBody::TopicConfigAndMapping(config))
            },
        };
        Ok(response)
    }
}

/// Route resolver serving fixed routes and counting lookups.
#[derive(Default)]
pub struct FixedRoutes {
    routes: HashMap<String, RouteSnapshot>,
    lookups: Mutex<Vec<String>>,
}

impl FixedRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, route: RouteSnapshot) -> Self {
        self.routes.insert(route.topic().to_string(), route);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl RouteResolver for FixedRoutes {
    async fn topic_route(&self, topic: &str, _timeout: Duration) -> Result<RouteSnapshot> {
        self.lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(topic.to_string());
        self.routes
            .get(topic)
            .cloned()
            .ok_or_else(|| Error::OperationFailed {
                operation: "topic_route".to_string(),
                cause: format!("no route for {topic}"),
            })
    }
}

/// Window that never opens.
pub struct ClosedWindow;

impl MaintenanceWindow for ClosedWindow {
    fn is_open(&self) -> bool {
        false
    }
}
