//! Topic route resolution.

use crate::Result;
use crate::models::MessageQueue;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Outcome of resolving which broker leads a logical queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RealLeader {
    /// Routing assigns the queue to this broker.
    Resolved(String),
    /// Routing has not converged for the queue.
    Unresolved,
}

impl RealLeader {
    /// Returns the broker name if resolved.
    #[must_use]
    pub fn broker(&self) -> Option<&str> {
        match self {
            Self::Resolved(name) => Some(name),
            Self::Unresolved => None,
        }
    }
}

/// Route of one topic as seen by the cluster's routing layer.
///
/// Maps logical queue ids to the broker currently owning them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSnapshot {
    topic: String,
    endpoints: HashMap<u32, String>,
}

impl RouteSnapshot {
    /// Creates an empty route for a topic.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            endpoints: HashMap::new(),
        }
    }

    /// Assigns a logical queue to a broker.
    #[must_use]
    pub fn with_endpoint(mut self, queue_id: u32, broker: impl Into<String>) -> Self {
        self.endpoints.insert(queue_id, broker.into());
        self
    }

    /// Topic the route belongs to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Resolves the broker owning a queue.
    ///
    /// Physical addresses resolve to their own broker. Logical addresses are
    /// looked up in the route; a logical queue missing from it, or one the
    /// route still maps onto the placeholder, is [`RealLeader::Unresolved`].
    #[must_use]
    pub fn broker_for(&self, queue: &MessageQueue) -> RealLeader {
        if !queue.is_logical() {
            return RealLeader::Resolved(queue.broker_name.clone());
        }
        if queue.topic != self.topic {
            return RealLeader::Unresolved;
        }
        match self.endpoints.get(&queue.queue_id) {
            Some(broker) if broker != crate::models::LOGICAL_QUEUE_MOCK_BROKER_NAME => {
                RealLeader::Resolved(broker.clone())
            },
            _ => RealLeader::Unresolved,
        }
    }
}

/// Source of topic routes.
#[async_trait]
pub trait RouteResolver: Send + Sync {
    /// Fetches the current route of a topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the route cannot be fetched within `timeout`.
    async fn topic_route(&self, topic: &str, timeout: Duration) -> Result<RouteSnapshot>;
}
