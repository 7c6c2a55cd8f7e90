//! Remote broker access.
//!
//! The transport itself is external: [`RpcGateway`] is the seam through which
//! requests leave this broker. [`BrokerClient`] layers the two typed calls the
//! cleanup passes need on top of it, enforcing the RPC timeout locally and
//! turning remote exceptions or unexpected bodies into errors.

mod route;

pub use route::{RealLeader, RouteResolver, RouteSnapshot};

use crate::models::{TopicConfigAndQueueMapping, TopicStatsTable};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Kind of request sent to a remote broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCode {
    /// Per-queue min/max offsets of a topic.
    GetTopicStatsInfo,
    /// Topic config plus the broker's mapping detail.
    GetTopicConfig,
}

/// Header of a request addressed to one broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    /// Topic the request is about.
    pub topic: String,
    /// Broker the request is addressed to.
    pub bname: String,
    /// Whether the request targets logical (static) queue state.
    pub lo: bool,
}

/// Request sent through the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcRequest {
    /// Request kind.
    pub code: RequestCode,
    /// Request header.
    pub header: RequestHeader,
    /// Opaque body, unused by the requests issued here.
    pub body: Option<Vec<u8>>,
}

impl RpcRequest {
    /// Builds a request without body.
    #[must_use]
    pub fn new(code: RequestCode, topic: &str, bname: &str, lo: bool) -> Self {
        Self {
            code,
            header: RequestHeader {
                topic: topic.to_string(),
                bname: bname.to_string(),
                lo,
            },
            body: None,
        }
    }
}

/// Decoded body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Answer to [`RequestCode::GetTopicStatsInfo`].
    TopicStats(TopicStatsTable),
    /// Answer to [`RequestCode::GetTopicConfig`].
    TopicConfigAndMapping(TopicConfigAndQueueMapping),
}

/// Response returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RpcResponse {
    /// Remote exception text, if the remote call failed.
    pub remark: Option<String>,
    /// Decoded body.
    pub body: Option<ResponseBody>,
}

impl RpcResponse {
    /// Successful response with a body.
    #[must_use]
    pub const fn ok(body: ResponseBody) -> Self {
        Self {
            remark: None,
            body: Some(body),
        }
    }

    /// Failed response carrying the remote exception.
    #[must_use]
    pub fn failure(remark: impl Into<String>) -> Self {
        Self {
            remark: Some(remark.into()),
            body: None,
        }
    }
}

/// Request/response channel to other brokers.
#[async_trait]
pub trait RpcGateway: Send + Sync {
    /// Sends a request to the broker named in its header.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be delivered or answered.
    async fn invoke(&self, request: RpcRequest, timeout: Duration) -> Result<RpcResponse>;
}

/// Typed client over an [`RpcGateway`].
#[derive(Clone)]
pub struct BrokerClient {
    gateway: Arc<dyn RpcGateway>,
    timeout: Duration,
}

impl BrokerClient {
    /// Creates a client with the given per-call timeout.
    #[must_use]
    pub fn new(gateway: Arc<dyn RpcGateway>, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    /// Per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches the offset table of `topic` from `broker`.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, remote failure or a body of the wrong kind.
    #[instrument(skip(self), fields(component = "rpc"))]
    pub async fn topic_stats(&self, topic: &str, broker: &str) -> Result<TopicStatsTable> {
        let request = RpcRequest::new(RequestCode::GetTopicStatsInfo, topic, broker, false);
        match self.call(request).await? {
            ResponseBody::TopicStats(table) => Ok(table),
            ResponseBody::TopicConfigAndMapping(_) => Err(Error::MalformedResponse {
                broker: broker.to_string(),
                reason: "expected topic stats, got topic config".to_string(),
            }),
        }
    }

    /// Fetches the topic config and mapping detail of `topic` from `broker`.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, remote failure or a body of the wrong kind.
    #[instrument(skip(self), fields(component = "rpc"))]
    pub async fn topic_config_and_mapping(
        &self,
        topic: &str,
        broker: &str,
    ) -> Result<TopicConfigAndQueueMapping> {
        let request = RpcRequest::new(RequestCode::GetTopicConfig, topic, broker, true);
        match self.call(request).await? {
            ResponseBody::TopicConfigAndMapping(config) => Ok(config),
            ResponseBody::TopicStats(_) => Err(Error::MalformedResponse {
                broker: broker.to_string(),
                reason: "expected topic config, got topic stats".to_string(),
            }),
        }
    }

    async fn call(&self, request: RpcRequest) -> Result<ResponseBody> {
        let broker = request.header.bname.clone();
        let code = request.code;

        let response = tokio::time::timeout(self.timeout, self.gateway.invoke(request, self.timeout))
            .await
            .map_err(|_| Error::RpcTimeout {
                broker: broker.clone(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        if let Some(remark) = response.remark {
            return Err(Error::RemoteFailure { broker, remark });
        }
        debug!(broker = %broker, ?code, "Remote call answered");
        response.body.ok_or_else(|| Error::MalformedResponse {
            broker,
            reason: "response carried no body".to_string(),
        })
    }
}

impl std::fmt::Debug for BrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
