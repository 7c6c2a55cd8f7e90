//! # mapping-gc
//!
//! Background garbage collector for the static topic queue mapping table of a
//! messaging broker.
//!
//! A static topic keeps a stable logical identity for each of its queues while
//! the physical placement behind a queue moves between brokers. Every move
//! appends a generation to the queue's chain. This crate reclaims the
//! bookkeeping that those moves leave behind:
//!
//! - the oldest generation of a chain, once the broker that hosted it reports
//!   the backing queue as drained;
//! - an entire chain, once the real leader of the queue has confirmed through
//!   its own mapping detail that leadership moved on without this broker.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mapping_gc::config::GcConfig;
//! use mapping_gc::gc::CleanupScheduler;
//! use mapping_gc::storage::InMemoryMappingManager;
//! use std::sync::Arc;
//!
//! let config = GcConfig::from_env();
//! let manager = Arc::new(InMemoryMappingManager::new(config.node_name.clone()));
//! let scheduler = CleanupScheduler::from_config(&config, manager, gateway, resolver);
//! let handle = scheduler.spawn();
//! // ...
//! handle.shutdown().await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod gc;
pub mod models;
pub mod observability;
pub mod rpc;
pub mod storage;

pub use config::GcConfig;
pub use gc::{
    ChainEligibility, CleanupScheduler, DailyWindow, ExpiredGenerationReclaimer, LeaderTailPolicy,
    MaintenanceWindow, PassReport, SchedulerHandle, StaleLeaderReconciler,
};
pub use models::{DataVersion, GenerationRecord, MessageQueue, QueueMappingDetail};
pub use rpc::{BrokerClient, RealLeader, RouteResolver, RouteSnapshot, RpcGateway};
pub use storage::{CommitOptions, FileMappingManager, InMemoryMappingManager, MappingManager};

/// Error type for mapping-gc operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `OperationFailed` | I/O, serialization or task failures |
/// | `RpcTimeout` | A remote broker did not answer within the RPC timeout |
/// | `RemoteFailure` | A remote broker answered with an exception |
/// | `MalformedResponse` | A response carried no body or the wrong body kind |
/// | `OwnerMismatch` | A detail is owned by a broker other than the expected one |
/// | `StaleEpoch` | A commit would move a topic back to an older epoch |
/// | `InvalidChain` | A chain's generations are not strictly increasing |
#[derive(Debug, ThisError)]
pub enum Error {
    /// An operation failed.
    ///
    /// Raised when:
    /// - The mapping table cannot be written to or read from disk
    /// - Serialization of the table fails
    /// - A background pass task could not be joined
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A remote call exceeded its timeout.
    #[error("rpc to broker '{broker}' timed out after {timeout_ms}ms")]
    RpcTimeout {
        /// The broker that was queried.
        broker: String,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// A remote broker reported an exception.
    #[error("broker '{broker}' reported failure: {remark}")]
    RemoteFailure {
        /// The broker that was queried.
        broker: String,
        /// Remote exception text.
        remark: String,
    },

    /// A remote response could not be interpreted.
    #[error("malformed response from broker '{broker}': {reason}")]
    MalformedResponse {
        /// The broker that was queried.
        broker: String,
        /// Why the response was rejected.
        reason: String,
    },

    /// A mapping detail is owned by an unexpected broker.
    #[error("mapping detail for topic '{topic}' is owned by '{actual}', expected '{expected}'")]
    OwnerMismatch {
        /// Topic of the detail.
        topic: String,
        /// Broker that should own the detail.
        expected: String,
        /// Broker the detail claims as owner.
        actual: String,
    },

    /// A commit carried an epoch older than the stored one.
    #[error("topic '{topic}' cannot accept epoch {proposed} < {current}")]
    StaleEpoch {
        /// Topic of the detail.
        topic: String,
        /// Stored epoch.
        current: i64,
        /// Epoch of the rejected detail.
        proposed: i64,
    },

    /// A chain violates its ordering invariant.
    #[error("invalid chain for topic '{topic}' queue {queue_id}: {reason}")]
    InvalidChain {
        /// Topic of the detail.
        topic: String,
        /// Logical queue id.
        queue_id: u32,
        /// What is wrong with the chain.
        reason: String,
    },
}

/// Result type alias for mapping-gc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
