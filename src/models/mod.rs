//! Data models for the queue mapping table.
//!
//! This module contains the placement records, per-topic mapping details and
//! the remote-facing value types exchanged with other brokers.

mod mapping;
mod queue;

pub use mapping::{
    Chain, DataVersion, GLOBAL_SCOPE, GenerationRecord, MappingTable, QueueMappingDetail,
    earliest, leader,
};
pub use queue::{
    LOGICAL_QUEUE_MOCK_BROKER_NAME, MessageQueue, TopicConfig, TopicConfigAndQueueMapping,
    TopicOffset, TopicStatsTable,
};
