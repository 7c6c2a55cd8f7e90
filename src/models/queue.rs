//! Queue addresses and the value types returned by remote brokers.

use super::QueueMappingDetail;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Placeholder broker name used to address a logical queue before routing
/// has mapped it onto a physical broker.
pub const LOGICAL_QUEUE_MOCK_BROKER_NAME: &str = "__syslo__none__";

/// Address of a queue: topic, hosting broker and queue index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQueue {
    /// Topic name.
    pub topic: String,
    /// Hosting broker, or the logical placeholder.
    pub broker_name: String,
    /// Queue index on that broker.
    pub queue_id: u32,
}

impl MessageQueue {
    /// Creates a physical queue address.
    #[must_use]
    pub fn new(topic: impl Into<String>, broker_name: impl Into<String>, queue_id: u32) -> Self {
        Self {
            topic: topic.into(),
            broker_name: broker_name.into(),
            queue_id,
        }
    }

    /// Creates the address of a logical queue through the placeholder broker.
    #[must_use]
    pub fn logical(topic: impl Into<String>, queue_id: u32) -> Self {
        Self::new(topic, LOGICAL_QUEUE_MOCK_BROKER_NAME, queue_id)
    }

    /// Returns `true` if this addresses a logical queue.
    #[must_use]
    pub fn is_logical(&self) -> bool {
        self.broker_name == LOGICAL_QUEUE_MOCK_BROKER_NAME
    }
}

impl fmt::Display for MessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}#{}", self.topic, self.broker_name, self.queue_id)
    }
}

/// Offset range of one queue as reported by its hosting broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicOffset {
    /// Smallest offset still stored.
    pub min_offset: i64,
    /// Next offset to be written.
    pub max_offset: i64,
    /// Millisecond timestamp of the last write.
    #[serde(default)]
    pub last_update_timestamp: i64,
}

impl TopicOffset {
    /// Creates an offset range.
    #[must_use]
    pub const fn new(min_offset: i64, max_offset: i64) -> Self {
        Self {
            min_offset,
            max_offset,
            last_update_timestamp: 0,
        }
    }

    /// Returns `true` if the queue holds nothing left to consume.
    ///
    /// A negative max offset is not treated as drained.
    #[must_use]
    pub const fn is_drained(&self) -> bool {
        self.max_offset == self.min_offset || self.max_offset == 0
    }
}

/// Per-queue offset ranges of one topic on one broker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicStatsTable {
    /// Offsets keyed by queue address.
    pub offset_table: HashMap<MessageQueue, TopicOffset>,
}

impl TopicStatsTable {
    /// Creates an empty stats table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    #[must_use]
    pub fn with_offset(mut self, queue: MessageQueue, offset: TopicOffset) -> Self {
        self.offset_table.insert(queue, offset);
        self
    }

    /// Looks up the offsets of a queue.
    #[must_use]
    pub fn offset(&self, queue: &MessageQueue) -> Option<&TopicOffset> {
        self.offset_table.get(queue)
    }
}

/// Topic configuration as held by a broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicConfig {
    /// Topic name.
    pub topic_name: String,
    /// Number of readable queues.
    pub read_queue_nums: u32,
    /// Number of writable queues.
    pub write_queue_nums: u32,
    /// Permission bits.
    pub perm: u32,
}

impl TopicConfig {
    /// Creates a read-write topic config with the same read and write queue count.
    #[must_use]
    pub fn new(topic_name: impl Into<String>, queue_nums: u32) -> Self {
        Self {
            topic_name: topic_name.into(),
            read_queue_nums: queue_nums,
            write_queue_nums: queue_nums,
            perm: 6,
        }
    }
}

/// A broker's topic config together with its mapping detail for the topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicConfigAndQueueMapping {
    /// Topic config.
    pub topic_config: TopicConfig,
    /// Mapping detail, absent for non-static topics.
    pub mapping_detail: Option<QueueMappingDetail>,
}
