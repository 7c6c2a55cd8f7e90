//! Generation records, chains and per-topic mapping details.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Scope shared by every static topic that is not explicitly scoped.
pub const GLOBAL_SCOPE: &str = "__global__";

/// One physical placement of a logical queue.
///
/// Records are created by the reassignment planner and never modified
/// afterwards; cleanup only ever drops them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    /// Generation number within the chain.
    #[serde(rename = "gen")]
    pub generation: i32,
    /// Physical queue index on the hosting broker.
    pub queue_id: u32,
    /// Name of the broker hosting this placement.
    pub bname: String,
    /// Logical offset at which this placement starts.
    #[serde(default)]
    pub logic_offset: i64,
    /// Physical offset at which this placement starts.
    #[serde(default)]
    pub start_offset: i64,
    /// Physical offset at which this placement ends, `-1` while open.
    #[serde(default = "open_offset")]
    pub end_offset: i64,
    /// Millisecond timestamp the placement became leader, `-1` if unknown.
    #[serde(default = "open_offset")]
    pub time_of_start: i64,
    /// Millisecond timestamp the placement stopped being leader, `-1` while open.
    #[serde(default = "open_offset")]
    pub time_of_end: i64,
}

const fn open_offset() -> i64 {
    -1
}

impl GenerationRecord {
    /// Creates an open record with the given placement.
    #[must_use]
    pub fn new(generation: i32, queue_id: u32, bname: impl Into<String>, logic_offset: i64) -> Self {
        Self {
            generation,
            queue_id,
            bname: bname.into(),
            logic_offset,
            start_offset: 0,
            end_offset: -1,
            time_of_start: -1,
            time_of_end: -1,
        }
    }

    /// Sets the physical start/end boundary.
    #[must_use]
    pub const fn with_offsets(mut self, start_offset: i64, end_offset: i64) -> Self {
        self.start_offset = start_offset;
        self.end_offset = end_offset;
        self
    }

    /// Returns `true` if the placement still accepts writes (no end offset).
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end_offset < 0
    }
}

/// Ordered history of placements for one logical queue.
///
/// Index 0 is the oldest surviving placement, the last element is the leader.
pub type Chain = Vec<GenerationRecord>;

/// Returns the leader (last record) of a chain.
#[must_use]
pub fn leader(chain: &[GenerationRecord]) -> Option<&GenerationRecord> {
    chain.last()
}

/// Returns the oldest surviving record of a chain.
#[must_use]
pub fn earliest(chain: &[GenerationRecord]) -> Option<&GenerationRecord> {
    chain.first()
}

/// Per-topic mapping owned by one broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMappingDetail {
    /// Topic name.
    pub topic: String,
    /// Scope of the topic.
    #[serde(default = "global_scope")]
    pub scope: String,
    /// Total number of logical queues of the topic.
    pub total_queues: u32,
    /// Name of the owning broker.
    pub bname: String,
    /// Reassignment plan version.
    pub epoch: i64,
    /// Chains hosted by this broker, keyed by logical queue id.
    #[serde(default)]
    pub hosted_queues: BTreeMap<u32, Chain>,
}

fn global_scope() -> String {
    GLOBAL_SCOPE.to_string()
}

impl QueueMappingDetail {
    /// Creates a detail with no hosted queues.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        total_queues: u32,
        bname: impl Into<String>,
        epoch: i64,
    ) -> Self {
        Self {
            topic: topic.into(),
            scope: global_scope(),
            total_queues,
            bname: bname.into(),
            epoch,
            hosted_queues: BTreeMap::new(),
        }
    }

    /// Adds a chain for a logical queue.
    #[must_use]
    pub fn with_chain(mut self, queue_id: u32, chain: Chain) -> Self {
        self.hosted_queues.insert(queue_id, chain);
        self
    }

    /// Returns the chain of a logical queue, if hosted.
    #[must_use]
    pub fn chain(&self, queue_id: u32) -> Option<&Chain> {
        self.hosted_queues.get(&queue_id)
    }

    /// Returns `true` if the two details describe the same plan snapshot.
    #[must_use]
    pub fn same_plan_as(&self, other: &Self) -> bool {
        self.total_queues == other.total_queues && self.epoch == other.epoch
    }
}

/// Version stamp of the whole mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataVersion {
    /// Millisecond timestamp of the last change.
    pub timestamp: u64,
    /// Number of changes applied.
    pub counter: u64,
}

impl DataVersion {
    /// Advances the version after a table change.
    pub fn next_version(&mut self) {
        self.counter += 1;
        self.timestamp = crate::current_timestamp_millis();
    }
}

/// Point-in-time view of a broker's mapping table.
pub type MappingTable = BTreeMap<String, Arc<QueueMappingDetail>>;
