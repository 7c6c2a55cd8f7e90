//! Mapping manager trait.

use crate::Result;
use crate::models::{DataVersion, MappingTable, QueueMappingDetail};
use std::sync::Arc;

/// Options controlling how a detail is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitOptions {
    /// Replace the stored detail without epoch checks, keeping stored chains
    /// for queue ids the new detail does not mention.
    pub force: bool,
    /// The commit only removes bookkeeping: the new detail replaces the stored
    /// one wholesale and the data version is left for the caller to advance.
    pub clean: bool,
    /// Persist the table right after the commit.
    pub flush: bool,
}

impl CommitOptions {
    /// Options used by cleanup passes: wholesale replace, no version bump,
    /// no flush.
    #[must_use]
    pub const fn cleanup() -> Self {
        Self {
            force: false,
            clean: true,
            flush: false,
        }
    }

    /// Options used by the reassignment planner: merge and flush.
    #[must_use]
    pub const fn update() -> Self {
        Self {
            force: false,
            clean: false,
            flush: true,
        }
    }
}

/// Owner of a broker's mapping table.
///
/// Implementations must make [`commit`](Self::commit) appear atomic to
/// concurrent readers of [`snapshot`](Self::snapshot) and [`get`](Self::get).
pub trait MappingManager: Send + Sync {
    /// Name of the broker this table belongs to.
    fn node_name(&self) -> &str;

    /// Returns a point-in-time copy of the table.
    fn snapshot(&self) -> MappingTable;

    /// Returns the current detail of a topic.
    fn get(&self, topic: &str) -> Option<Arc<QueueMappingDetail>>;

    /// Swaps in a new detail for its topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the detail is owned by another broker, carries an
    /// older epoch than the stored one, or contains a malformed chain.
    fn commit(&self, detail: QueueMappingDetail, options: CommitOptions) -> Result<()>;

    /// Returns the current data version.
    fn data_version(&self) -> DataVersion;

    /// Advances the data version by one.
    fn next_data_version(&self);

    /// Writes the table to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be written.
    fn persist(&self) -> Result<()>;

    /// Returns the names of all topics currently in the table.
    fn topics(&self) -> Vec<String> {
        self.snapshot().into_keys().collect()
    }
}
