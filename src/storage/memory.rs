//! In-memory mapping manager.

use super::traits::{CommitOptions, MappingManager};
use crate::models::{DataVersion, MappingTable, QueueMappingDetail, leader};
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct TableState {
    table: MappingTable,
    data_version: DataVersion,
}

/// Mapping manager keeping the table in memory.
///
/// Each detail is stored behind an `Arc`; a commit replaces the `Arc` under a
/// short write lock, so readers always see either the old or the new detail.
#[derive(Debug)]
pub struct InMemoryMappingManager {
    node_name: String,
    state: RwLock<TableState>,
    persist_calls: AtomicU64,
}

impl InMemoryMappingManager {
    /// Creates an empty manager for the given broker.
    #[must_use]
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            state: RwLock::new(TableState::default()),
            persist_calls: AtomicU64::new(0),
        }
    }

    /// Creates a manager from previously stored contents.
    #[must_use]
    pub fn from_parts(
        node_name: impl Into<String>,
        details: impl IntoIterator<Item = QueueMappingDetail>,
        data_version: DataVersion,
    ) -> Self {
        let table = details
            .into_iter()
            .map(|detail| (detail.topic.clone(), Arc::new(detail)))
            .collect();
        Self {
            node_name: node_name.into(),
            state: RwLock::new(TableState {
                table,
                data_version,
            }),
            persist_calls: AtomicU64::new(0),
        }
    }

    /// Inserts or replaces a detail without any checks.
    ///
    /// Used to seed the table; bypasses commit validation.
    pub fn insert(&self, detail: QueueMappingDetail) {
        let mut state = self.write();
        state.table.insert(detail.topic.clone(), Arc::new(detail));
    }

    /// Number of times [`MappingManager::persist`] was called.
    #[must_use]
    pub fn persist_count(&self) -> u64 {
        self.persist_calls.load(Ordering::SeqCst)
    }

    /// Data version and table read under one lock, so the pair always
    /// describes the same state.
    pub(crate) fn versioned_snapshot(&self) -> (DataVersion, MappingTable) {
        let state = self.read();
        (state.data_version, state.table.clone())
    }

    fn read(&self) -> RwLockReadGuard<'_, TableState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TableState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a commit to the table without touching persistence.
    pub(crate) fn apply_commit(
        &self,
        detail: QueueMappingDetail,
        options: CommitOptions,
    ) -> Result<()> {
        if detail.bname != self.node_name {
            return Err(Error::OwnerMismatch {
                topic: detail.topic,
                expected: self.node_name.clone(),
                actual: detail.bname,
            });
        }
        validate_chains(&detail)?;

        let mut state = self.write();
        let topic = detail.topic.clone();
        let merged = match state.table.get(&topic) {
            None => detail,
            Some(old) if options.force => keep_missing_chains(old, detail),
            Some(old) => {
                if detail.epoch < old.epoch {
                    return Err(Error::StaleEpoch {
                        topic,
                        current: old.epoch,
                        proposed: detail.epoch,
                    });
                }
                if options.clean {
                    detail
                } else {
                    merge_update(old, detail)?
                }
            },
        };

        debug!(
            topic = %topic,
            queues = merged.hosted_queues.len(),
            epoch = merged.epoch,
            clean = options.clean,
            "Committed queue mapping detail"
        );
        state.table.insert(topic, Arc::new(merged));
        if !options.clean {
            state.data_version.next_version();
        }
        Ok(())
    }
}

impl MappingManager for InMemoryMappingManager {
    fn node_name(&self) -> &str {
        &self.node_name
    }

    fn snapshot(&self) -> MappingTable {
        self.read().table.clone()
    }

    fn get(&self, topic: &str) -> Option<Arc<QueueMappingDetail>> {
        self.read().table.get(topic).cloned()
    }

    fn commit(&self, detail: QueueMappingDetail, options: CommitOptions) -> Result<()> {
        self.apply_commit(detail, options)?;
        if options.flush {
            self.persist()?;
        }
        Ok(())
    }

    fn data_version(&self) -> DataVersion {
        self.read().data_version
    }

    fn next_data_version(&self) {
        self.write().data_version.next_version();
    }

    fn persist(&self) -> Result<()> {
        let calls = self.persist_calls.fetch_add(1, Ordering::SeqCst) + 1;
        info!(persist_calls = calls, "In-memory mapping table persisted");
        Ok(())
    }
}

/// Checks that every chain's generations strictly increase.
fn validate_chains(detail: &QueueMappingDetail) -> Result<()> {
    for (queue_id, chain) in &detail.hosted_queues {
        let ordered = chain
            .windows(2)
            .all(|pair| pair[0].generation < pair[1].generation);
        if !ordered {
            return Err(Error::InvalidChain {
                topic: detail.topic.clone(),
                queue_id: *queue_id,
                reason: "generations are not strictly increasing".to_string(),
            });
        }
    }
    Ok(())
}

fn keep_missing_chains(old: &QueueMappingDetail, mut new: QueueMappingDetail) -> QueueMappingDetail {
    for (queue_id, chain) in &old.hosted_queues {
        new.hosted_queues
            .entry(*queue_id)
            .or_insert_with(|| chain.clone());
    }
    new
}

/// Merges a planner update: absent queues keep their stored chain and a
/// leader may not move back to an older generation.
fn merge_update(
    old: &QueueMappingDetail,
    new: QueueMappingDetail,
) -> Result<QueueMappingDetail> {
    for (queue_id, old_chain) in &old.hosted_queues {
        let Some(new_chain) = new.hosted_queues.get(queue_id) else {
            continue;
        };
        let old_gen = leader(old_chain).map(|r| r.generation);
        let new_gen = leader(new_chain).map(|r| r.generation);
        if let (Some(old_gen), Some(new_gen)) = (old_gen, new_gen) {
            if new_gen < old_gen {
                return Err(Error::InvalidChain {
                    topic: new.topic,
                    queue_id: *queue_id,
                    reason: format!("leader generation {new_gen} < {old_gen}"),
                });
            }
        }
    }
    Ok(keep_missing_chains(old, new))
}
