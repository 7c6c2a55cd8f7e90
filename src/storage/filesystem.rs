//! File-backed mapping manager.
//!
//! The whole table and its data version are written as one pretty-printed
//! JSON document. Writes go to a sibling temp file that is then renamed over
//! the target, so a crash mid-write leaves the previous table intact.

use super::memory::InMemoryMappingManager;
use super::traits::{CommitOptions, MappingManager};
use crate::models::{DataVersion, MappingTable, QueueMappingDetail};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// On-disk layout of the mapping table.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTable {
    data_version: DataVersion,
    #[serde(default)]
    topic_queue_mapping_table: BTreeMap<String, QueueMappingDetail>,
}

/// Mapping manager persisting the table to a JSON file.
#[derive(Debug)]
pub struct FileMappingManager {
    inner: InMemoryMappingManager,
    path: PathBuf,
}

impl FileMappingManager {
    /// Opens the table stored at `path`, or starts empty if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>, node_name: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let node_name = node_name.into();

        if !path.exists() {
            debug!(path = %path.display(), "No stored mapping table, starting empty");
            return Ok(Self {
                inner: InMemoryMappingManager::new(node_name),
                path,
            });
        }

        let contents = fs::read_to_string(&path).map_err(|e| Error::OperationFailed {
            operation: "read_mapping_table".to_string(),
            cause: format!("{}: {}", path.display(), e),
        })?;
        let stored: StoredTable =
            serde_json::from_str(&contents).map_err(|e| Error::OperationFailed {
                operation: "parse_mapping_table".to_string(),
                cause: e.to_string(),
            })?;

        info!(
            path = %path.display(),
            topics = stored.topic_queue_mapping_table.len(),
            data_version = stored.data_version.counter,
            "Loaded mapping table"
        );

        Ok(Self {
            inner: InMemoryMappingManager::from_parts(
                node_name,
                stored.topic_queue_mapping_table.into_values(),
                stored.data_version,
            ),
            path,
        })
    }

    /// Returns the file the table is persisted to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts or replaces a detail without any checks.
    pub fn insert(&self, detail: QueueMappingDetail) {
        self.inner.insert(detail);
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl MappingManager for FileMappingManager {
    fn node_name(&self) -> &str {
        self.inner.node_name()
    }

    fn snapshot(&self) -> MappingTable {
        self.inner.snapshot()
    }

    fn get(&self, topic: &str) -> Option<Arc<QueueMappingDetail>> {
        self.inner.get(topic)
    }

    fn commit(&self, detail: QueueMappingDetail, options: CommitOptions) -> Result<()> {
        self.inner.apply_commit(detail, options)?;
        if options.flush {
            self.persist()?;
        }
        Ok(())
    }

    fn data_version(&self) -> DataVersion {
        self.inner.data_version()
    }

    fn next_data_version(&self) {
        self.inner.next_data_version();
    }

    fn persist(&self) -> Result<()> {
        let (data_version, table) = self.inner.versioned_snapshot();
        let stored = StoredTable {
            data_version,
            topic_queue_mapping_table: table
                .into_iter()
                .map(|(topic, detail)| (topic, detail.as_ref().clone()))
                .collect(),
        };

        let json = serde_json::to_string_pretty(&stored).map_err(|e| Error::OperationFailed {
            operation: "serialize_mapping_table".to_string(),
            cause: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_mapping_dir".to_string(),
                cause: e.to_string(),
            })?;
        }

        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|e| Error::OperationFailed {
            operation: "write_mapping_table".to_string(),
            cause: format!("{}: {}", temp.display(), e),
        })?;
        fs::rename(&temp, &self.path).map_err(|e| Error::OperationFailed {
            operation: "rename_mapping_table".to_string(),
            cause: format!("{}: {}", self.path.display(), e),
        })?;

        debug!(
            path = %self.path.display(),
            topics = stored.topic_queue_mapping_table.len(),
            "Persisted mapping table"
        );
        Ok(())
    }
}
