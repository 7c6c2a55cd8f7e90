//! Mapping table storage.
//!
//! The mapping manager is the only gateway through which the table changes.
//! Cleanup never edits a detail in place: it builds a replacement and hands it
//! to [`MappingManager::commit`], which swaps it in atomically for readers.
//!
//! - [`InMemoryMappingManager`]: table held in memory, persistence is a no-op
//! - [`FileMappingManager`]: in-memory table persisted as JSON to one file

// A write guard held across a few map operations is intentional.
#![allow(clippy::significant_drop_tightening)]

mod filesystem;
mod memory;
pub mod traits;

pub use filesystem::FileMappingManager;
pub use memory::InMemoryMappingManager;
pub use traits::{CommitOptions, MappingManager};
