//! Storage backend traits.

mod manager;

pub use manager::{CommitOptions, MappingManager};
