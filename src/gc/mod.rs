//! Garbage collection of the queue mapping table.
//!
//! Two passes reclaim bookkeeping that reassignments of static-topic queues
//! leave behind:
//!
//! - [`ExpiredGenerationReclaimer`] drops the oldest generation of a chain
//!   once the broker hosting it reports the backing queue as drained.
//! - [`StaleLeaderReconciler`] drops a whole chain once the real leader of
//!   the queue confirms, through its own mapping detail, that leadership
//!   moved away from what this broker recorded.
//!
//! Both passes only act inside a [`MaintenanceWindow`] and share the same
//! per-topic isolation through [`run_topic_pass`]: a failing topic is logged
//! and skipped, and all changes of one pass end in a single data-version bump
//! and persist.
//!
//! [`CleanupScheduler`] drives both passes from a background task.
//!
//! # Example
//!
//! ```rust,ignore
//! use mapping_gc::config::GcConfig;
//! use mapping_gc::gc::CleanupScheduler;
//!
//! let config = GcConfig::from_env();
//! let handle = CleanupScheduler::from_config(&config, manager, gateway, resolver).spawn();
//!
//! // Run a cycle now instead of waiting for the next interval
//! handle.wakeup();
//!
//! handle.shutdown().await?;
//! ```

mod eligibility;
mod expired;
mod scheduler;
mod stale_leader;
mod stop;
mod topic_pass;
mod window;

#[cfg(test)]
mod test_support;

pub use eligibility::{ChainEligibility, LeaderTailPolicy, SealedHistoryPolicy};
pub use expired::ExpiredGenerationReclaimer;
pub use scheduler::{CleanupScheduler, CycleReport, SchedulerHandle};
pub use stale_leader::StaleLeaderReconciler;
pub use stop::{StopSignal, StopTrigger, stop_channel};
pub use topic_pass::{PassEnv, PassReport, TopicPass, run_topic_pass};
pub use window::{AlwaysOpen, DailyWindow, MaintenanceWindow};
