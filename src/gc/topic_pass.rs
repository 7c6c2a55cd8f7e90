//! Per-topic isolation shared by the cleanup passes.
//!
//! Both passes walk the same table the same way: one topic at a time, each
//! topic isolated from the failures of the others, a short pause between
//! topics, and a single data-version bump plus persist once the scan is done.
//! A pass only supplies the per-topic body through [`TopicPass`].

use super::stop::StopSignal;
use super::window::MaintenanceWindow;
use crate::Result;
use crate::models::QueueMappingDetail;
use crate::storage::{CommitOptions, MappingManager};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Safely converts Duration to milliseconds as u64, capping at `u64::MAX`.
#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts u64 to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn u64_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

#[inline]
fn usize_to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Body of a cleanup pass, applied to one topic at a time.
#[async_trait]
pub trait TopicPass: Send + Sync {
    /// Short name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Inspects one owned, non-empty detail.
    ///
    /// Returns the replacement detail when something was reclaimed, `None`
    /// when the topic is left as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic could not be inspected; the error is
    /// logged and the scan moves on to the next topic.
    async fn clean_topic(&self, detail: &QueueMappingDetail) -> Result<Option<QueueMappingDetail>>;
}

/// Shared state every pass runs against.
#[derive(Clone)]
pub struct PassEnv {
    /// Table being cleaned.
    pub manager: Arc<dyn MappingManager>,
    /// Gate checked once at the start of each pass.
    pub window: Arc<dyn MaintenanceWindow>,
    /// Pause after each processed topic.
    pub throttle: Duration,
}

impl PassEnv {
    /// Creates an environment.
    #[must_use]
    pub fn new(
        manager: Arc<dyn MappingManager>,
        window: Arc<dyn MaintenanceWindow>,
        throttle: Duration,
    ) -> Self {
        Self {
            manager,
            window,
            throttle,
        }
    }
}

impl std::fmt::Debug for PassEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassEnv")
            .field("node_name", &self.manager.node_name())
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}

/// Outcome of one pass over the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Name of the pass.
    pub pass: &'static str,
    /// Owned, non-empty topics handed to the pass body.
    pub topics_scanned: usize,
    /// Topics whose replacement detail was committed.
    pub topics_changed: usize,
    /// Topics whose body or commit failed.
    pub topics_failed: usize,
    /// Topics skipped because another broker owns them.
    pub topics_foreign: usize,
    /// Generation records removed across all topics.
    pub records_removed: usize,
    /// The stop signal ended the scan before the last topic.
    pub stopped_early: bool,
    /// The maintenance window was closed; nothing was inspected.
    pub skipped_outside_window: bool,
    /// Duration of the pass in milliseconds.
    pub duration_ms: u64,
}

impl PassReport {
    fn new(pass: &'static str) -> Self {
        Self {
            pass,
            ..Default::default()
        }
    }

    /// Returns `true` if the pass changed the table.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.topics_changed > 0
    }

    /// Returns a human-readable summary of the pass.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.skipped_outside_window {
            return format!("{}: outside maintenance window, skipped", self.pass);
        }
        let suffix = if self.stopped_early { " (stopped early)" } else { "" };
        if self.topics_changed == 0 {
            format!(
                "{}: nothing to reclaim ({} topics scanned, {} failed in {}ms){suffix}",
                self.pass, self.topics_scanned, self.topics_failed, self.duration_ms
            )
        } else {
            format!(
                "{}: removed {} records from {} topics ({} scanned, {} failed in {}ms){suffix}",
                self.pass,
                self.records_removed,
                self.topics_changed,
                self.topics_scanned,
                self.topics_failed,
                self.duration_ms
            )
        }
    }
}

fn record_count(detail: &QueueMappingDetail) -> usize {
    detail.hosted_queues.values().map(Vec::len).sum()
}

/// Runs `pass` over every topic of the table.
///
/// Never fails: per-topic errors and persistence errors are logged and
/// counted in the returned report.
pub async fn run_topic_pass<P>(pass: &P, env: &PassEnv, stop: &StopSignal) -> PassReport
where
    P: TopicPass + ?Sized,
{
    let start = Instant::now();
    let mut report = PassReport::new(pass.name());

    if !env.window.is_open() {
        debug!(pass = pass.name(), "Maintenance window closed, skipping pass");
        report.skipped_outside_window = true;
        return report;
    }

    let manager = &env.manager;
    let node = manager.node_name().to_string();
    let topics = manager.topics();

    for topic in topics {
        if stop.is_stopped() {
            info!(pass = pass.name(), topic = %topic, "Stop requested, ending pass early");
            report.stopped_early = true;
            break;
        }
        visit_topic(pass, manager.as_ref(), &node, &topic, &mut report).await;
        tokio::time::sleep(env.throttle).await;
    }

    if report.has_changes() {
        manager.next_data_version();
        if let Err(e) = manager.persist() {
            error!(pass = pass.name(), error = %e, "Failed to persist mapping table");
        }
    }

    report.duration_ms = duration_to_millis(start.elapsed());

    metrics::counter!("mapping_gc_pass_runs_total", "pass" => pass.name()).increment(1);
    metrics::counter!("mapping_gc_records_removed_total", "pass" => pass.name())
        .increment(usize_to_u64(report.records_removed));
    metrics::counter!("mapping_gc_topic_failures_total", "pass" => pass.name())
        .increment(usize_to_u64(report.topics_failed));
    metrics::histogram!("mapping_gc_pass_duration_ms", "pass" => pass.name())
        .record(u64_to_f64(report.duration_ms));

    info!(
        pass = pass.name(),
        topics_scanned = report.topics_scanned,
        topics_changed = report.topics_changed,
        topics_failed = report.topics_failed,
        records_removed = report.records_removed,
        stopped_early = report.stopped_early,
        duration_ms = report.duration_ms,
        "Cleanup pass completed"
    );

    report
}

/// Handles one topic of a pass. Every outcome is recorded in `report`.
async fn visit_topic<P>(
    pass: &P,
    manager: &dyn MappingManager,
    node: &str,
    topic: &str,
    report: &mut PassReport,
) where
    P: TopicPass + ?Sized,
{
    let Some(detail) = manager.get(topic) else {
        return;
    };
    if detail.hosted_queues.is_empty() {
        return;
    }
    if detail.bname != node {
        warn!(
            pass = pass.name(),
            topic,
            owner = %detail.bname,
            node,
            "Mapping detail owned by another broker, skipping topic"
        );
        report.topics_foreign += 1;
        return;
    }

    report.topics_scanned += 1;
    let span = info_span!("mapping_gc.topic", pass = pass.name(), topic);
    match pass.clean_topic(&detail).instrument(span).await {
        Ok(None) => {},
        Ok(Some(replacement)) => {
            let removed = record_count(&detail).saturating_sub(record_count(&replacement));
            match manager.commit(replacement, CommitOptions::cleanup()) {
                Ok(()) => {
                    report.topics_changed += 1;
                    report.records_removed += removed;
                },
                Err(e) => {
                    error!(pass = pass.name(), topic, error = %e, "Failed to commit cleaned mapping detail");
                    report.topics_failed += 1;
                },
            }
        },
        Err(e) => {
            error!(pass = pass.name(), topic, error = %e, "Cleanup of topic failed");
            report.topics_failed += 1;
        },
    }
}
