//! Background scheduler running both cleanup passes.
//!
//! One task per broker wakes up every scan interval, on an explicit
//! [`SchedulerHandle::wakeup`], or when stop is requested. Each pass runs in
//! its own task so that a panic inside a pass is logged and the loop keeps
//! going.

use super::eligibility::LeaderTailPolicy;
use super::expired::ExpiredGenerationReclaimer;
use super::stale_leader::StaleLeaderReconciler;
use super::stop::{StopSignal, StopTrigger, stop_channel};
use super::topic_pass::{PassEnv, PassReport};
use super::window::DailyWindow;
use crate::config::GcConfig;
use crate::rpc::{BrokerClient, RouteResolver, RpcGateway};
use crate::storage::MappingManager;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Reports of one scheduler cycle. `None` marks a pass that did not complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Expired-generation pass.
    pub expired: Option<PassReport>,
    /// Stale-leader pass.
    pub stale_leader: Option<PassReport>,
}

/// Periodic driver of the two cleanup passes.
#[derive(Debug)]
pub struct CleanupScheduler {
    reclaimer: Arc<ExpiredGenerationReclaimer>,
    reconciler: Arc<StaleLeaderReconciler>,
    interval: Duration,
}

impl CleanupScheduler {
    /// Creates a scheduler from already built passes.
    #[must_use]
    pub fn new(
        reclaimer: ExpiredGenerationReclaimer,
        reconciler: StaleLeaderReconciler,
        interval: Duration,
    ) -> Self {
        Self {
            reclaimer: Arc::new(reclaimer),
            reconciler: Arc::new(reconciler),
            interval,
        }
    }

    /// Wires both passes from configuration.
    ///
    /// Both passes share the daily maintenance window parsed from
    /// `delete_when` and the RPC timeout; chain eligibility is
    /// [`LeaderTailPolicy`]. Ownership is checked against the manager's
    /// node name; a different `node_name` in `config` is logged.
    #[must_use]
    pub fn from_config(
        config: &GcConfig,
        manager: Arc<dyn MappingManager>,
        gateway: Arc<dyn RpcGateway>,
        resolver: Arc<dyn RouteResolver>,
    ) -> Self {
        node_names_agree(config, manager.as_ref());
        let env = PassEnv::new(
            manager,
            Arc::new(DailyWindow::parse(&config.delete_when)),
            config.topic_throttle,
        );
        let client = BrokerClient::new(gateway, config.rpc_timeout);
        let reclaimer =
            ExpiredGenerationReclaimer::new(env.clone(), client.clone(), Arc::new(LeaderTailPolicy));
        let reconciler = StaleLeaderReconciler::new(env, client, resolver);
        Self::new(reclaimer, reconciler, config.scan_interval)
    }

    /// Interval between cycles.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts the loop on the current tokio runtime.
    #[must_use]
    pub fn spawn(self) -> SchedulerHandle {
        let (trigger, signal) = stop_channel();
        let wakeup = Arc::new(Notify::new());
        let task = tokio::spawn(self.run(signal, Arc::clone(&wakeup)));
        SchedulerHandle {
            stop: trigger,
            wakeup,
            task,
        }
    }

    async fn run(self, stop: StopSignal, wakeup: Arc<Notify>) {
        info!(interval_secs = self.interval.as_secs(), "Queue mapping cleanup service started");
        loop {
            tokio::select! {
                () = tokio::time::sleep(self.interval) => {},
                () = wakeup.notified() => debug!("Cleanup woken up"),
                () = stop.stopped() => {},
            }
            if stop.is_stopped() {
                break;
            }
            let cycle = self.run_cycle(&stop).await;
            debug!(?cycle, "Cleanup cycle finished");
        }
        info!("Queue mapping cleanup service stopped");
    }

    /// Runs the expired-generation pass, then the stale-leader pass.
    ///
    /// The second pass is skipped once stop has been requested. A pass that
    /// panics is logged and reported as `None`.
    pub async fn run_cycle(&self, stop: &StopSignal) -> CycleReport {
        let reclaimer = Arc::clone(&self.reclaimer);
        let signal = stop.clone();
        let expired = isolate(
            "expired_generation",
            tokio::spawn(async move { reclaimer.run_once(&signal).await }),
        )
        .await;

        if stop.is_stopped() {
            return CycleReport {
                expired,
                stale_leader: None,
            };
        }

        let reconciler = Arc::clone(&self.reconciler);
        let signal = stop.clone();
        let stale_leader = isolate(
            "stale_leader",
            tokio::spawn(async move { reconciler.run_once(&signal).await }),
        )
        .await;

        CycleReport {
            expired,
            stale_leader,
        }
    }
}

fn node_names_agree(config: &GcConfig, manager: &dyn MappingManager) -> bool {
    let agree = config.node_name == manager.node_name();
    if !agree {
        warn!(
            configured = %config.node_name,
            manager = %manager.node_name(),
            "Configured node name differs from the mapping manager's, using the manager's"
        );
    }
    agree
}

async fn isolate(pass: &'static str, task: JoinHandle<PassReport>) -> Option<PassReport> {
    match task.await {
        Ok(report) => Some(report),
        Err(e) => {
            metrics::counter!("mapping_gc_pass_aborted_total", "pass" => pass).increment(1);
            error!(pass, error = %e, "Cleanup pass aborted");
            None
        },
    }
}

/// Control handle of a spawned [`CleanupScheduler`].
#[derive(Debug)]
pub struct SchedulerHandle {
    stop: StopTrigger,
    wakeup: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Requests an immediate cycle.
    pub fn wakeup(&self) {
        self.wakeup.notify_one();
    }

    /// Requests the loop to stop after the current topic.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Stops the loop and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the loop task panicked or was cancelled.
    pub async fn shutdown(self) -> Result<()> {
        self.stop.stop();
        self.task.await.map_err(|e| Error::OperationFailed {
            operation: "scheduler_shutdown".to_string(),
            cause: e.to_string(),
        })
    }
}
