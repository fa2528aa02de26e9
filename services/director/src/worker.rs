//! Reconcile background worker.
//!
//! Drives the assignment reconciler over all fill groups on a fixed
//! interval for the lifetime of the process, and owns the liveness latch
//! the health probe reports.
//!
//! Failure policy: a failure inside one group's pass is contained by the
//! reconciler and only logged; a failure to list the groups means the
//! state store is unreachable, which is loop-fatal: the worker trips the
//! latch and stops, leaving the restart to the external supervisor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::liveness::LivenessLatch;
use crate::reconciler::AssignmentReconciler;
use crate::store::{StateStore, StoreError};
use crate::telemetry::TelemetrySource;

/// Default pause between reconciliation ticks.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Worker that runs the reconciliation loop.
pub struct ReconcileWorker {
    reconciler: AssignmentReconciler,
    interval: Duration,
    liveness: LivenessLatch,
}

impl ReconcileWorker {
    /// Create a new reconcile worker.
    pub fn new(
        store: Arc<dyn StateStore>,
        telemetry: Arc<dyn TelemetrySource>,
        interval: Duration,
        liveness: LivenessLatch,
    ) -> Self {
        Self {
            reconciler: AssignmentReconciler::new(store, telemetry),
            interval,
            liveness,
        }
    }

    /// Run the worker until shutdown is signaled or a loop-fatal failure
    /// trips the liveness latch.
    ///
    /// The first tick fires immediately; groups are reconciled on startup
    /// rather than after a full interval. A graceful shutdown leaves the
    /// latch alive.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting reconcile worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        // A pass can outlast the interval (telemetry retries alone can take
        // minutes); keep the full pause between passes instead of replaying
        // missed ticks back-to-back.
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_reconciliation().await {
                        error!(error = %e, "State store unavailable, stopping reconcile worker");
                        self.liveness.fail();
                        return;
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Reconcile worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run a single reconciliation pass.
    async fn run_reconciliation(&self) -> Result<(), StoreError> {
        let stats = self.reconciler.reconcile_all().await?;

        if stats.groups_failed > 0 {
            info!(
                groups_processed = stats.groups_processed,
                groups_failed = stats.groups_failed,
                "Reconciliation tick finished with failed groups"
            );
        }

        Ok(())
    }
}
