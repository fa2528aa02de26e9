//! Assignment reconciliation.
//!
//! The reconciler is responsible for:
//! - Reading the group's current assignment map and seeder registry
//! - Fetching live telemetry for each fill server
//! - Pruning assignments that are stale, invalid, or over capacity
//! - Filling remaining headroom from the unused seeder pool
//!
//! Each pass re-derives a fresh view of registry + telemetry + existing
//! assignments and overwrites the map wholesale, so repeated passes over
//! unchanged inputs converge without churn.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::store::{Assignment, AssignmentMap, Group, StateStore, StoreError};
use crate::telemetry::{ServerTelemetry, TelemetrySource};

/// Outcome of one group's reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// The persisted assignment map.
    pub assignments: AssignmentMap,

    /// Seeder ids registered for the group at the time of the pass.
    pub registered: BTreeSet<String>,
}

/// Counters for one pass over all groups.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub groups_processed: usize,
    pub groups_failed: usize,

    /// Assignment entries across all processed groups after the pass.
    pub seeders_assigned: usize,

    /// Registered seeders across all processed groups.
    pub seeders_registered: usize,
}

/// The assignment reconciler.
pub struct AssignmentReconciler {
    store: Arc<dyn StateStore>,
    telemetry: Arc<dyn TelemetrySource>,
}

impl AssignmentReconciler {
    /// Create a new reconciler.
    pub fn new(store: Arc<dyn StateStore>, telemetry: Arc<dyn TelemetrySource>) -> Self {
        Self { store, telemetry }
    }

    /// Run a single reconciliation pass over all fill groups.
    ///
    /// Groups are processed strictly sequentially. A failure inside one
    /// group's pass is logged and counted, and the pass moves on; a failure
    /// to list the groups themselves propagates to the caller.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<ReconcileStats, StoreError> {
        let mut stats = ReconcileStats::default();

        let groups = self.store.fill_groups().await?;
        debug!(group_count = groups.len(), "Found groups to reconcile");

        for group in groups {
            match self
                .reconcile_group(&group.fill_servers, &group.id, group.empty_space)
                .await
            {
                Ok(outcome) => {
                    stats.groups_processed += 1;
                    stats.seeders_assigned += outcome.assignments.len();
                    stats.seeders_registered += outcome.registered.len();
                }
                Err(e) => {
                    warn!(group_id = %group.id, error = %e, "Failed to reconcile group");
                    stats.groups_failed += 1;
                }
            }
        }

        info!(
            groups_processed = stats.groups_processed,
            groups_failed = stats.groups_failed,
            seeders_assigned = stats.seeders_assigned,
            seeders_registered = stats.seeders_registered,
            "Reconciliation pass complete"
        );

        Ok(stats)
    }

    /// Convenience wrapper reconciling one configured group.
    pub async fn reconcile(&self, group: &Group) -> Result<ReconcileOutcome, StoreError> {
        self.reconcile_group(&group.fill_servers, &group.id, group.empty_space)
            .await
    }

    /// Reconcile one group's assignment map.
    ///
    /// `servers` keeps its input order throughout: it decides which server
    /// gets seeders first when the pool runs short.
    #[instrument(skip(self, servers), fields(server_count = servers.len()))]
    pub async fn reconcile_group(
        &self,
        servers: &[String],
        group_id: &str,
        empty_space: i64,
    ) -> Result<ReconcileOutcome, StoreError> {
        let mut assignments = self.store.assignments(group_id).await?;

        // Telemetry snapshot per server, seeded with the current per-server
        // assignment count as the used-seeders baseline.
        let mut snapshots: HashMap<String, ServerTelemetry> = HashMap::new();
        for server in servers {
            let used = assignments
                .values()
                .filter(|a| a.server_name == *server)
                .count();
            let snapshot = self.telemetry.fetch(server, empty_space, used).await;
            debug!(
                server = %server,
                needed_players = snapshot.needed_players,
                used_seeders = snapshot.used_seeders,
                "Fetched server telemetry"
            );
            snapshots.insert(server.clone(), snapshot);
        }

        let registered: BTreeSet<String> = self
            .store
            .registered_seeders(group_id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        let server_set: HashSet<&str> = servers.iter().map(String::as_str).collect();

        // Prune pass, in ascending seeder-id order so over-capacity
        // shedding is deterministic across passes. `used_seeders` mirrors
        // the live per-server entry count throughout.
        let before = assignments.len();
        let candidates: Vec<String> = assignments.keys().cloned().collect();
        for seeder_id in candidates {
            let Some(entry) = assignments.get(&seeder_id).cloned() else {
                continue;
            };

            if !server_set.contains(entry.server_name.as_str()) || !registered.contains(&seeder_id)
            {
                assignments.remove(&seeder_id);
                if let Some(snapshot) = snapshots.get_mut(&entry.server_name) {
                    snapshot.used_seeders -= 1;
                }
                continue;
            }

            if let Some(snapshot) = snapshots.get_mut(&entry.server_name) {
                if snapshot.needed_players - (snapshot.used_seeders as i64) < 0 {
                    assignments.remove(&seeder_id);
                    snapshot.used_seeders -= 1;
                }
            }
        }
        let pruned = before - assignments.len();

        // Fill pass: hand unused seeders to servers in input order while a
        // server has headroom left beyond its surviving assignments, so
        // repeated passes over unchanged inputs add nothing.
        let mut unused: VecDeque<String> = registered
            .iter()
            .filter(|id| !assignments.contains_key(*id))
            .cloned()
            .collect();
        let mut filled = 0usize;
        for server in servers {
            let Some(snapshot) = snapshots.get_mut(server) else {
                continue;
            };
            while snapshot.needed_players - (snapshot.used_seeders as i64) > 0 {
                let Some(seeder_id) = unused.pop_front() else {
                    break;
                };
                assignments.insert(
                    seeder_id,
                    Assignment {
                        game_id: snapshot.game_id.clone(),
                        server_name: server.clone(),
                    },
                );
                snapshot.used_seeders += 1;
                filled += 1;
            }
        }

        self.store.replace_assignments(group_id, &assignments).await?;

        if pruned > 0 || filled > 0 {
            info!(
                pruned,
                filled,
                assigned = assignments.len(),
                idle = unused.len(),
                "Assignment map updated"
            );
        }

        Ok(ReconcileOutcome {
            assignments,
            registered,
        })
    }
}
