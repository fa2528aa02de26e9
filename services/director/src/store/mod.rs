//! Persisted state for groups, seeders, and assignments.
//!
//! The core consumes the state store through the narrow [`StateStore`]
//! contract: list the groups to fill, read the seeder registry, and
//! read/overwrite one assignment map per group. Groups and seeder
//! registrations are owned by external collaborators and are read-only
//! here; only the assignment map is written.

mod memory;
mod postgres;

pub use memory::MemoryStateStore;
pub use postgres::{PgStateStore, StoreConfig};

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named set of servers sharing a seeder pool.
///
/// Edited externally; the core never writes groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: String,

    /// Servers to keep populated. Order is meaningful: it is the fill
    /// tie-break.
    pub fill_servers: Vec<String>,

    /// Capacity reserved for real players.
    pub empty_space: i64,
}

/// A seeder agent's self-registration.
///
/// Created and removed by the agents themselves. The core treats the id set
/// as the assignable pool, regardless of `is_running`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeederRegistration {
    pub id: String,
    pub group_id: String,
    pub is_running: bool,
    pub registered_at: DateTime<Utc>,
}

/// One seeder's assignment to a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub game_id: String,
    pub server_name: String,
}

/// Assignment map for one group, keyed by seeder id.
///
/// A `BTreeMap` so that iteration order is ascending seeder id, which the
/// reconciler relies on as its deterministic prune tie-break.
pub type AssignmentMap = BTreeMap<String, Assignment>;

/// State store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the store.
    #[error("failed to connect to state store: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}. Run from repo root or services/director.")]
    MigrationDirNotFound { tried: String, last_error: String },

    /// Stored assignment payload did not match the expected shape.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Narrow read/write contract over the persisted state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// All groups that have a fill configuration.
    async fn fill_groups(&self) -> Result<Vec<Group>, StoreError>;

    /// Registered seeders for one group, ordered by id.
    async fn registered_seeders(
        &self,
        group_id: &str,
    ) -> Result<Vec<SeederRegistration>, StoreError>;

    /// The group's current assignment map. A group with no persisted
    /// seeding state yields an empty map.
    async fn assignments(&self, group_id: &str) -> Result<AssignmentMap, StoreError>;

    /// Replace the group's assignment map wholesale.
    async fn replace_assignments(
        &self,
        group_id: &str,
        assignments: &AssignmentMap,
    ) -> Result<(), StoreError>;
}
