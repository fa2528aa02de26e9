//! Postgres-backed state store.
//!
//! Three tables: `seeding_groups` (fill configuration, external writers),
//! `seeders` (agent registry, external writers), and `seeding_state`
//! (the per-group assignment map, owned by the reconciler and stored as one
//! JSONB document). There are no cross-process transaction guarantees on
//! purpose; concurrent external edits between a read and the overwrite are
//! resolved last-write-wins.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use super::{AssignmentMap, Group, SeederRegistration, StateStore, StoreError};

/// State store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Connection acquire timeout.
    pub acquire_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/seedfill".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/seedfill".to_string());

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Self {
            database_url,
            max_connections,
            ..Default::default()
        }
    }
}

/// Connection pool wrapper implementing [`StateStore`].
#[derive(Clone)]
pub struct PgStateStore {
    pool: PgPool,
}

struct GroupRow {
    id: String,
    fill_servers: Vec<String>,
    empty_space: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for GroupRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            fill_servers: row.try_get("fill_servers")?,
            empty_space: row.try_get("empty_space")?,
        })
    }
}

struct SeederRow {
    id: String,
    group_id: String,
    is_running: bool,
    registered_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for SeederRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: row.try_get("id")?,
            group_id: row.try_get("group_id")?,
            is_running: row.try_get("is_running")?,
            registered_at: row.try_get("registered_at")?,
        })
    }
}

impl PgStateStore {
    /// Connect to the database.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        info!(
            max_connections = config.max_connections,
            "Connecting to state store"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(StoreError::Connect)?;

        info!("State store connection pool established");

        Ok(Self { pool })
    }

    /// Apply pending migrations.
    ///
    /// Tries a few candidate directories so the binary works from the repo
    /// root, the service directory, and installed layouts.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations");

        let candidates = vec![
            std::path::PathBuf::from("./migrations"),
            std::path::PathBuf::from("services/director/migrations"),
            std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        ];
        let mut last_error: Option<sqlx::migrate::MigrateError> = None;

        for dir in &candidates {
            match sqlx::migrate::Migrator::new(dir.clone()).await {
                Ok(migrator) => {
                    info!(migrations_dir = %dir.display(), "Loaded migrations");
                    migrator
                        .run(&self.pool)
                        .await
                        .map_err(StoreError::Migration)?;
                    info!("Database migrations complete");
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        let tried = candidates
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        Err(StoreError::MigrationDirNotFound {
            tried,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no candidate directories".to_string()),
        })
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn fill_groups(&self) -> Result<Vec<Group>, StoreError> {
        // Every row in seeding_groups carries a fill configuration; groups
        // without one simply have no row here.
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, fill_servers, empty_space
            FROM seeding_groups
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        Ok(rows
            .into_iter()
            .map(|r| Group {
                id: r.id,
                fill_servers: r.fill_servers,
                empty_space: r.empty_space,
            })
            .collect())
    }

    async fn registered_seeders(
        &self,
        group_id: &str,
    ) -> Result<Vec<SeederRegistration>, StoreError> {
        let rows = sqlx::query_as::<_, SeederRow>(
            r#"
            SELECT id, group_id, is_running, registered_at
            FROM seeders
            WHERE group_id = $1
            ORDER BY id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        Ok(rows
            .into_iter()
            .map(|r| SeederRegistration {
                id: r.id,
                group_id: r.group_id,
                is_running: r.is_running,
                registered_at: r.registered_at,
            })
            .collect())
    }

    async fn assignments(&self, group_id: &str) -> Result<AssignmentMap, StoreError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            r#"
            SELECT keep_alive_seeders
            FROM seeding_state
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        match row {
            Some((value,)) => {
                let map: AssignmentMap = serde_json::from_value(value)?;
                Ok(map)
            }
            None => Ok(AssignmentMap::new()),
        }
    }

    async fn replace_assignments(
        &self,
        group_id: &str,
        assignments: &AssignmentMap,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_value(assignments)?;

        sqlx::query(
            r#"
            INSERT INTO seeding_state (group_id, keep_alive_seeders)
            VALUES ($1, $2)
            ON CONFLICT (group_id)
            DO UPDATE SET keep_alive_seeders = EXCLUDED.keep_alive_seeders
            "#,
        )
        .bind(group_id)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        Ok(())
    }
}

// Exercised against a live Postgres; see the Assignment round-trip shape
// test in store::memory and the integration suite for the trait semantics.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Assignment;

    #[test]
    fn test_store_config_from_env_defaults() {
        // No env manipulation here: DATABASE_URL may be set by the runner,
        // so only the pure defaults are asserted.
        let config = StoreConfig::default();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_assignment_json_shape_matches_stored_documents() {
        let assignment = Assignment {
            game_id: "g-1".to_string(),
            server_name: "Alpha".to_string(),
        };

        let json = serde_json::to_string(&assignment).unwrap();
        assert_eq!(json, r#"{"gameId":"g-1","serverName":"Alpha"}"#);
    }
}
