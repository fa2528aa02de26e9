//! In-memory state store.
//!
//! Implements the same contract as the Postgres store over a mutex-guarded
//! map. Used by the test suites and for running the director locally
//! without a database.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{AssignmentMap, Group, SeederRegistration, StateStore, StoreError};

#[derive(Default)]
struct Inner {
    groups: BTreeMap<String, Group>,
    seeders: BTreeMap<String, SeederRegistration>,
    seeding_state: BTreeMap<String, AssignmentMap>,
}

/// Mutex-guarded in-memory store.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<Inner>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a group.
    pub fn put_group(&self, group: Group) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.groups.insert(group.id.clone(), group);
    }

    /// Insert or replace a seeder registration.
    pub fn put_seeder(&self, seeder: SeederRegistration) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.seeders.insert(seeder.id.clone(), seeder);
    }

    /// Remove a seeder registration, as a departing agent would.
    pub fn remove_seeder(&self, seeder_id: &str) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.seeders.remove(seeder_id);
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn fill_groups(&self) -> Result<Vec<Group>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.groups.values().cloned().collect())
    }

    async fn registered_seeders(
        &self,
        group_id: &str,
    ) -> Result<Vec<SeederRegistration>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .seeders
            .values()
            .filter(|s| s.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn assignments(&self, group_id: &str) -> Result<AssignmentMap, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .seeding_state
            .get(group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_assignments(
        &self,
        group_id: &str,
        assignments: &AssignmentMap,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .seeding_state
            .insert(group_id.to_string(), assignments.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Assignment;
    use chrono::Utc;

    fn seeder(id: &str, group_id: &str) -> SeederRegistration {
        SeederRegistration {
            id: id.to_string(),
            group_id: group_id.to_string(),
            is_running: false,
            registered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_unknown_group_has_empty_assignments() {
        let store = MemoryStateStore::new();
        let map = store.assignments("nope").await.unwrap();
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_registered_seeders_scoped_to_group() {
        let store = MemoryStateStore::new();
        store.put_seeder(seeder("s1", "g1"));
        store.put_seeder(seeder("s2", "g1"));
        store.put_seeder(seeder("s3", "g2"));

        let ids: Vec<String> = store
            .registered_seeders("g1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();

        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_replace_assignments_overwrites() {
        let store = MemoryStateStore::new();

        let mut first = AssignmentMap::new();
        first.insert(
            "s1".to_string(),
            Assignment {
                game_id: "g".to_string(),
                server_name: "Alpha".to_string(),
            },
        );
        store.replace_assignments("g1", &first).await.unwrap();

        let second = AssignmentMap::new();
        store.replace_assignments("g1", &second).await.unwrap();

        assert!(store.assignments("g1").await.unwrap().is_empty());
    }
}
