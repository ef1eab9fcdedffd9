//! Mutex-guarded in-memory [`LeaderboardStore`], the test double for the
//! aggregator's unit tests. The compare-and-swap compares the full prior row,
//! which gives the same serialization guarantee as the Postgres
//! `updated_at` guard.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    errors::AppError,
    models::{LeaderboardEntry, Run},
    store::LeaderboardStore,
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    users: HashSet<i64>,
    routes: HashSet<i64>,
    runs: Vec<Run>,
    entries: BTreeMap<(i64, i64), LeaderboardEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user_id: i64) {
        self.inner.lock().unwrap().users.insert(user_id);
    }

    pub fn add_route(&self, route_id: i64) {
        self.inner.lock().unwrap().routes.insert(route_id);
    }

    pub fn add_run(&self, run: Run) {
        self.inner.lock().unwrap().runs.push(run);
    }

    pub fn entry(&self, user_id: i64, route_id: i64) -> Option<LeaderboardEntry> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .get(&(user_id, route_id))
            .cloned()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

#[async_trait]
impl LeaderboardStore for MemoryStore {
    async fn user_exists(&self, user_id: i64) -> Result<bool, AppError> {
        Ok(self.inner.lock().unwrap().users.contains(&user_id))
    }

    async fn route_exists(&self, route_id: i64) -> Result<bool, AppError> {
        Ok(self.inner.lock().unwrap().routes.contains(&route_id))
    }

    async fn ended_runs_for_pair(
        &self,
        user_id: i64,
        route_id: i64,
    ) -> Result<Vec<Run>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .runs
            .iter()
            .filter(|r| r.user_id == user_id && r.route_id == route_id && r.is_ended())
            .cloned()
            .collect())
    }

    async fn all_ended_runs(&self) -> Result<Vec<Run>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.runs.iter().filter(|r| r.is_ended()).cloned().collect())
    }

    async fn load_entry(
        &self,
        user_id: i64,
        route_id: i64,
    ) -> Result<Option<LeaderboardEntry>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .entries
            .get(&(user_id, route_id))
            .cloned())
    }

    async fn store_entry(
        &self,
        expected: Option<&LeaderboardEntry>,
        next: &LeaderboardEntry,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (next.user_id, next.route_id);
        let current = inner.entries.get(&key);

        let matches = match (expected, current) {
            (None, None) => true,
            (Some(exp), Some(cur)) => exp == cur,
            _ => false,
        };
        if !matches {
            return Err(AppError::ConcurrentUpdateConflict);
        }

        inner.entries.insert(key, next.clone());
        Ok(())
    }
}
