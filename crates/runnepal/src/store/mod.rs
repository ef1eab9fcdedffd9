//! Storage abstraction for the run aggregator.
//!
//! The aggregator only ever talks to this trait, so its merge/recompute
//! algorithm can be unit-tested against [`MemoryStore`] while production
//! traffic goes through the Postgres-backed [`Database`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    errors::AppError,
    models::{LeaderboardEntry, Run},
};

pub use memory::MemoryStore;
pub use postgres::Database;

/// The storage surface the aggregator needs: run history reads plus an
/// atomic compare-and-swap write on leaderboard rows.
///
/// Entries are versioned by their `updated_at` timestamp. A write carries the
/// entry the writer read beforehand (`expected`); the store rejects the write
/// with [`AppError::ConcurrentUpdateConflict`] when the stored row no longer
/// matches, which serializes concurrent merges for the same (user, route)
/// pair. Independent pairs never contend.
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    async fn user_exists(&self, user_id: i64) -> Result<bool, AppError>;

    async fn route_exists(&self, route_id: i64) -> Result<bool, AppError>;

    /// All ended runs for one (user, route) pair, any order.
    async fn ended_runs_for_pair(
        &self,
        user_id: i64,
        route_id: i64,
    ) -> Result<Vec<Run>, AppError>;

    /// Every ended run in the store, for the batch recompute.
    async fn all_ended_runs(&self) -> Result<Vec<Run>, AppError>;

    async fn load_entry(
        &self,
        user_id: i64,
        route_id: i64,
    ) -> Result<Option<LeaderboardEntry>, AppError>;

    /// Writes `next` if and only if the stored row still matches `expected`
    /// (`None` meaning no row exists yet). Fails with
    /// [`AppError::ConcurrentUpdateConflict`] otherwise; the row is left
    /// untouched on any failure.
    async fn store_entry(
        &self,
        expected: Option<&LeaderboardEntry>,
        next: &LeaderboardEntry,
    ) -> Result<(), AppError>;
}
