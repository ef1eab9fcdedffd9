use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "difficulty", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

/// A named course. Immutable once created: runs reference it by id and its
/// distance never changes retroactively.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Route {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub distance_km: Decimal,
    pub elevation_gain: i32,
    pub elevation_loss: i32,
    pub difficulty: Difficulty,
    pub district: String,
    pub region: Option<String>,
    /// Start/end/waypoint coordinates as submitted by the route creator.
    pub coordinates: Option<serde_json::Value>,
    pub surface_type: Option<String>,
    pub estimated_time_seconds: Option<i32>,
    pub created_at: OffsetDateTime,
}

/// One user's traversal attempt of one route.
///
/// A run with a null `ended_at` is in progress and never contributes to
/// aggregation. Once ended, the row is immutable.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Run {
    pub id: i64,
    pub user_id: i64,
    pub route_id: i64,
    pub started_at: OffsetDateTime,
    pub ended_at: Option<OffsetDateTime>,
    pub duration_seconds: Option<i32>,
    /// Distance reported by the tracking client; may differ from the route's
    /// nominal distance.
    pub distance_km: Option<Decimal>,
    /// Seconds per km. Null when the reported distance was zero.
    pub pace_seconds_per_km: Option<Decimal>,
    pub weather: Option<serde_json::Value>,
    pub created_at: OffsetDateTime,
}

impl Run {
    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// Materialized aggregate over all of one user's ended runs on one route.
///
/// Exactly one row per (user, route) pair; written only by the aggregator.
/// `updated_at` is also the optimistic-lock version for compare-and-swap
/// writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub route_id: i64,
    /// Minimum duration in seconds across contributing runs; lower is better.
    pub best_time: Option<i32>,
    /// Minimum pace across contributing runs; lower is better.
    pub fastest_pace: Option<Decimal>,
    pub total_runs: i64,
    pub total_distance: Decimal,
    pub total_duration: i64,
    /// Simple mean of per-run paces, recomputed from the full history on
    /// every merge.
    pub average_pace: Option<Decimal>,
    /// Max start time among contributing runs.
    pub last_run_date: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

impl LeaderboardEntry {
    /// Compares every aggregate field, ignoring the write timestamp.
    pub fn same_stats(&self, other: &LeaderboardEntry) -> bool {
        self.user_id == other.user_id
            && self.route_id == other.route_id
            && self.best_time == other.best_time
            && self.fastest_pace == other.fastest_pace
            && self.total_runs == other.total_runs
            && self.total_distance == other.total_distance
            && self.total_duration == other.total_duration
            && self.average_pace == other.average_pace
            && self.last_run_date == other.last_run_date
    }
}

/// Leaderboard entry joined with display fields for ranking responses.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LeaderboardRow {
    pub user_id: i64,
    pub route_id: i64,
    pub best_time: Option<i32>,
    pub fastest_pace: Option<Decimal>,
    pub total_runs: i64,
    pub total_distance: Decimal,
    pub total_duration: i64,
    pub average_pace: Option<Decimal>,
    pub last_run_date: Option<OffsetDateTime>,
    pub username: String,
    pub route_name: String,
    pub difficulty: Difficulty,
    pub district: String,
}

/// One user's overall standing across every route they hold an entry on.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct OverallStanding {
    pub user_id: i64,
    pub username: String,
    pub routes_completed: i64,
    pub total_runs: i64,
    pub total_distance: Decimal,
    pub avg_best_time: Option<Decimal>,
    pub fastest_run: Option<i32>,
}

/// Aggregate statistics block for a single user's stats page.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct UserAggregateStats {
    pub routes_completed: i64,
    pub total_runs: i64,
    pub total_distance: Decimal,
    pub avg_best_time: Option<Decimal>,
    pub fastest_run: Option<i32>,
    pub slowest_run: Option<i32>,
}

/// An ended run joined with display fields, for the recent-activity feed.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct RecentRun {
    pub id: i64,
    pub started_at: OffsetDateTime,
    pub ended_at: Option<OffsetDateTime>,
    pub duration_seconds: Option<i32>,
    pub distance_km: Option<Decimal>,
    pub pace_seconds_per_km: Option<Decimal>,
    pub username: String,
    pub route_name: String,
    pub difficulty: Difficulty,
    pub district: String,
}

/// Platform-wide counters for the stats endpoint.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Stats {
    pub users: i64,
    pub routes: i64,
    pub runs: i64,
    pub leaderboard_entries: i64,
}
