//! Postgres-backed storage.
//!
//! Leaderboard writes go through the optimistic compare-and-swap in the
//! [`LeaderboardStore`] impl: inserts race through `ON CONFLICT DO NOTHING`,
//! updates are guarded by the `updated_at` value the writer read. Either way a
//! losing writer gets `ConcurrentUpdateConflict` and the stored row is left
//! intact.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::errors::AppError;
use crate::models::{
    Difficulty, LeaderboardEntry, LeaderboardRow, OverallStanding, RecentRun, Route, Run, Stats,
    User, UserAggregateStats,
};
use crate::query_builder::QueryBuilder;
use crate::store::LeaderboardStore;

const RUN_COLUMNS: &str = "id, user_id, route_id, started_at, ended_at, duration_seconds, \
     distance_km, pace_seconds_per_km, weather, created_at";

const ROUTE_COLUMNS: &str = "id, name, description, distance_km, elevation_gain, elevation_loss, \
     difficulty, district, region, coordinates, surface_type, estimated_time_seconds, created_at";

const LEADERBOARD_ROW_SELECT: &str = r#"
    SELECT l.user_id, l.route_id, l.best_time, l.fastest_pace, l.total_runs,
           l.total_distance, l.total_duration, l.average_pace, l.last_run_date,
           u.username, r.name AS route_name, r.difficulty, r.district
    FROM leaderboard l
    JOIN users u ON l.user_id = u.id
    JOIN routes r ON l.route_id = r.id
"#;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn new_user(&self, username: &str, email: &str) -> Result<User, AppError> {
        let result = sqlx::query_as(
            r#"
            INSERT INTO users (username, email)
            VALUES ($1, $2)
            RETURNING id, username, email, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                AppError::InvalidInput("username or email already taken".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn all_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as(
            "SELECT id, username, email, created_at FROM users ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as("SELECT id, username, email, created_at FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user)
    }

    // ------------------------------------------------------------------
    // Routes
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn create_route(
        &self,
        name: &str,
        description: Option<&str>,
        distance_km: Decimal,
        elevation_gain: i32,
        elevation_loss: i32,
        difficulty: Difficulty,
        district: &str,
        region: Option<&str>,
        coordinates: Option<&serde_json::Value>,
        surface_type: Option<&str>,
        estimated_time_seconds: Option<i32>,
    ) -> Result<Route, AppError> {
        let route = sqlx::query_as(&format!(
            r#"
            INSERT INTO routes (name, description, distance_km, elevation_gain, elevation_loss,
                                difficulty, district, region, coordinates, surface_type,
                                estimated_time_seconds)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ROUTE_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(description)
        .bind(distance_km)
        .bind(elevation_gain)
        .bind(elevation_loss)
        .bind(difficulty)
        .bind(district)
        .bind(region)
        .bind(coordinates)
        .bind(surface_type)
        .bind(estimated_time_seconds)
        .fetch_one(&self.pool)
        .await?;

        Ok(route)
    }

    pub async fn get_route(&self, id: i64) -> Result<Option<Route>, AppError> {
        let route = sqlx::query_as(&format!(
            "SELECT {ROUTE_COLUMNS} FROM routes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(route)
    }

    pub async fn list_routes(
        &self,
        district: Option<&str>,
        difficulty: Option<Difficulty>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Route>, AppError> {
        let mut qb = QueryBuilder::new();
        if district.is_some() {
            qb.add_param_condition("district ILIKE ");
        }
        if difficulty.is_some() {
            qb.add_param_condition("difficulty = ");
        }
        let limit_idx = qb.next_param_idx();
        let offset_idx = qb.next_param_idx();

        let sql = format!(
            "SELECT {ROUTE_COLUMNS} FROM routes {} ORDER BY created_at DESC \
             LIMIT ${limit_idx} OFFSET ${offset_idx}",
            qb.build_where_clause()
        );

        let mut query = sqlx::query_as(&sql);
        if let Some(district) = district {
            query = query.bind(format!("%{district}%"));
        }
        if let Some(difficulty) = difficulty {
            query = query.bind(difficulty);
        }
        let routes = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;

        Ok(routes)
    }

    // ------------------------------------------------------------------
    // Runs
    // ------------------------------------------------------------------

    pub async fn start_run(&self, user_id: i64, route_id: i64) -> Result<Run, AppError> {
        let result = sqlx::query_as(&format!(
            r#"
            INSERT INTO runs (user_id, route_id, started_at)
            VALUES ($1, $2, NOW())
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(route_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(run) => Ok(run),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(AppError::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_run(&self, id: i64) -> Result<Option<Run>, AppError> {
        let run = sqlx::query_as(&format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(run)
    }

    /// Marks an in-progress run as ended. Returns `None` when the run does
    /// not exist or has already ended; ended runs are immutable.
    pub async fn end_run(
        &self,
        run_id: i64,
        ended_at: OffsetDateTime,
        duration_seconds: i32,
        distance_km: Decimal,
        pace_seconds_per_km: Option<Decimal>,
        weather: Option<&serde_json::Value>,
    ) -> Result<Option<Run>, AppError> {
        let run = sqlx::query_as(&format!(
            r#"
            UPDATE runs
            SET ended_at = $2, duration_seconds = $3, distance_km = $4,
                pace_seconds_per_km = $5, weather = COALESCE($6, weather)
            WHERE id = $1 AND ended_at IS NULL
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(run_id)
        .bind(ended_at)
        .bind(duration_seconds)
        .bind(distance_km)
        .bind(pace_seconds_per_km)
        .bind(weather)
        .fetch_optional(&self.pool)
        .await?;

        Ok(run)
    }

    /// A user's run history, newest first, joined with route display fields.
    pub async fn user_run_history(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RecentRun>, AppError> {
        let runs = sqlx::query_as(
            r#"
            SELECT ur.id, ur.started_at, ur.ended_at, ur.duration_seconds, ur.distance_km,
                   ur.pace_seconds_per_km, u.username, r.name AS route_name, r.difficulty,
                   r.district
            FROM runs ur
            JOIN users u ON ur.user_id = u.id
            JOIN routes r ON ur.route_id = r.id
            WHERE ur.user_id = $1
            ORDER BY ur.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }

    // ------------------------------------------------------------------
    // Read-side leaderboard queries
    // ------------------------------------------------------------------

    /// Entries for one route, best time first (nulls last), more runs
    /// breaking ties.
    pub async fn route_leaderboard(
        &self,
        route_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LeaderboardRow>, AppError> {
        let rows = sqlx::query_as(&format!(
            r#"
            {LEADERBOARD_ROW_SELECT}
            WHERE l.route_id = $1
            ORDER BY l.best_time ASC NULLS LAST, l.total_runs DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(route_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Entries scoped to routes whose district matches case-insensitively.
    pub async fn district_leaderboard(
        &self,
        district: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LeaderboardRow>, AppError> {
        let rows = sqlx::query_as(&format!(
            r#"
            {LEADERBOARD_ROW_SELECT}
            WHERE r.district ILIKE $1
            ORDER BY l.best_time ASC NULLS LAST, l.total_runs DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(format!("%{district}%"))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Entries scoped to routes of one difficulty, route-leaderboard
    /// ordering.
    pub async fn difficulty_leaderboard(
        &self,
        difficulty: Difficulty,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LeaderboardRow>, AppError> {
        let rows = sqlx::query_as(&format!(
            r#"
            {LEADERBOARD_ROW_SELECT}
            WHERE r.difficulty = $1
            ORDER BY l.best_time ASC NULLS LAST, l.total_runs DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(difficulty)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Per-user overall standing. Users with no leaderboard entry are
    /// excluded entirely, not returned as zero rows.
    pub async fn overall_leaderboard(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<OverallStanding>, AppError> {
        let rows = sqlx::query_as(
            r#"
            SELECT u.id AS user_id,
                   u.username,
                   COUNT(DISTINCT l.route_id) AS routes_completed,
                   SUM(l.total_runs)::bigint AS total_runs,
                   SUM(l.total_distance) AS total_distance,
                   AVG(l.best_time) AS avg_best_time,
                   MIN(l.best_time) AS fastest_run
            FROM users u
            JOIN leaderboard l ON u.id = l.user_id
            GROUP BY u.id, u.username
            HAVING COUNT(l.route_id) > 0
            ORDER BY routes_completed DESC, total_distance DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// One user's leaderboard entries, best time first.
    pub async fn user_leaderboard_entries(
        &self,
        user_id: i64,
    ) -> Result<Vec<LeaderboardRow>, AppError> {
        let rows = sqlx::query_as(&format!(
            r#"
            {LEADERBOARD_ROW_SELECT}
            WHERE l.user_id = $1
            ORDER BY l.best_time ASC NULLS LAST
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn user_aggregate_stats(
        &self,
        user_id: i64,
    ) -> Result<UserAggregateStats, AppError> {
        let stats = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT l.route_id) AS routes_completed,
                   COALESCE(SUM(l.total_runs), 0)::bigint AS total_runs,
                   COALESCE(SUM(l.total_distance), 0) AS total_distance,
                   AVG(l.best_time) AS avg_best_time,
                   MIN(l.best_time) AS fastest_run,
                   MAX(l.best_time) AS slowest_run
            FROM leaderboard l
            WHERE l.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    /// Ended runs ordered by end time descending, for the activity feed.
    pub async fn recent_runs(&self, limit: i64, offset: i64) -> Result<Vec<RecentRun>, AppError> {
        let runs = sqlx::query_as(
            r#"
            SELECT ur.id, ur.started_at, ur.ended_at, ur.duration_seconds, ur.distance_km,
                   ur.pace_seconds_per_km, u.username, r.name AS route_name, r.difficulty,
                   r.district
            FROM runs ur
            JOIN users u ON ur.user_id = u.id
            JOIN routes r ON ur.route_id = r.id
            WHERE ur.ended_at IS NOT NULL
            ORDER BY ur.ended_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }

    pub async fn get_stats(&self) -> Result<Stats, AppError> {
        let stats = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM users) AS users,
                   (SELECT COUNT(*) FROM routes) AS routes,
                   (SELECT COUNT(*) FROM runs) AS runs,
                   (SELECT COUNT(*) FROM leaderboard) AS leaderboard_entries
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}

#[async_trait]
impl LeaderboardStore for Database {
    async fn user_exists(&self, user_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn route_exists(&self, route_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM routes WHERE id = $1)")
            .bind(route_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn ended_runs_for_pair(
        &self,
        user_id: i64,
        route_id: i64,
    ) -> Result<Vec<Run>, AppError> {
        let runs = sqlx::query_as(&format!(
            r#"
            SELECT {RUN_COLUMNS} FROM runs
            WHERE user_id = $1 AND route_id = $2 AND ended_at IS NOT NULL
            ORDER BY started_at
            "#
        ))
        .bind(user_id)
        .bind(route_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }

    async fn all_ended_runs(&self) -> Result<Vec<Run>, AppError> {
        let runs = sqlx::query_as(&format!(
            "SELECT {RUN_COLUMNS} FROM runs WHERE ended_at IS NOT NULL ORDER BY user_id, route_id, started_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }

    async fn load_entry(
        &self,
        user_id: i64,
        route_id: i64,
    ) -> Result<Option<LeaderboardEntry>, AppError> {
        let entry = sqlx::query_as(
            r#"
            SELECT user_id, route_id, best_time, fastest_pace, total_runs, total_distance,
                   total_duration, average_pace, last_run_date, updated_at
            FROM leaderboard
            WHERE user_id = $1 AND route_id = $2
            "#,
        )
        .bind(user_id)
        .bind(route_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn store_entry(
        &self,
        expected: Option<&LeaderboardEntry>,
        next: &LeaderboardEntry,
    ) -> Result<(), AppError> {
        let result = match expected {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO leaderboard (user_id, route_id, best_time, fastest_pace,
                                             total_runs, total_distance, total_duration,
                                             average_pace, last_run_date, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    ON CONFLICT (user_id, route_id) DO NOTHING
                    "#,
                )
                .bind(next.user_id)
                .bind(next.route_id)
                .bind(next.best_time)
                .bind(next.fastest_pace)
                .bind(next.total_runs)
                .bind(next.total_distance)
                .bind(next.total_duration)
                .bind(next.average_pace)
                .bind(next.last_run_date)
                .bind(next.updated_at)
                .execute(&self.pool)
                .await?
            }
            Some(prev) => {
                sqlx::query(
                    r#"
                    UPDATE leaderboard
                    SET best_time = $3, fastest_pace = $4, total_runs = $5,
                        total_distance = $6, total_duration = $7, average_pace = $8,
                        last_run_date = $9, updated_at = $10
                    WHERE user_id = $1 AND route_id = $2 AND updated_at = $11
                    "#,
                )
                .bind(next.user_id)
                .bind(next.route_id)
                .bind(next.best_time)
                .bind(next.fastest_pace)
                .bind(next.total_runs)
                .bind(next.total_distance)
                .bind(next.total_duration)
                .bind(next.average_pace)
                .bind(next.last_run_date)
                .bind(next.updated_at)
                .bind(prev.updated_at)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(AppError::ConcurrentUpdateConflict);
        }

        Ok(())
    }
}
