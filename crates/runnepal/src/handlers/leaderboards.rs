//! Leaderboard read-side handlers and the administrative rebuild trigger.
//!
//! All ranking queries order by `best_time` ascending with nulls last,
//! breaking ties by `total_runs` descending. Empty result sets are empty
//! lists, not errors.

use axum::{
    Extension,
    extract::{Path, Query},
    response::Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    aggregator::{self, RebuildSummary},
    errors::AppError,
    models::{
        Difficulty, LeaderboardRow, OverallStanding, RecentRun, User, UserAggregateStats,
    },
    store::Database,
};

use super::pagination::PaginationQuery;

/// A user's full stats page: identity, per-route entries, aggregate block.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserStatsResponse {
    pub user: User,
    pub leaderboard: Vec<LeaderboardRow>,
    pub stats: UserAggregateStats,
}

/// Leaderboard for a single route.
#[utoipa::path(
    get,
    path = "/leaderboard/route/{route_id}",
    tag = "leaderboard",
    params(
        ("route_id" = i64, Path, description = "Route id"),
        ("limit" = i64, Query, description = "Maximum number of entries to return"),
        ("offset" = i64, Query, description = "Number of entries to skip")
    ),
    responses(
        (status = 200, description = "Ranked entries for the route", body = Vec<LeaderboardRow>),
        (status = 404, description = "Route not found")
    )
)]
pub async fn get_route_leaderboard(
    Extension(db): Extension<Database>,
    Path(route_id): Path<i64>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Vec<LeaderboardRow>>, AppError> {
    let (limit, offset) = pagination.validated()?;
    if db.get_route(route_id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let rows = db.route_leaderboard(route_id, limit, offset).await?;
    Ok(Json(rows))
}

/// Leaderboard scoped to a district (case-insensitive match).
#[utoipa::path(
    get,
    path = "/leaderboard/district/{district}",
    tag = "leaderboard",
    params(
        ("district" = String, Path, description = "District name, matched case-insensitively"),
        ("limit" = i64, Query, description = "Maximum number of entries to return"),
        ("offset" = i64, Query, description = "Number of entries to skip")
    ),
    responses(
        (status = 200, description = "Ranked entries for the district", body = Vec<LeaderboardRow>)
    )
)]
pub async fn get_district_leaderboard(
    Extension(db): Extension<Database>,
    Path(district): Path<String>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Vec<LeaderboardRow>>, AppError> {
    let (limit, offset) = pagination.validated()?;
    let rows = db.district_leaderboard(&district, limit, offset).await?;
    Ok(Json(rows))
}

/// Overall standing across all routes. Users without any leaderboard entry
/// are excluded.
#[utoipa::path(
    get,
    path = "/leaderboard/overall",
    tag = "leaderboard",
    params(
        ("limit" = i64, Query, description = "Maximum number of standings to return"),
        ("offset" = i64, Query, description = "Number of standings to skip")
    ),
    responses(
        (status = 200, description = "Per-user overall standings", body = Vec<OverallStanding>)
    )
)]
pub async fn get_overall_leaderboard(
    Extension(db): Extension<Database>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Vec<OverallStanding>>, AppError> {
    let (limit, offset) = pagination.validated()?;
    let rows = db.overall_leaderboard(limit, offset).await?;
    Ok(Json(rows))
}

/// One user's statistics: their entries plus aggregate totals.
#[utoipa::path(
    get,
    path = "/leaderboard/user/{user_id}",
    tag = "leaderboard",
    params(("user_id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User statistics", body = UserStatsResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_stats(
    Extension(db): Extension<Database>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserStatsResponse>, AppError> {
    let user = db.get_user(user_id).await?.ok_or(AppError::NotFound)?;
    let leaderboard = db.user_leaderboard_entries(user_id).await?;
    let stats = db.user_aggregate_stats(user_id).await?;
    Ok(Json(UserStatsResponse {
        user,
        leaderboard,
        stats,
    }))
}

/// Recent activity feed: ended runs, newest first.
#[utoipa::path(
    get,
    path = "/leaderboard/recent-runs",
    tag = "leaderboard",
    params(
        ("limit" = i64, Query, description = "Maximum number of runs to return"),
        ("offset" = i64, Query, description = "Number of runs to skip")
    ),
    responses(
        (status = 200, description = "Recently ended runs", body = Vec<RecentRun>)
    )
)]
pub async fn get_recent_runs(
    Extension(db): Extension<Database>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Vec<RecentRun>>, AppError> {
    let (limit, offset) = pagination.validated()?;
    let runs = db.recent_runs(limit, offset).await?;
    Ok(Json(runs))
}

/// Leaderboard scoped to routes of one difficulty.
#[utoipa::path(
    get,
    path = "/leaderboard/difficulty/{difficulty}",
    tag = "leaderboard",
    params(
        ("difficulty" = Difficulty, Path, description = "Route difficulty"),
        ("limit" = i64, Query, description = "Maximum number of entries to return"),
        ("offset" = i64, Query, description = "Number of entries to skip")
    ),
    responses(
        (status = 200, description = "Ranked entries for the difficulty", body = Vec<LeaderboardRow>)
    )
)]
pub async fn get_difficulty_leaderboard(
    Extension(db): Extension<Database>,
    Path(difficulty): Path<Difficulty>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Vec<LeaderboardRow>>, AppError> {
    let (limit, offset) = pagination.validated()?;
    let rows = db.difficulty_leaderboard(difficulty, limit, offset).await?;
    Ok(Json(rows))
}

/// Rebuild every leaderboard entry from the full run history. Administrative;
/// also invoked by the seed process.
#[utoipa::path(
    post,
    path = "/leaderboard/rebuild",
    tag = "leaderboard",
    responses(
        (status = 200, description = "Rebuild summary", body = RebuildSummary)
    )
)]
pub async fn rebuild_leaderboard(
    Extension(db): Extension<Database>,
) -> Result<Json<RebuildSummary>, AppError> {
    let summary = aggregator::rebuild_leaderboard(&db).await?;
    Ok(Json(summary))
}
