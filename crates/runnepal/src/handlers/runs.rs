//! Run tracking handlers: start a run, end it, read history.
//!
//! Ending a run is the producer side of the aggregation flow: the run row is
//! persisted first, then the aggregator folds it into the pair's leaderboard
//! entry. Both happen within the request; a failed merge surfaces to the
//! caller and leaves the previous entry intact.

use axum::{
    Extension,
    extract::{Path, Query},
    response::Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    aggregator,
    errors::AppError,
    models::{LeaderboardEntry, RecentRun, Run},
    store::Database,
};

use super::pagination::PaginationQuery;

/// Request body for starting a run.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartRunRequest {
    pub user_id: i64,
}

/// Request body for ending a run.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EndRunRequest {
    pub run_id: i64,
    pub user_id: i64,
    /// Distance covered as reported by the tracking client, in km.
    pub distance_km: Decimal,
    pub weather: Option<serde_json::Value>,
}

/// Response for a completed run: the final run row plus the leaderboard entry
/// it was merged into.
#[derive(Debug, Serialize, ToSchema)]
pub struct EndRunResponse {
    pub run: Run,
    pub entry: LeaderboardEntry,
}

/// Start a run on a route.
#[utoipa::path(
    post,
    path = "/routes/{id}/start",
    tag = "runs",
    params(("id" = i64, Path, description = "Route id")),
    request_body = StartRunRequest,
    responses(
        (status = 200, description = "Run started", body = Run),
        (status = 404, description = "Route or user not found")
    )
)]
pub async fn start_run(
    Extension(db): Extension<Database>,
    Path(route_id): Path<i64>,
    Json(req): Json<StartRunRequest>,
) -> Result<Json<Run>, AppError> {
    if db.get_route(route_id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let run = db.start_run(req.user_id, route_id).await?;
    Ok(Json(run))
}

/// End an in-progress run and merge it into the leaderboard.
#[utoipa::path(
    post,
    path = "/routes/{id}/end",
    tag = "runs",
    params(("id" = i64, Path, description = "Route id")),
    request_body = EndRunRequest,
    responses(
        (status = 200, description = "Run completed and aggregated", body = EndRunResponse),
        (status = 400, description = "Run already ended or invalid metrics"),
        (status = 404, description = "Run not found")
    )
)]
pub async fn end_run(
    Extension(db): Extension<Database>,
    Path(route_id): Path<i64>,
    Json(req): Json<EndRunRequest>,
) -> Result<Json<EndRunResponse>, AppError> {
    if req.distance_km < Decimal::ZERO {
        return Err(AppError::InvalidInput(
            "distance_km must be non-negative".to_string(),
        ));
    }

    let run = db.get_run(req.run_id).await?.ok_or(AppError::NotFound)?;
    if run.user_id != req.user_id || run.route_id != route_id {
        return Err(AppError::NotFound);
    }
    if run.is_ended() {
        return Err(AppError::InvalidInput("run has already ended".to_string()));
    }

    let ended_at = OffsetDateTime::now_utc();
    let duration_seconds = i32::try_from((ended_at - run.started_at).whole_seconds().max(0))
        .map_err(|_| AppError::InvalidInput("run duration out of range".to_string()))?;
    let pace = aggregator::derive_pace(duration_seconds, req.distance_km);

    let run = db
        .end_run(
            req.run_id,
            ended_at,
            duration_seconds,
            req.distance_km,
            pace,
            req.weather.as_ref(),
        )
        .await?
        .ok_or_else(|| AppError::InvalidInput("run has already ended".to_string()))?;

    let entry = aggregator::merge_run(&db, &run).await?;

    Ok(Json(EndRunResponse { run, entry }))
}

/// A user's run history, newest first.
#[utoipa::path(
    get,
    path = "/users/{id}/runs",
    tag = "runs",
    params(
        ("id" = i64, Path, description = "User id"),
        ("limit" = i64, Query, description = "Maximum number of runs to return"),
        ("offset" = i64, Query, description = "Number of runs to skip")
    ),
    responses(
        (status = 200, description = "Run history", body = Vec<RecentRun>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_runs(
    Extension(db): Extension<Database>,
    Path(user_id): Path<i64>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Vec<RecentRun>>, AppError> {
    let (limit, offset) = pagination.validated()?;
    if db.get_user(user_id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    let runs = db.user_run_history(user_id, limit, offset).await?;
    Ok(Json(runs))
}
