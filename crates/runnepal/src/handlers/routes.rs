//! Route catalogue handlers.

use axum::{
    Extension,
    extract::{Path, Query},
    response::Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    errors::AppError,
    models::{Difficulty, Route},
    store::Database,
};

use super::pagination::default_limit;

/// Route listing query parameters.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListRoutesQuery {
    /// Case-insensitive district filter (partial match).
    pub district: Option<String>,
    /// Exact difficulty filter.
    pub difficulty: Option<Difficulty>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Route creation request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRouteRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub distance_km: Decimal,
    #[serde(default)]
    pub elevation_gain: i32,
    #[serde(default)]
    pub elevation_loss: i32,
    pub difficulty: Difficulty,
    #[validate(length(min = 1, max = 128))]
    pub district: String,
    pub region: Option<String>,
    pub coordinates: Option<serde_json::Value>,
    pub surface_type: Option<String>,
    pub estimated_time_seconds: Option<i32>,
}

/// List routes, optionally filtered by district and difficulty.
#[utoipa::path(
    get,
    path = "/routes",
    tag = "routes",
    params(
        ("district" = Option<String>, Query, description = "Case-insensitive district filter"),
        ("difficulty" = Option<Difficulty>, Query, description = "Difficulty filter"),
        ("limit" = i64, Query, description = "Maximum number of routes to return"),
        ("offset" = i64, Query, description = "Number of routes to skip")
    ),
    responses(
        (status = 200, description = "List of routes", body = Vec<Route>)
    )
)]
pub async fn list_routes(
    Extension(db): Extension<Database>,
    Query(params): Query<ListRoutesQuery>,
) -> Result<Json<Vec<Route>>, AppError> {
    let (limit, offset) = super::pagination::PaginationQuery {
        limit: params.limit,
        offset: params.offset,
    }
    .validated()?;
    let routes = db
        .list_routes(params.district.as_deref(), params.difficulty, limit, offset)
        .await?;
    Ok(Json(routes))
}

/// Get a single route by id.
#[utoipa::path(
    get,
    path = "/routes/{id}",
    tag = "routes",
    params(("id" = i64, Path, description = "Route id")),
    responses(
        (status = 200, description = "The route", body = Route),
        (status = 404, description = "Route not found")
    )
)]
pub async fn get_route(
    Extension(db): Extension<Database>,
    Path(id): Path<i64>,
) -> Result<Json<Route>, AppError> {
    let route = db.get_route(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(route))
}

/// Create a new route. Routes are immutable once created.
#[utoipa::path(
    post,
    path = "/routes",
    tag = "routes",
    request_body = CreateRouteRequest,
    responses(
        (status = 200, description = "Route created successfully", body = Route),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_route(
    Extension(db): Extension<Database>,
    Json(req): Json<CreateRouteRequest>,
) -> Result<Json<Route>, AppError> {
    req.validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;
    if req.distance_km <= Decimal::ZERO {
        return Err(AppError::InvalidInput(
            "distance_km must be positive".to_string(),
        ));
    }
    if req.elevation_gain < 0 || req.elevation_loss < 0 {
        return Err(AppError::InvalidInput(
            "elevation must be non-negative".to_string(),
        ));
    }

    let route = db
        .create_route(
            &req.name,
            req.description.as_deref(),
            req.distance_km,
            req.elevation_gain,
            req.elevation_loss,
            req.difficulty,
            &req.district,
            req.region.as_deref(),
            req.coordinates.as_ref(),
            req.surface_type.as_deref(),
            req.estimated_time_seconds,
        )
        .await?;
    Ok(Json(route))
}
