pub mod aggregator;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod query_builder;
pub mod store;

use axum::{
    Extension, Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use sqlx::PgPool;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    handlers::{
        all_users, create_route, end_run, get_difficulty_leaderboard, get_district_leaderboard,
        get_overall_leaderboard, get_recent_runs, get_route, get_route_leaderboard, get_stats,
        get_user_runs, get_user_stats, health_check, list_routes, new_user, rebuild_leaderboard,
        start_run,
    },
    store::Database,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::stats::health_check,
        handlers::stats::get_stats,
        handlers::users::new_user,
        handlers::users::all_users,
        handlers::routes::list_routes,
        handlers::routes::get_route,
        handlers::routes::create_route,
        handlers::runs::start_run,
        handlers::runs::end_run,
        handlers::runs::get_user_runs,
        handlers::leaderboards::get_route_leaderboard,
        handlers::leaderboards::get_district_leaderboard,
        handlers::leaderboards::get_overall_leaderboard,
        handlers::leaderboards::get_user_stats,
        handlers::leaderboards::get_recent_runs,
        handlers::leaderboards::get_difficulty_leaderboard,
        handlers::leaderboards::rebuild_leaderboard,
    ),
    components(schemas(
        models::User,
        models::Route,
        models::Run,
        models::Difficulty,
        models::LeaderboardEntry,
        models::LeaderboardRow,
        models::OverallStanding,
        models::UserAggregateStats,
        models::RecentRun,
        models::Stats,
        aggregator::RebuildSummary,
        handlers::UserStatsResponse,
        handlers::NewUserRequest,
        handlers::CreateRouteRequest,
        handlers::StartRunRequest,
        handlers::EndRunRequest,
        handlers::EndRunResponse,
    ))
)]
struct ApiDoc;

pub fn create_router(pool: PgPool) -> Router {
    let db = Database::new(pool);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        // User routes
        .route("/users", get(all_users).post(new_user))
        .route("/users/{id}/runs", get(get_user_runs))
        // Route catalogue
        .route("/routes", get(list_routes).post(create_route))
        .route("/routes/{id}", get(get_route))
        // Run tracking
        .route("/routes/{id}/start", post(start_run))
        .route("/routes/{id}/end", post(end_run))
        // Leaderboards
        .route("/leaderboard/route/{route_id}", get(get_route_leaderboard))
        .route(
            "/leaderboard/district/{district}",
            get(get_district_leaderboard),
        )
        .route("/leaderboard/overall", get(get_overall_leaderboard))
        .route("/leaderboard/user/{user_id}", get(get_user_stats))
        .route("/leaderboard/recent-runs", get(get_recent_runs))
        .route(
            "/leaderboard/difficulty/{difficulty}",
            get(get_difficulty_leaderboard),
        )
        .route("/leaderboard/rebuild", post(rebuild_leaderboard))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(Extension(db))
        .layer(cors)
        .layer(CompressionLayer::new())
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
}

pub async fn run_server(pool: PgPool, port: u16) -> anyhow::Result<()> {
    let app = create_router(pool);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    tracing::info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
