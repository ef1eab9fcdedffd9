//! HTTP request handlers for the Run Nepal API, organized by domain.

// Utility submodules
pub mod pagination;

// Handler modules
pub mod leaderboards;
pub mod routes;
pub mod runs;
pub mod stats;
pub mod users;

pub use leaderboards::{
    UserStatsResponse, get_difficulty_leaderboard, get_district_leaderboard,
    get_overall_leaderboard, get_recent_runs, get_route_leaderboard, get_user_stats,
    rebuild_leaderboard,
};
pub use routes::{CreateRouteRequest, ListRoutesQuery, create_route, get_route, list_routes};
pub use runs::{EndRunRequest, EndRunResponse, StartRunRequest, end_run, get_user_runs, start_run};
pub use stats::{get_stats, health_check};
pub use users::{NewUserRequest, all_users, new_user};
