//! Default seed script, creates demo users, the Nepal route catalogue, run
//! histories, and rebuilds the leaderboard from them.
//!
//! Run with:
//! ```
//! cargo run -p test-data --bin seed
//! ```

use rand::Rng;
use runnepal::aggregator;
use runnepal::store::Database;
use sqlx::postgres::PgPoolOptions;
use test_data::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://docker:pg@0.0.0.0/runnepal".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    let mut rng = rand::thread_rng();
    let seeder = Seeder::new(pool.clone());

    let users = UserGenerator::new().curated_and_random(&mut rng, 8);
    let user_ids = seeder.seed_users(&users).await?;

    let routes = builtin_routes();
    let route_ids = seeder.seed_routes(&routes).await?;

    // Each runner picks up a subset of the catalogue.
    let run_generator = RunGenerator::new();
    let mut runs = Vec::new();
    for &user_id in &user_ids {
        for (&route_id, route) in route_ids.iter().zip(&routes) {
            if rng.r#gen::<f64>() < 0.6 {
                runs.extend(run_generator.generate_history(&mut rng, user_id, route_id, route));
            }
        }
    }
    seeder.seed_runs(&runs).await?;

    let db = Database::new(pool);
    let summary = aggregator::rebuild_leaderboard(&db).await?;

    tracing::info!("Seed completed!");
    tracing::info!("  Users: {}", user_ids.len());
    tracing::info!("  Routes: {}", route_ids.len());
    tracing::info!("  Runs: {}", runs.len());
    tracing::info!(
        "  Leaderboard: {} pairs, {} written, {} unchanged",
        summary.pairs,
        summary.written,
        summary.unchanged
    );

    Ok(())
}
