//! Database seeder for inserting generated test data.

use sqlx::PgPool;
use thiserror::Error;
use time::Duration;
use tracing::info;

use crate::generators::{GeneratedRoute, GeneratedRun, GeneratedUser};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Inserts generated test data, reusing rows that already exist so the seed
/// can run repeatedly against the same database.
pub struct Seeder {
    pool: PgPool,
}

impl Seeder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Seeds users, returning their ids in input order.
    pub async fn seed_users(&self, users: &[GeneratedUser]) -> Result<Vec<i64>, SeedError> {
        info!("Seeding {} users...", users.len());

        let mut ids = Vec::with_capacity(users.len());
        for user in users {
            let inserted: Option<i64> = sqlx::query_scalar(
                r#"
                INSERT INTO users (username, email)
                VALUES ($1, $2)
                ON CONFLICT (username) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(&user.username)
            .bind(&user.email)
            .fetch_optional(&self.pool)
            .await?;

            let id = match inserted {
                Some(id) => id,
                None => {
                    sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
                        .bind(&user.username)
                        .fetch_one(&self.pool)
                        .await?
                }
            };
            ids.push(id);
        }

        info!("Seeded {} users", ids.len());
        Ok(ids)
    }

    /// Seeds routes, returning their ids in input order. Routes are matched
    /// by name since the table has no unique constraint on it.
    pub async fn seed_routes(&self, routes: &[GeneratedRoute]) -> Result<Vec<i64>, SeedError> {
        info!("Seeding {} routes...", routes.len());

        let mut ids = Vec::with_capacity(routes.len());
        for route in routes {
            let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM routes WHERE name = $1")
                .bind(&route.name)
                .fetch_optional(&self.pool)
                .await?;

            let id = match existing {
                Some(id) => id,
                None => {
                    sqlx::query_scalar(
                        r#"
                        INSERT INTO routes (name, description, distance_km, elevation_gain,
                                            elevation_loss, difficulty, district, region,
                                            coordinates, surface_type, estimated_time_seconds)
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                        RETURNING id
                        "#,
                    )
                    .bind(&route.name)
                    .bind(&route.description)
                    .bind(route.distance_km)
                    .bind(route.elevation_gain)
                    .bind(route.elevation_loss)
                    .bind(route.difficulty)
                    .bind(&route.district)
                    .bind(&route.region)
                    .bind(&route.coordinates)
                    .bind(&route.surface_type)
                    .bind(route.estimated_time_seconds)
                    .fetch_one(&self.pool)
                    .await?
                }
            };
            ids.push(id);
        }

        info!("Seeded {} routes", ids.len());
        Ok(ids)
    }

    /// Seeds ended runs. Unlike users and routes these are not deduplicated,
    /// so a repeated seed grows each runner's history.
    pub async fn seed_runs(&self, runs: &[GeneratedRun]) -> Result<usize, SeedError> {
        info!("Seeding {} runs...", runs.len());

        for run in runs {
            let ended_at = run.started_at + Duration::seconds(i64::from(run.duration_seconds));
            sqlx::query(
                r#"
                INSERT INTO runs (user_id, route_id, started_at, ended_at, duration_seconds,
                                  distance_km, pace_seconds_per_km, weather)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(run.user_id)
            .bind(run.route_id)
            .bind(run.started_at)
            .bind(ended_at)
            .bind(run.duration_seconds)
            .bind(run.distance_km)
            .bind(run.pace_seconds_per_km)
            .bind(&run.weather)
            .execute(&self.pool)
            .await?;
        }

        info!("Seeded {} runs", runs.len());
        Ok(runs.len())
    }
}
