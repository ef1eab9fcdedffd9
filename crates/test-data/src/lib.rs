//! Test data generation for run-nepal.
//!
//! This crate provides tools for generating realistic users, routes, and run
//! histories to support manual verification and integration testing, plus a
//! `seed` binary that populates a database and rebuilds the leaderboard.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_data::prelude::*;
//!
//! let mut rng = rand::thread_rng();
//! let seeder = Seeder::new(pool.clone());
//!
//! let users = UserGenerator::new().curated_and_random(&mut rng, 8);
//! let user_ids = seeder.seed_users(&users).await?;
//!
//! let route_ids = seeder.seed_routes(&builtin_routes()).await?;
//! ```

pub mod db;
pub mod generators;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::db::{SeedError, Seeder};
    pub use crate::generators::{
        GeneratedRoute, GeneratedRun, GeneratedUser, RunGenConfig, RunGenerator, UserGenerator,
        builtin_routes,
    };
}
