//! Database seeding.

mod seeder;

pub use seeder::{SeedError, Seeder};
