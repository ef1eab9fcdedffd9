//! Generators for users, routes, and run histories.

mod route;
mod run;
mod user;

pub use route::{GeneratedRoute, builtin_routes};
pub use run::{GeneratedRun, RunGenConfig, RunGenerator};
pub use user::{GeneratedUser, UserGenerator};
