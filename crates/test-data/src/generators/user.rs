//! User generation.

use fake::{Fake, faker::internet::en::Username};
use rand::Rng;

/// Generated user data ready for database insertion.
#[derive(Debug, Clone)]
pub struct GeneratedUser {
    pub username: String,
    pub email: String,
}

/// Generates user data for testing.
///
/// A fixed set of curated runners keeps seeded databases recognizable;
/// additional random users fill out the leaderboards.
pub struct UserGenerator;

impl UserGenerator {
    pub fn new() -> Self {
        Self
    }

    /// The well-known demo accounts every seeded database carries.
    pub fn curated(&self) -> Vec<GeneratedUser> {
        [
            ("sherpa_runner", "sherpa@example.com"),
            ("kathmandu_jogger", "jogger@example.com"),
            ("pokhara_trail", "trail@example.com"),
            ("demo_user", "demo@example.com"),
        ]
        .into_iter()
        .map(|(username, email)| GeneratedUser {
            username: username.to_string(),
            email: email.to_string(),
        })
        .collect()
    }

    /// Generates a single random user.
    pub fn generate(&self, rng: &mut impl Rng) -> GeneratedUser {
        let base: String = Username().fake_with_rng(rng);
        let suffix: u32 = rng.gen_range(100..10_000);
        let username = format!("{base}_{suffix}");
        let email = format!("{username}@example.com");
        GeneratedUser { username, email }
    }

    /// Curated accounts followed by `extra` random ones.
    pub fn curated_and_random(&self, rng: &mut impl Rng, extra: usize) -> Vec<GeneratedUser> {
        let mut users = self.curated();
        users.extend((0..extra).map(|_| self.generate(rng)));
        users
    }
}

impl Default for UserGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn curated_users_are_stable() {
        let users = UserGenerator::new().curated();
        assert_eq!(users.len(), 4);
        assert_eq!(users[0].username, "sherpa_runner");
    }

    #[test]
    fn random_usernames_do_not_collide_in_practice() {
        let g = UserGenerator::new();
        let mut rng = rand::thread_rng();
        let names: HashSet<String> = (0..50).map(|_| g.generate(&mut rng).username).collect();
        assert!(names.len() > 45);
    }
}
