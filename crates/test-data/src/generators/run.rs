//! Run history generation.

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use runnepal::aggregator::derive_pace;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};

use super::GeneratedRoute;

const WEATHER_CONDITIONS: &[&str] = &["sunny", "clear", "partly_cloudy", "cloudy", "rain"];

/// Generated run data ready for database insertion. Always an ended run.
#[derive(Debug, Clone)]
pub struct GeneratedRun {
    pub user_id: i64,
    pub route_id: i64,
    pub started_at: OffsetDateTime,
    pub duration_seconds: i32,
    pub distance_km: Decimal,
    pub pace_seconds_per_km: Option<Decimal>,
    pub weather: Option<Value>,
}

/// Configuration for run generation.
#[derive(Debug, Clone)]
pub struct RunGenConfig {
    /// How many runs each (user, route) pair gets, inclusive bounds.
    pub runs_per_pair: (usize, usize),
    /// Runs are spread over this many days before now.
    pub days_back: i64,
    /// Pace range in tenths of a second per km.
    pub pace_tenths: (i64, i64),
    /// Runs on routes longer than this cover a leg of the route instead of
    /// the full distance, in tenths of a km.
    pub leg_cap_tenths: i64,
    /// Probability that a run carries weather data.
    pub weather_fill_rate: f64,
}

impl Default for RunGenConfig {
    fn default() -> Self {
        Self {
            runs_per_pair: (1, 4),
            days_back: 90,
            // 4:00/km to 7:00/km
            pace_tenths: (2400, 4200),
            leg_cap_tenths: 250,
            weather_fill_rate: 0.7,
        }
    }
}

/// Generates plausible run histories for seeded users and routes.
pub struct RunGenerator {
    config: RunGenConfig,
}

impl RunGenerator {
    pub fn new() -> Self {
        Self {
            config: RunGenConfig::default(),
        }
    }

    pub fn with_config(config: RunGenConfig) -> Self {
        Self { config }
    }

    /// Generates a full history for one (user, route) pair.
    pub fn generate_history(
        &self,
        rng: &mut impl Rng,
        user_id: i64,
        route_id: i64,
        route: &GeneratedRoute,
    ) -> Vec<GeneratedRun> {
        let (min, max) = self.config.runs_per_pair;
        let count = rng.gen_range(min..=max);
        (0..count)
            .map(|_| self.generate(rng, user_id, route_id, route))
            .collect()
    }

    /// Generates a single ended run.
    pub fn generate(
        &self,
        rng: &mut impl Rng,
        user_id: i64,
        route_id: i64,
        route: &GeneratedRoute,
    ) -> GeneratedRun {
        let distance_km = self.run_distance(rng, route.distance_km);

        // Integer arithmetic keeps duration exact: pace and distance are both
        // carried in tenths, so their product is hundredths of a second.
        let pace_tenths = rng.gen_range(self.config.pace_tenths.0..=self.config.pace_tenths.1);
        let distance_tenths = (distance_km * Decimal::TEN).to_i64().unwrap_or(0);
        let duration_seconds = (pace_tenths * distance_tenths / 100) as i32;

        let started_at = OffsetDateTime::now_utc()
            - Duration::hours(rng.gen_range(1..self.config.days_back * 24));

        let weather = (rng.r#gen::<f64>() < self.config.weather_fill_rate)
            .then(|| self.generate_weather(rng));

        GeneratedRun {
            user_id,
            route_id,
            started_at,
            duration_seconds,
            distance_km,
            pace_seconds_per_km: derive_pace(duration_seconds, distance_km),
            weather,
        }
    }

    /// Short routes are run end to end; long treks get a partial leg.
    fn run_distance(&self, rng: &mut impl Rng, route_distance: Decimal) -> Decimal {
        let cap = Decimal::new(self.config.leg_cap_tenths, 1);
        if route_distance <= cap {
            route_distance
        } else {
            Decimal::new(rng.gen_range(80..=self.config.leg_cap_tenths), 1)
        }
    }

    fn generate_weather(&self, rng: &mut impl Rng) -> Value {
        let condition = WEATHER_CONDITIONS[rng.gen_range(0..WEATHER_CONDITIONS.len())];
        json!({
            "temperature": rng.gen_range(-5..30),
            "weather": condition,
            "humidity": rng.gen_range(40..90),
        })
    }
}

impl Default for RunGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::builtin_routes;

    #[test]
    fn generated_runs_are_internally_consistent() {
        let generator = RunGenerator::new();
        let mut rng = rand::thread_rng();
        let routes = builtin_routes();

        for route in &routes {
            for _ in 0..20 {
                let run = generator.generate(&mut rng, 1, 1, route);
                assert!(run.duration_seconds > 0);
                assert!(run.distance_km > Decimal::ZERO);
                assert!(run.distance_km <= route.distance_km);
                assert_eq!(
                    run.pace_seconds_per_km,
                    derive_pace(run.duration_seconds, run.distance_km),
                );
            }
        }
    }

    #[test]
    fn long_treks_get_partial_legs() {
        let generator = RunGenerator::new();
        let mut rng = rand::thread_rng();
        let routes = builtin_routes();
        let everest = routes
            .iter()
            .find(|r| r.name == "Everest Base Camp Trek")
            .unwrap();

        let run = generator.generate(&mut rng, 1, 2, everest);
        assert!(run.distance_km <= Decimal::new(250, 1));
    }

    #[test]
    fn history_size_respects_config() {
        let generator = RunGenerator::with_config(RunGenConfig {
            runs_per_pair: (2, 2),
            ..RunGenConfig::default()
        });
        let mut rng = rand::thread_rng();
        let routes = builtin_routes();

        let history = generator.generate_history(&mut rng, 1, 1, &routes[0]);
        assert_eq!(history.len(), 2);
    }
}
