//! Curated Nepal route catalogue.

use rust_decimal::Decimal;
use runnepal::models::Difficulty;
use serde_json::{Value, json};

/// Generated route data ready for database insertion.
#[derive(Debug, Clone)]
pub struct GeneratedRoute {
    pub name: String,
    pub description: Option<String>,
    pub distance_km: Decimal,
    pub elevation_gain: i32,
    pub elevation_loss: i32,
    pub difficulty: Difficulty,
    pub district: String,
    pub region: Option<String>,
    pub coordinates: Option<Value>,
    pub surface_type: Option<String>,
    pub estimated_time_seconds: Option<i32>,
}

struct RouteSpec {
    name: &'static str,
    description: &'static str,
    distance_tenths_km: i64,
    elevation_gain: i32,
    difficulty: Difficulty,
    district: &'static str,
    region: &'static str,
    surface_type: &'static str,
    estimated_time_seconds: i32,
    coordinates: fn() -> Value,
}

const ROUTES: &[RouteSpec] = &[
    RouteSpec {
        name: "Annapurna Base Camp Trek",
        description: "A classic trek to the base camp of Annapurna I through \
                      traditional Gurung villages, with views of the Annapurna massif.",
        distance_tenths_km: 1150,
        elevation_gain: 4130,
        difficulty: Difficulty::Hard,
        district: "Kaski",
        region: "Gandaki",
        surface_type: "trail",
        estimated_time_seconds: 86_400,
        coordinates: || {
            json!({
                "start": { "lat": 28.3949, "lng": 83.8566 },
                "end": { "lat": 28.5964, "lng": 83.8203 },
                "waypoints": [
                    { "lat": 28.3949, "lng": 83.8566, "name": "Nayapul" },
                    { "lat": 28.4567, "lng": 83.8234, "name": "Ghandruk" },
                    { "lat": 28.5234, "lng": 83.8123, "name": "Chhomrong" },
                    { "lat": 28.5964, "lng": 83.8203, "name": "Annapurna Base Camp" }
                ]
            })
        },
    },
    RouteSpec {
        name: "Everest Base Camp Trek",
        description: "The ultimate trek to the base of the world's highest mountain, \
                      through Sherpa villages and past Namche Bazaar.",
        distance_tenths_km: 1300,
        elevation_gain: 5364,
        difficulty: Difficulty::Expert,
        district: "Solukhumbu",
        region: "Sagarmatha",
        surface_type: "trail",
        estimated_time_seconds: 100_800,
        coordinates: || {
            json!({
                "start": { "lat": 27.7172, "lng": 86.7144 },
                "end": { "lat": 28.0026, "lng": 86.8528 },
                "waypoints": [
                    { "lat": 27.7172, "lng": 86.7144, "name": "Lukla" },
                    { "lat": 27.8234, "lng": 86.7456, "name": "Namche Bazaar" },
                    { "lat": 27.9123, "lng": 86.7890, "name": "Dingboche" },
                    { "lat": 28.0026, "lng": 86.8528, "name": "Everest Base Camp" }
                ]
            })
        },
    },
    RouteSpec {
        name: "Pokhara Lakeside Run",
        description: "A scenic loop around Phewa Lake with Machapuchare views, \
                      suited to beginners.",
        distance_tenths_km: 85,
        elevation_gain: 150,
        difficulty: Difficulty::Easy,
        district: "Kaski",
        region: "Gandaki",
        surface_type: "paved",
        estimated_time_seconds: 3_600,
        coordinates: || {
            json!({
                "start": { "lat": 28.2096, "lng": 83.9856 },
                "end": { "lat": 28.2096, "lng": 83.9856 },
                "waypoints": [
                    { "lat": 28.2096, "lng": 83.9856, "name": "Lakeside Start" },
                    { "lat": 28.2156, "lng": 83.9912, "name": "Barahi Temple" },
                    { "lat": 28.2096, "lng": 83.9856, "name": "Lakeside End" }
                ]
            })
        },
    },
    RouteSpec {
        name: "Kathmandu Valley Heritage Trail",
        description: "A city loop through the UNESCO World Heritage sites of \
                      the Kathmandu Valley.",
        distance_tenths_km: 120,
        elevation_gain: 300,
        difficulty: Difficulty::Medium,
        district: "Kathmandu",
        region: "Bagmati",
        surface_type: "mixed",
        estimated_time_seconds: 7_200,
        coordinates: || {
            json!({
                "start": { "lat": 27.7172, "lng": 85.3240 },
                "end": { "lat": 27.7172, "lng": 85.3240 },
                "waypoints": [
                    { "lat": 27.7172, "lng": 85.3240, "name": "Durbar Square" },
                    { "lat": 27.7234, "lng": 85.3456, "name": "Swayambhunath" },
                    { "lat": 27.7123, "lng": 85.3567, "name": "Pashupatinath" },
                    { "lat": 27.7172, "lng": 85.3240, "name": "Boudhanath" }
                ]
            })
        },
    },
    RouteSpec {
        name: "Chitwan Jungle Trail",
        description: "A lowland trail through the Terai near Chitwan National Park, \
                      with wildlife along the Rapti River.",
        distance_tenths_km: 150,
        elevation_gain: 100,
        difficulty: Difficulty::Medium,
        district: "Chitwan",
        region: "Narayani",
        surface_type: "trail",
        estimated_time_seconds: 5_400,
        coordinates: || {
            json!({
                "start": { "lat": 27.5234, "lng": 84.3456 },
                "end": { "lat": 27.5234, "lng": 84.3456 },
                "waypoints": [
                    { "lat": 27.5234, "lng": 84.3456, "name": "Sauraha" },
                    { "lat": 27.5345, "lng": 84.3567, "name": "Jungle Trail" },
                    { "lat": 27.5234, "lng": 84.3456, "name": "Riverside" }
                ]
            })
        },
    },
    RouteSpec {
        name: "Lumbini Peace Run",
        description: "A flat run through the gardens and monasteries of the \
                      birthplace of Buddha.",
        distance_tenths_km: 60,
        elevation_gain: 50,
        difficulty: Difficulty::Easy,
        district: "Rupandehi",
        region: "Lumbini",
        surface_type: "paved",
        estimated_time_seconds: 2_700,
        coordinates: || {
            json!({
                "start": { "lat": 27.4567, "lng": 83.2345 },
                "end": { "lat": 27.4567, "lng": 83.2345 },
                "waypoints": [
                    { "lat": 27.4567, "lng": 83.2345, "name": "Maya Devi Temple" },
                    { "lat": 27.4678, "lng": 83.2456, "name": "World Peace Pagoda" },
                    { "lat": 27.4567, "lng": 83.2345, "name": "Monastery Gardens" }
                ]
            })
        },
    },
];

/// The built-in catalogue of Nepal routes used by the seed binary.
pub fn builtin_routes() -> Vec<GeneratedRoute> {
    ROUTES
        .iter()
        .map(|spec| GeneratedRoute {
            name: spec.name.to_string(),
            description: Some(spec.description.to_string()),
            distance_km: Decimal::new(spec.distance_tenths_km, 1),
            elevation_gain: spec.elevation_gain,
            elevation_loss: spec.elevation_gain,
            difficulty: spec.difficulty,
            district: spec.district.to_string(),
            region: Some(spec.region.to_string()),
            coordinates: Some((spec.coordinates)()),
            surface_type: Some(spec.surface_type.to_string()),
            estimated_time_seconds: Some(spec.estimated_time_seconds),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_covers_multiple_districts_and_difficulties() {
        let routes = builtin_routes();
        assert_eq!(routes.len(), 6);

        let districts: std::collections::HashSet<_> =
            routes.iter().map(|r| r.district.as_str()).collect();
        assert!(districts.len() >= 4);

        assert!(routes.iter().any(|r| r.difficulty == Difficulty::Expert));
        assert!(routes.iter().any(|r| r.difficulty == Difficulty::Easy));
    }

    #[test]
    fn distances_are_positive() {
        for route in builtin_routes() {
            assert!(route.distance_km > Decimal::ZERO, "{}", route.name);
        }
    }
}
