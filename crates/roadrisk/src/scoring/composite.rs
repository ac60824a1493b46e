//! Weighted route score used for stored route-risk results.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Multipliers applied to each composite input. They need not sum to one; the
/// result is capped at 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeWeights {
    pub weather: f64,
    pub complexity: f64,
    pub traffic: f64,
    pub time_of_day: f64,
}

pub const ROUTE_WEIGHTS: CompositeWeights = CompositeWeights {
    weather: 0.6,
    complexity: 0.1,
    traffic: 0.3,
    time_of_day: 0.3,
};

/// Road characteristics known for a stored route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteTerrain {
    pub distance_km: f64,
    pub has_mountain_roads: bool,
    /// Share of the route on highways, 0-100.
    pub highway_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeFactors {
    pub weather_risk: f64,
    pub route_complexity: f64,
    pub traffic_risk: f64,
    pub time_of_day_risk: f64,
}

impl CompositeFactors {
    /// `segment_hazards` are per-segment weather hazard scores; `departure` is
    /// local time.
    pub fn evaluate(segment_hazards: &[f64], terrain: &RouteTerrain, departure: NaiveDateTime) -> Self {
        let weather_risk = if segment_hazards.is_empty() {
            0.0
        } else {
            (segment_hazards.iter().sum::<f64>() / segment_hazards.len() as f64).min(100.0)
        };

        let mut route_complexity = 0.0;
        if terrain.has_mountain_roads {
            route_complexity += 20.0;
        }
        if terrain.highway_percentage < 50.0 {
            route_complexity += 15.0;
        }
        if terrain.distance_km > 500.0 {
            route_complexity += 10.0;
        }

        let hour = departure.hour();
        let time_of_day_risk = if hour >= 22 || hour <= 5 { 20.0 } else { 0.0 };
        let traffic_risk = if (7..=9).contains(&hour) || (17..=19).contains(&hour) {
            15.0
        } else {
            0.0
        };

        Self {
            weather_risk,
            route_complexity,
            traffic_risk,
            time_of_day_risk,
        }
    }

    /// Weighted sum, rounded and capped at 100.
    pub fn score(&self, weights: &CompositeWeights) -> f64 {
        let raw = self.weather_risk * weights.weather
            + self.route_complexity * weights.complexity
            + self.traffic_risk * weights.traffic
            + self.time_of_day_risk * weights.time_of_day;
        raw.round().min(100.0)
    }
}
