//! Tunable cut-offs and lookup tables for the calculator.

use crate::geo::Coordinates;

pub const VEHICLE_CEILING: f64 = 40.0;
pub const WEATHER_CEILING: f64 = 50.0;
pub const LOCATION_CEILING: f64 = 35.0;
pub const TIME_CEILING: f64 = 15.0;

/// Sub-score used when a category has no input data.
pub const MISSING_DATA_SCORE: f64 = 10.0;

pub const NEW_VEHICLE_YEARS: i32 = 3;
pub const MODERATE_VEHICLE_YEARS: i32 = 7;
pub const OLD_VEHICLE_YEARS: i32 = 15;

pub const HIGH_RISK_MODELS: [&str; 5] = ["bmw", "mercedes", "audi", "volkswagen", "toyota hilux"];

/// Low, medium and high cut-offs (inclusive), in mm.
pub const PRECIPITATION_MM: [f64; 3] = [2.0, 10.0, 20.0];
/// Low, medium and high cut-offs (inclusive), in km/h.
pub const WIND_KMH: [f64; 3] = [25.0, 40.0, 60.0];
/// Worst-first visibility cut-offs (inclusive), in km.
pub const VISIBILITY_KM: [f64; 3] = [1.0, 3.0, 5.0];
pub const COLD_CELSIUS: f64 = 5.0;
pub const HOT_CELSIUS: f64 = 35.0;
pub const HUMID_PERCENT: f64 = 90.0;

pub const HOTSPOT_INFLUENCE_KM: f64 = 5.0;
pub const HOTSPOT_NEAR_KM: f64 = 2.0;

/// Relative crime and accident risk by local hour, midnight first.
pub const HOURLY_RISK: [f64; 24] = [
    15.0, 20.0, 25.0, 30.0, 25.0, 15.0, 10.0, 5.0, 8.0, 5.0, 5.0, 5.0, 8.0, 5.0, 5.0, 8.0, 10.0,
    15.0, 20.0, 25.0, 30.0, 25.0, 20.0, 18.0,
];

/// Relative risk by weekday, Sunday first.
pub const WEEKLY_RISK: [f64; 7] = [10.0, 5.0, 5.0, 5.0, 8.0, 15.0, 20.0];

pub const HOURLY_WEIGHT: f64 = 0.5;
pub const WEEKLY_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct City {
    pub name: &'static str,
    pub centre: Coordinates,
    pub radius_km: f64,
}

/// A route touching any of these radii counts as urban.
pub const MAJOR_CITIES: [City; 5] = [
    City {
        name: "Johannesburg",
        centre: Coordinates::new(-26.2041, 28.0473),
        radius_km: 25.0,
    },
    City {
        name: "Cape Town",
        centre: Coordinates::new(-33.9249, 18.4241),
        radius_km: 30.0,
    },
    City {
        name: "Durban",
        centre: Coordinates::new(-29.8587, 31.0218),
        radius_km: 25.0,
    },
    City {
        name: "Pretoria",
        centre: Coordinates::new(-25.7479, 28.2293),
        radius_km: 20.0,
    },
    City {
        name: "Port Elizabeth",
        centre: Coordinates::new(-33.9608, 25.6022),
        radius_km: 15.0,
    },
];

/// Late-night window used by alerts and the time factor: 22:00 to 04:59.
pub fn is_high_risk_hour(hour: u32) -> bool {
    hour >= 22 || hour <= 4
}
