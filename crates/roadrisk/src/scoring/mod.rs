//! Composite risk scoring.
//!
//! Four category sub-scores are computed independently, each clamped to its own
//! ceiling (vehicle 40, weather 50, location 35, time 15). Their sum is clamped to
//! `[0, 100]` and mapped to a [`RiskLevel`]. All time-dependent rules work on South
//! African local time, passed in explicitly so results are reproducible.

mod alerts;
mod claims;
pub mod composite;
mod factors;
mod recommendations;
pub mod thresholds;

pub use alerts::{area_alerts, AlertKind, RealTimeAlerts, RiskAlert};
pub use claims::ClaimProbability;
pub use composite::{CompositeFactors, CompositeWeights, RouteTerrain, ROUTE_WEIGHTS};
pub use factors::{AgeBand, HotspotMatch, Intensity, TimeWindow};
pub use recommendations::{Priority, Recommendation, RecommendationCategory};

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;
use crate::providers::{CrimeDataset, Hotspot, VehicleProfile, WeatherConditions};

/// South Africa Standard Time has no daylight saving.
pub const SAST_OFFSET_HOURS: i64 = 2;

/// Wall-clock time in South Africa for a UTC instant.
pub fn to_sast(at: DateTime<Utc>) -> NaiveDateTime {
    (at + Duration::hours(SAST_OFFSET_HOURS)).naive_utc()
}

/// UTC instant for a South African wall-clock time.
pub fn from_sast(local: NaiveDateTime) -> DateTime<Utc> {
    (local - Duration::hours(SAST_OFFSET_HOURS)).and_utc()
}

/// Wall-clock layouts accepted without an offset. `%.f` also matches no fraction.
const LOCAL_DEPARTURE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid departure time '{0}', expected ISO 8601")]
pub struct InvalidDeparture(pub String);

fn parse_wall_clock(value: &str) -> Option<NaiveDateTime> {
    LOCAL_DEPARTURE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Parses an ISO 8601 departure time.
///
/// Timestamps with an offset or `Z` are taken as given. Timestamps without one
/// (minutes, seconds or fractional seconds) are South African local time. A bare
/// date is midnight UTC, matching how JavaScript clients serialise dates.
pub fn parse_departure(value: &str) -> Result<DateTime<Utc>, InvalidDeparture> {
    let trimmed = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Some(utc) = trimmed.strip_suffix(['Z', 'z']).and_then(parse_wall_clock) {
        return Ok(utc.and_utc());
    }
    if let Some(local) = parse_wall_clock(trimmed) {
        return Ok(from_sast(local));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| InvalidDeparture(value.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// `<25` Low, `<50` Medium, `<75` High, otherwise Critical.
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            Self::Low
        } else if score < 50.0 {
            Self::Medium
        } else if score < 75.0 {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Vehicle,
    Weather,
    Location,
    Time,
}

/// Category-specific evidence behind a sub-score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactorDetails {
    Vehicle {
        vehicle_age: i32,
        driver_age: u32,
        age_band: AgeBand,
    },
    Weather {
        precipitation: f64,
        wind_speed: f64,
        visibility: f64,
        temperature: f64,
        severity: Intensity,
    },
    Location {
        hotspot_matches: Vec<HotspotMatch>,
        route_length_km: f64,
        urban: bool,
        band: Intensity,
    },
    Time {
        hour: u32,
        weekday: u32,
        hourly_risk: f64,
        weekly_risk: f64,
        window: TimeWindow,
    },
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub score: f64,
    pub factors: Vec<String>,
    pub details: FactorDetails,
}

/// Output of [`RiskCalculator::calculate_risk_score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    #[serde(rename = "overallRiskScore")]
    pub overall_score: f64,
    #[serde(rename = "riskLevel")]
    pub level: RiskLevel,
    #[serde(rename = "riskFactors")]
    pub factors: BTreeMap<RiskCategory, RiskFactor>,
    pub recommendations: Vec<Recommendation>,
    #[serde(rename = "timestamp")]
    pub assessed_at: NaiveDateTime,
}

impl RiskAssessment {
    pub fn factor(&self, category: RiskCategory) -> Option<&RiskFactor> {
        self.factors.get(&category)
    }

    /// Sum of the category sub-scores before the overall clamp.
    pub fn factor_total(&self) -> f64 {
        self.factors.values().map(|factor| factor.score).sum()
    }
}

/// Path (and optionally a known length) the calculator scores for location risk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteProfile {
    #[serde(default)]
    pub coordinates: Vec<Coordinates>,
    #[serde(default, rename = "distance", skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl RouteProfile {
    pub fn point(location: Coordinates) -> Self {
        Self {
            coordinates: vec![location],
            distance_km: None,
        }
    }

    pub fn path(coordinates: Vec<Coordinates>, distance_km: Option<f64>) -> Self {
        Self {
            coordinates,
            distance_km,
        }
    }
}

/// Stateless scorer over a fixed hotspot table.
#[derive(Debug, Clone)]
pub struct RiskCalculator {
    hotspots: Vec<Hotspot>,
}

impl RiskCalculator {
    pub fn new(hotspots: Vec<Hotspot>) -> Self {
        Self { hotspots }
    }

    pub fn from_dataset(dataset: &CrimeDataset) -> Self {
        Self::new(dataset.hotspots().to_vec())
    }

    pub fn hotspots(&self) -> &[Hotspot] {
        &self.hotspots
    }

    /// Scores one trip. `at` is local wall-clock time.
    pub fn calculate_risk_score(
        &self,
        vehicle: &VehicleProfile,
        route: Option<&RouteProfile>,
        weather: Option<&WeatherConditions>,
        at: NaiveDateTime,
    ) -> RiskAssessment {
        let mut breakdown = BTreeMap::new();
        breakdown.insert(RiskCategory::Vehicle, factors::vehicle_risk(vehicle, at));
        breakdown.insert(RiskCategory::Weather, factors::weather_risk(weather));
        breakdown.insert(
            RiskCategory::Location,
            factors::location_risk(&self.hotspots, route),
        );
        breakdown.insert(RiskCategory::Time, factors::time_risk(at));

        let total: f64 = breakdown.values().map(|factor: &RiskFactor| factor.score).sum();
        let clamped = total.clamp(0.0, 100.0);
        let recommendations = recommendations::generate(clamped, &breakdown);

        RiskAssessment {
            overall_score: (clamped * 100.0).round() / 100.0,
            level: RiskLevel::from_score(clamped),
            factors: breakdown,
            recommendations,
            assessed_at: at,
        }
    }
}

impl Default for RiskCalculator {
    fn default() -> Self {
        Self::from_dataset(&CrimeDataset::south_africa())
    }
}
