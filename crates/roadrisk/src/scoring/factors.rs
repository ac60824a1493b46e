use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::thresholds::*;
use super::{FactorDetails, RiskFactor, RouteProfile};
use crate::geo::{haversine_km, path_length_km};
use crate::providers::{Hotspot, VehicleProfile, WeatherConditions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBand {
    New,
    Moderate,
    Old,
}

/// Coarse banding reported next to a sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Moderate,
    High,
    Severe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    HighRisk,
    ModerateRisk,
    Normal,
}

impl TimeWindow {
    pub fn for_hour(hour: u32) -> Self {
        if is_high_risk_hour(hour) {
            Self::HighRisk
        } else if (6..=18).contains(&hour) {
            Self::ModerateRisk
        } else {
            Self::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotMatch {
    pub name: String,
    pub distance_km: f64,
    pub risk_level: f64,
}

fn unavailable(reason: &str) -> RiskFactor {
    RiskFactor {
        score: MISSING_DATA_SCORE,
        factors: vec![reason.to_string()],
        details: FactorDetails::Unavailable,
    }
}

pub(super) fn vehicle_risk(vehicle: &VehicleProfile, at: NaiveDateTime) -> RiskFactor {
    let mut score = 0.0;
    let mut factors = Vec::new();
    let vehicle_age = at.year() - vehicle.year;
    let driver_age = vehicle.main_driver_age;

    if vehicle_age <= NEW_VEHICLE_YEARS {
        score += 5.0;
        factors.push("New vehicle - higher theft target");
    } else if vehicle_age > OLD_VEHICLE_YEARS {
        score += 20.0;
        factors.push("Very old vehicle - high maintenance risk");
    } else if vehicle_age > MODERATE_VEHICLE_YEARS {
        score += 10.0;
        factors.push("Older vehicle - increased breakdown risk");
    }

    if driver_age < 21 {
        score += 25.0;
        factors.push("Very young driver - highest accident risk");
    } else if driver_age < 25 {
        score += 20.0;
        factors.push("Young driver - high accident risk");
    } else if driver_age < 30 {
        score += 10.0;
        factors.push("Young adult driver - moderate risk");
    } else if driver_age > 60 {
        score += 8.0;
        factors.push("Senior driver - slightly elevated risk");
    }

    let make_model = format!("{} {}", vehicle.make, vehicle.model).to_lowercase();
    if HIGH_RISK_MODELS.iter().any(|risky| make_model.contains(risky)) {
        score += 10.0;
        factors.push("High-value/frequently stolen vehicle model");
    }

    let age_band = if vehicle_age <= NEW_VEHICLE_YEARS {
        AgeBand::New
    } else if vehicle_age <= MODERATE_VEHICLE_YEARS {
        AgeBand::Moderate
    } else {
        AgeBand::Old
    };

    RiskFactor {
        score: f64::min(score, VEHICLE_CEILING),
        factors: factors.into_iter().map(str::to_string).collect(),
        details: FactorDetails::Vehicle {
            vehicle_age,
            driver_age,
            age_band,
        },
    }
}

pub(super) fn weather_risk(weather: Option<&WeatherConditions>) -> RiskFactor {
    let Some(weather) = weather else {
        return unavailable("No weather data available");
    };

    let mut score = 0.0;
    let mut factors = Vec::new();
    let [light, moderate, heavy] = PRECIPITATION_MM;
    let [breezy, strong, extreme] = WIND_KMH;
    let [fog, poor, reduced] = VISIBILITY_KM;

    if weather.precipitation >= heavy {
        score += 30.0;
        factors.push("Heavy rainfall - severe driving hazard");
    } else if weather.precipitation >= moderate {
        score += 15.0;
        factors.push("Moderate rainfall - reduced traction");
    } else if weather.precipitation >= light {
        score += 5.0;
        factors.push("Light rainfall - minor hazard");
    }

    if weather.wind_speed >= extreme {
        score += 25.0;
        factors.push("Extreme winds - vehicle control risk");
    } else if weather.wind_speed >= strong {
        score += 12.0;
        factors.push("Strong winds - steering difficulty");
    } else if weather.wind_speed >= breezy {
        score += 5.0;
        factors.push("Moderate winds - caution advised");
    }

    if weather.visibility <= fog {
        score += 35.0;
        factors.push("Extremely poor visibility - dangerous");
    } else if weather.visibility <= poor {
        score += 20.0;
        factors.push("Poor visibility - high risk");
    } else if weather.visibility <= reduced {
        score += 8.0;
        factors.push("Reduced visibility - moderate risk");
    }

    if weather.temperature <= COLD_CELSIUS || weather.temperature >= HOT_CELSIUS {
        score += 8.0;
        factors.push("Extreme temperature - vehicle stress");
    }

    if weather.humidity > HUMID_PERCENT {
        score += 5.0;
        factors.push("High humidity - potential visibility issues");
    }

    let severity = if score > 30.0 {
        Intensity::Severe
    } else if score > 15.0 {
        Intensity::Moderate
    } else {
        Intensity::Low
    };

    RiskFactor {
        score: f64::min(score, WEATHER_CEILING),
        factors: factors.into_iter().map(str::to_string).collect(),
        details: FactorDetails::Weather {
            precipitation: weather.precipitation,
            wind_speed: weather.wind_speed,
            visibility: weather.visibility,
            temperature: weather.temperature,
            severity,
        },
    }
}

pub(super) fn location_risk(hotspots: &[Hotspot], route: Option<&RouteProfile>) -> RiskFactor {
    let Some(route) = route.filter(|route| !route.coordinates.is_empty()) else {
        return unavailable("No route data available");
    };

    let mut score = 0.0;
    let mut factors = Vec::new();
    let mut hotspot_matches = Vec::new();

    for point in &route.coordinates {
        for hotspot in hotspots {
            let distance = haversine_km(*point, hotspot.location());
            if distance > HOTSPOT_INFLUENCE_KM {
                continue;
            }
            score += (HOTSPOT_INFLUENCE_KM - distance) / HOTSPOT_INFLUENCE_KM * hotspot.risk_level
                / 10.0;

            if distance <= HOTSPOT_NEAR_KM {
                hotspot_matches.push(HotspotMatch {
                    name: hotspot.name.clone(),
                    distance_km: (distance * 10.0).round() / 10.0,
                    risk_level: hotspot.risk_level,
                });
                factors.push(format!(
                    "Route passes near high-crime area: {}",
                    hotspot.name
                ));
            }
        }
    }

    let route_length_km = route
        .distance_km
        .unwrap_or_else(|| path_length_km(&route.coordinates));
    if route_length_km > 200.0 {
        score += 10.0;
        factors.push("Long distance route - extended exposure".to_string());
    } else if route_length_km > 100.0 {
        score += 5.0;
        factors.push("Medium distance route - moderate exposure".to_string());
    }

    let urban = route.coordinates.iter().any(|point| {
        MAJOR_CITIES
            .iter()
            .any(|city| haversine_km(*point, city.centre) <= city.radius_km)
    });
    if urban {
        score += 5.0;
        factors.push("Urban route - traffic and crime risk".to_string());
    } else {
        score += 8.0;
        factors.push("Rural route - limited emergency services".to_string());
    }

    let band = if score > 20.0 {
        Intensity::High
    } else if score > 10.0 {
        Intensity::Moderate
    } else {
        Intensity::Low
    };

    RiskFactor {
        score: f64::min(score, LOCATION_CEILING),
        factors,
        details: FactorDetails::Location {
            hotspot_matches,
            route_length_km: (route_length_km * 10.0).round() / 10.0,
            urban,
            band,
        },
    }
}

pub(super) fn time_risk(at: NaiveDateTime) -> RiskFactor {
    let hour = at.hour();
    let weekday = at.weekday().num_days_from_sunday();
    let hourly_risk = HOURLY_RISK[hour as usize % 24];
    let weekly_risk = WEEKLY_RISK[weekday as usize % 7];
    let score = hourly_risk * HOURLY_WEIGHT + weekly_risk * WEEKLY_WEIGHT;

    let mut factors = Vec::new();
    if is_high_risk_hour(hour) {
        factors.push("Late night/early morning - highest crime risk");
    } else if (18..=21).contains(&hour) {
        factors.push("Evening hours - elevated crime risk");
    } else if (6..=8).contains(&hour) {
        factors.push("Morning rush hour - traffic congestion");
    } else if (16..=18).contains(&hour) {
        factors.push("Afternoon rush hour - traffic congestion");
    }
    if weekday == 5 || weekday == 6 {
        factors.push("Weekend - higher accident rates");
    }

    RiskFactor {
        score: f64::min(score, TIME_CEILING),
        factors: factors.into_iter().map(str::to_string).collect(),
        details: FactorDetails::Time {
            hour,
            weekday,
            hourly_risk,
            weekly_risk,
            window: TimeWindow::for_hour(hour),
        },
    }
}
