use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;
use crate::scoring::thresholds::WEEKLY_RISK;
use crate::scoring::RiskLevel;

/// Where a report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    OpenMeteo,
    OpenWeatherMap,
    Fallback,
}

/// Observed conditions in metric units: mm, km/h, km, degrees Celsius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConditions {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub precipitation: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub visibility: f64,
    pub condition: String,
    pub description: String,
    pub cloudiness: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLocation {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl ReportLocation {
    pub fn at(point: Coordinates) -> Self {
        Self {
            lat: point.lat,
            lng: point.lng,
            name: None,
            country: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub datetime: String,
    pub temperature: f64,
    pub precipitation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_probability: Option<f64>,
    pub wind_speed: f64,
    pub weather_condition: String,
    pub risk_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherAlertKind {
    Precipitation,
    Wind,
    Visibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Severe,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    #[serde(rename = "type")]
    pub kind: WeatherAlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub recommendation: String,
}

/// A point-in-time weather lookup as cached and returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: ReportLocation,
    pub current: WeatherConditions,
    #[serde(default)]
    pub forecast: Vec<ForecastPoint>,
    #[serde(default)]
    pub alerts: Vec<WeatherAlert>,
    pub risk_score: f64,
    pub source: DataSource,
    pub fallback: bool,
    pub timestamp: DateTime<Utc>,
}

impl WeatherReport {
    /// Static substitute used whenever a live lookup fails.
    pub fn fallback(point: Coordinates, now: DateTime<Utc>) -> Self {
        Self {
            location: ReportLocation {
                lat: point.lat,
                lng: point.lng,
                name: Some("Unknown".to_string()),
                country: Some("ZA".to_string()),
            },
            current: WeatherConditions {
                temperature: 20.0,
                feels_like: 20.0,
                humidity: 60.0,
                pressure: 1013.0,
                precipitation: 0.0,
                wind_speed: 10.0,
                wind_direction: 180.0,
                visibility: 10.0,
                condition: "Clear".to_string(),
                description: "clear sky".to_string(),
                cloudiness: 20.0,
                weather_code: None,
            },
            forecast: Vec::new(),
            alerts: Vec::new(),
            risk_score: FALLBACK_RISK_SCORE,
            source: DataSource::Fallback,
            fallback: true,
            timestamp: now,
        }
    }
}

pub const FALLBACK_RISK_SCORE: f64 = 25.0;

/// Driving hazard of raw conditions, in `[0, 100]`.
pub fn weather_hazard_score(conditions: &WeatherConditions) -> f64 {
    let mut risk: f64 = 0.0;

    if conditions.precipitation > 20.0 {
        risk += 40.0;
    } else if conditions.precipitation > 10.0 {
        risk += 25.0;
    } else if conditions.precipitation > 2.0 {
        risk += 10.0;
    }

    if conditions.wind_speed > 60.0 {
        risk += 35.0;
    } else if conditions.wind_speed > 40.0 {
        risk += 20.0;
    } else if conditions.wind_speed > 25.0 {
        risk += 10.0;
    }

    if conditions.visibility < 1.0 {
        risk += 45.0;
    } else if conditions.visibility < 3.0 {
        risk += 25.0;
    } else if conditions.visibility < 5.0 {
        risk += 15.0;
    }

    risk.min(100.0)
}

/// Risk attached to a WMO weather interpretation code.
pub fn weather_code_risk(code: i32) -> f64 {
    match code {
        0 => 10.0,
        1 => 15.0,
        2 => 20.0,
        3 => 25.0,
        45 => 40.0,
        48 => 45.0,
        51 => 30.0,
        53 => 35.0,
        55 => 40.0,
        61 => 50.0,
        63 => 60.0,
        65 => 70.0,
        71 => 45.0,
        73 => 50.0,
        75 => 55.0,
        80 => 80.0,
        81 => 85.0,
        82 => 90.0,
        95 => 95.0,
        96 => 98.0,
        99 => 100.0,
        _ => 35.0,
    }
}

pub fn generate_weather_alerts(conditions: &WeatherConditions) -> Vec<WeatherAlert> {
    let mut alerts = Vec::new();

    if conditions.precipitation > 20.0 {
        alerts.push(WeatherAlert {
            kind: WeatherAlertKind::Precipitation,
            severity: AlertSeverity::Severe,
            message: "Heavy rainfall detected. Exercise extreme caution.".to_string(),
            recommendation: "Consider postponing travel or finding shelter.".to_string(),
        });
    }

    if conditions.wind_speed > 60.0 {
        alerts.push(WeatherAlert {
            kind: WeatherAlertKind::Wind,
            severity: AlertSeverity::Severe,
            message: "Dangerous wind speeds detected.".to_string(),
            recommendation: "Avoid travel, especially in high-profile vehicles.".to_string(),
        });
    }

    if conditions.visibility < 1.0 {
        alerts.push(WeatherAlert {
            kind: WeatherAlertKind::Visibility,
            severity: AlertSeverity::Critical,
            message: "Extremely poor visibility conditions.".to_string(),
            recommendation: "Pull over safely and wait for conditions to improve.".to_string(),
        });
    }

    alerts
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrediction {
    pub date: NaiveDate,
    pub predicted_risk: u8,
    pub risk_level: RiskLevel,
    pub confidence: u8,
}

/// Day-by-day outlook derived from the current report. Day one also considers the
/// worst hour in the short-range forecast; confidence decays with the horizon.
pub fn daily_predictions(report: &WeatherReport, today: NaiveDate, days: u32) -> Vec<DailyPrediction> {
    let forecast_peak = report
        .forecast
        .iter()
        .map(|point| point.risk_score)
        .fold(0.0_f64, f64::max);

    (1..=days)
        .filter_map(|offset| {
            let date = today.checked_add_days(chrono::Days::new(u64::from(offset)))?;
            let base = if offset == 1 {
                report.risk_score.max(forecast_peak)
            } else {
                report.risk_score
            };
            let weekday = date.weekday().num_days_from_sunday() as usize;
            let predicted = (base * 0.8 + WEEKLY_RISK[weekday] * 1.5).clamp(0.0, 100.0).round();
            let confidence = 90_i64.saturating_sub(3 * i64::from(offset)).max(60);

            Some(DailyPrediction {
                date,
                predicted_risk: predicted as u8,
                risk_level: RiskLevel::from_score(predicted),
                confidence: confidence as u8,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn conditions(precipitation: f64, wind_speed: f64, visibility: f64) -> WeatherConditions {
        let mut current = WeatherReport::fallback(Coordinates::new(0.0, 0.0), Utc::now()).current;
        current.precipitation = precipitation;
        current.wind_speed = wind_speed;
        current.visibility = visibility;
        current
    }

    #[test]
    fn hazard_score_stays_within_bounds() {
        for precipitation in [0.0, 2.5, 10.5, 20.5, 500.0] {
            for wind in [0.0, 26.0, 41.0, 61.0, 300.0] {
                for visibility in [0.0, 0.5, 2.0, 4.0, 10.0, -3.0] {
                    let score = weather_hazard_score(&conditions(precipitation, wind, visibility));
                    assert!((0.0..=100.0).contains(&score), "score {score} out of range");
                }
            }
        }
    }

    #[test]
    fn hazard_thresholds_are_strict() {
        assert_eq!(weather_hazard_score(&conditions(20.0, 60.0, 5.0)), 25.0 + 20.0);
        assert_eq!(weather_hazard_score(&conditions(25.0, 70.0, 0.5)), 100.0);
        assert_eq!(weather_hazard_score(&conditions(0.0, 10.0, 10.0)), 0.0);
    }

    #[test]
    fn fallback_report_matches_documented_defaults() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let report = WeatherReport::fallback(Coordinates::new(-26.2, 28.0), now);
        assert_eq!(report.current.temperature, 20.0);
        assert_eq!(report.current.precipitation, 0.0);
        assert_eq!(report.risk_score, 25.0);
        assert!(report.fallback);
        assert_eq!(report.source, DataSource::Fallback);
    }

    #[test]
    fn alerts_fire_above_thresholds_only() {
        assert!(generate_weather_alerts(&conditions(20.0, 60.0, 1.0)).is_empty());
        let alerts = generate_weather_alerts(&conditions(21.0, 61.0, 0.9));
        let kinds: Vec<_> = alerts.iter().map(|alert| alert.kind).collect();
        assert_eq!(
            kinds,
            vec![
                WeatherAlertKind::Precipitation,
                WeatherAlertKind::Wind,
                WeatherAlertKind::Visibility
            ]
        );
    }

    #[test]
    fn unknown_weather_codes_default_to_moderate_risk() {
        assert_eq!(weather_code_risk(0), 10.0);
        assert_eq!(weather_code_risk(99), 100.0);
        assert_eq!(weather_code_risk(7), 35.0);
    }

    #[test]
    fn predictions_cover_requested_days_with_decaying_confidence() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let report = WeatherReport::fallback(Coordinates::new(-26.2, 28.0), Utc::now());
        let predictions = daily_predictions(&report, today, 7);

        assert_eq!(predictions.len(), 7);
        assert_eq!(predictions[0].date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert!(predictions
            .windows(2)
            .all(|pair| pair[0].confidence >= pair[1].confidence));
        assert!(predictions.iter().all(|p| p.predicted_risk <= 100));
    }
}
