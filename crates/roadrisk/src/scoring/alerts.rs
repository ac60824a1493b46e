use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::thresholds::{is_high_risk_hour, HOTSPOT_NEAR_KM};
use super::{RiskCalculator, RiskLevel, RouteProfile};
use crate::geo::{haversine_km, Coordinates};
use crate::providers::{AlertSeverity, DailyPrediction, VehicleProfile, WeatherConditions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Weather,
    Security,
    Timing,
    Prediction,
    HighRisk,
    HeavyRain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    pub timestamp: NaiveDateTime,
}

impl RiskAlert {
    pub fn new(
        kind: AlertKind,
        severity: AlertSeverity,
        title: &str,
        message: impl Into<String>,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            kind,
            severity,
            title: title.to_string(),
            message: message.into(),
            location: None,
            timestamp,
        }
    }

    pub fn at(mut self, location: Coordinates) -> Self {
        self.location = Some(location);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeAlerts {
    pub alerts: Vec<RiskAlert>,
    pub overall_risk_score: f64,
    pub risk_level: RiskLevel,
}

impl RiskCalculator {
    /// Immediate hazards at `location`: severe weather, nearby hotspots rated above
    /// 75 and the late-night window, plus the single-point assessment's score.
    pub fn real_time_alerts(
        &self,
        vehicle: &VehicleProfile,
        location: Coordinates,
        weather: Option<&WeatherConditions>,
        at: NaiveDateTime,
    ) -> RealTimeAlerts {
        let assessment = self.calculate_risk_score(
            vehicle,
            Some(&RouteProfile::point(location)),
            weather,
            at,
        );
        let mut alerts = Vec::new();

        if let Some(weather) = weather {
            if weather.precipitation > 20.0 {
                alerts.push(RiskAlert::new(
                    AlertKind::Weather,
                    AlertSeverity::Critical,
                    "Heavy Rainfall Alert",
                    "Severe rainfall detected in your area. Extreme caution advised.",
                    at,
                ));
            }
            if weather.wind_speed > 60.0 {
                alerts.push(RiskAlert::new(
                    AlertKind::Weather,
                    AlertSeverity::Critical,
                    "Extreme Wind Alert",
                    "Dangerous wind speeds detected. Avoid travel if possible.",
                    at,
                ));
            }
            if weather.visibility < 1.0 {
                alerts.push(RiskAlert::new(
                    AlertKind::Weather,
                    AlertSeverity::Critical,
                    "Zero Visibility Alert",
                    "Extremely poor visibility. Pull over safely immediately.",
                    at,
                ));
            }
        }

        for hotspot in self.hotspots() {
            let near = haversine_km(location, hotspot.location()) <= HOTSPOT_NEAR_KM;
            if near && hotspot.risk_level > 75.0 {
                alerts.push(RiskAlert::new(
                    AlertKind::Security,
                    AlertSeverity::High,
                    "High Crime Area Alert",
                    format!(
                        "You are near {}, a high-crime area. Exercise extreme caution.",
                        hotspot.name
                    ),
                    at,
                ));
            }
        }

        if is_high_risk_hour(at.hour()) {
            alerts.push(RiskAlert::new(
                AlertKind::Timing,
                AlertSeverity::Medium,
                "High-Risk Hours",
                "Traveling during peak crime hours. Stay vigilant and avoid isolated areas.",
                at,
            ));
        }

        RealTimeAlerts {
            alerts,
            overall_risk_score: assessment.overall_score,
            risk_level: assessment.level,
        }
    }
}

/// Area-level warnings from current conditions and the day outlook.
pub fn area_alerts(
    current: &WeatherConditions,
    predictions: &[DailyPrediction],
    at: NaiveDateTime,
) -> Vec<RiskAlert> {
    let mut alerts = Vec::new();

    if current.precipitation > 15.0 {
        alerts.push(RiskAlert::new(
            AlertKind::Weather,
            AlertSeverity::High,
            "Heavy Rain Warning",
            "Heavy rainfall detected in the area",
            at,
        ));
    }

    if current.wind_speed > 50.0 {
        alerts.push(RiskAlert::new(
            AlertKind::Weather,
            AlertSeverity::Medium,
            "Strong Wind Alert",
            "Strong winds may affect driving conditions",
            at,
        ));
    }

    let risky_days = predictions
        .iter()
        .filter(|prediction| prediction.predicted_risk > 70)
        .count();
    if risky_days > 0 {
        alerts.push(RiskAlert::new(
            AlertKind::Prediction,
            AlertSeverity::Medium,
            "High Risk Forecast",
            format!("High risk conditions predicted for the next {risky_days} day(s)"),
            at,
        ));
    }

    alerts
}
