use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{Coordinates, RouteClass, RouteStatistics};
use crate::providers::{
    CrimeProfile, DailyPrediction, ForecastPoint, ReportLocation, RouteWeather, VehicleProfile,
    WeatherAlert, WeatherConditions, WeatherReport,
};
use crate::scoring::{
    ClaimProbability, CompositeFactors, RealTimeAlerts, Recommendation, RiskAlert,
    RiskAssessment, RiskLevel,
};

/// A named point on a requested route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "lon", alias = "longitude")]
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Waypoint {
    pub fn new(lat: f64, lng: f64, name: Option<&str>) -> Self {
        Self {
            lat,
            lng,
            name: name.map(str::to_string),
        }
    }

    pub fn location(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    fn label<'a>(&'a self, default: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(default)
    }
}

/// Ad-hoc route to analyse. `route_id` and `route_name` are derived when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAnalysisRequest {
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub route_name: Option<String>,
    pub start: Waypoint,
    pub end: Waypoint,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
}

impl RouteAnalysisRequest {
    pub fn new(start: Waypoint, end: Waypoint) -> Self {
        Self {
            route_id: None,
            route_name: None,
            start,
            end,
            waypoints: Vec::new(),
            vehicle_id: None,
        }
    }

    /// Start, waypoints, end.
    pub fn path(&self) -> Vec<Coordinates> {
        std::iter::once(&self.start)
            .chain(self.waypoints.iter())
            .chain(std::iter::once(&self.end))
            .map(Waypoint::location)
            .collect()
    }

    pub fn route_id(&self) -> String {
        self.route_id
            .clone()
            .unwrap_or_else(|| generate_route_id(&self.start, &self.end))
    }

    pub fn route_name(&self) -> String {
        self.route_name.clone().unwrap_or_else(|| {
            format!(
                "{} to {}",
                self.start.label("Start"),
                self.end.label("End")
            )
        })
    }
}

/// `route_{lat}_{lng}_to_{lat}_{lng}` with every `.` and `-` turned into `_`.
pub fn generate_route_id(start: &Waypoint, end: &Waypoint) -> String {
    format!(
        "route_{}_{}_to_{}_{}",
        start.lat, start.lng, end.lat, end.lng
    )
    .replace(['.', '-'], "_")
}

/// Straight-line geometry used when no directions service is involved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicRoute {
    /// Kilometres between start and end.
    pub distance: f64,
    /// Minutes.
    pub duration: f64,
    pub duration_in_traffic: f64,
    pub class: RouteClass,
    pub path: Vec<Waypoint>,
    /// Seconds.
    pub traffic_delay: f64,
    pub source: String,
}

impl BasicRoute {
    pub fn from_request(request: &RouteAnalysisRequest) -> Self {
        let stats = RouteStatistics::between(request.start.location(), request.end.location());
        let path = std::iter::once(request.start.clone())
            .chain(request.waypoints.iter().cloned())
            .chain(std::iter::once(request.end.clone()))
            .collect();

        Self {
            distance: stats.distance_km,
            duration: stats.estimated_minutes,
            duration_in_traffic: stats.estimated_minutes_in_traffic,
            class: stats.class,
            path,
            traffic_delay: (stats.estimated_minutes_in_traffic - stats.estimated_minutes) * 60.0,
            source: "basic_calculation".to_string(),
        }
    }
}

/// Crime exposure at both ends of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSecurity {
    pub start: CrimeProfile,
    pub end: CrimeProfile,
    /// 100 minus the mean area risk.
    pub security_score: f64,
}

/// Calculator output for an analysed route, with the basic-analysis confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRiskAssessment {
    #[serde(flatten)]
    pub assessment: RiskAssessment,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAnalysis {
    pub route_id: String,
    pub route_name: String,
    pub route: BasicRoute,
    pub weather: RouteWeather,
    pub security: RouteSecurity,
    pub risk_assessment: RouteRiskAssessment,
    pub real_time_alerts: Vec<RiskAlert>,
    pub last_updated: DateTime<Utc>,
}

impl RouteAnalysis {
    pub fn overall_score(&self) -> f64 {
        self.risk_assessment.assessment.overall_score
    }

    pub fn level(&self) -> RiskLevel {
        self.risk_assessment.assessment.level
    }
}

/// Weather sampled at the end point of one route segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRisk {
    pub segment_index: usize,
    pub location: Coordinates,
    pub hazard_score: f64,
    pub precipitation: f64,
    pub wind_speed: f64,
    pub visibility: f64,
    pub condition: String,
    #[serde(default)]
    pub is_fallback: bool,
}

/// Stored composite result for a catalogued route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRiskResult {
    pub route_id: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub risk_factors: CompositeFactors,
    pub weather_factors: Vec<SegmentRisk>,
    /// Local departure time the score was computed for.
    pub departure_time: NaiveDateTime,
    pub calculated_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// Set when the result was served from storage rather than recomputed.
    #[serde(default)]
    pub cached: bool,
}

impl RouteRiskResult {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until > now
    }
}

/// One entry of a comparison: the computed result, or why it could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComparisonEntry {
    Scored(RouteRiskResult),
    Failed {
        route_id: String,
        error: String,
        risk_score: Option<f64>,
    },
}

impl ComparisonEntry {
    pub fn route_id(&self) -> &str {
        match self {
            Self::Scored(result) => &result.route_id,
            Self::Failed { route_id, .. } => route_id,
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Scored(result) => Some(result.risk_score),
            Self::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteComparison {
    pub routes: Vec<ComparisonEntry>,
    pub recommended_route: Option<String>,
    pub comparison_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskHistory {
    pub route_id: String,
    pub history: Vec<RouteRiskResult>,
    pub total_records: usize,
}

/// Everything the risk-assessment endpoint reports for one vehicle and position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleAssessment {
    pub vehicle_id: String,
    pub risk_assessment: RiskAssessment,
    pub real_time_alerts: RealTimeAlerts,
    pub weather_data: WeatherReport,
    pub claim_probability: ClaimProbability,
    pub assessment_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherOutlook {
    pub location: ReportLocation,
    pub current_weather: WeatherConditions,
    pub forecast: Vec<ForecastPoint>,
    pub predictions: Vec<DailyPrediction>,
    pub weather_alerts: Vec<WeatherAlert>,
    pub prediction_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaAlerts {
    pub location: ReportLocation,
    pub current_weather: WeatherConditions,
    pub alerts: Vec<RiskAlert>,
    pub predictions: Vec<DailyPrediction>,
    pub forecast: Vec<ForecastPoint>,
    pub timestamp: DateTime<Utc>,
}

/// Dashboard bucket for an analysed route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteCategory {
    Protected,
    AtRisk,
    Monitored,
}

impl RouteCategory {
    /// `<30` protected, `<70` at risk, otherwise monitored.
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            Self::Protected
        } else if score < 70.0 {
            Self::AtRisk
        } else {
            Self::Monitored
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedRoutes {
    pub protected: Vec<RouteAnalysis>,
    pub at_risk: Vec<RouteAnalysis>,
    pub monitored: Vec<RouteAnalysis>,
}

impl CategorizedRoutes {
    pub fn from_analyses(analyses: Vec<RouteAnalysis>) -> Self {
        let mut routes = Self::default();
        for analysis in analyses {
            match RouteCategory::from_score(analysis.overall_score()) {
                RouteCategory::Protected => routes.protected.push(analysis),
                RouteCategory::AtRisk => routes.at_risk.push(analysis),
                RouteCategory::Monitored => routes.monitored.push(analysis),
            }
        }
        routes
    }

    pub fn total(&self) -> usize {
        self.protected.len() + self.at_risk.len() + self.monitored.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteAnalysis> {
        self.protected
            .iter()
            .chain(self.at_risk.iter())
            .chain(self.monitored.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryCount {
    pub count: usize,
    pub description: String,
}

impl SummaryCount {
    fn new(count: usize, description: &str) -> Self {
        Self {
            count,
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskBreakdown {
    pub critical_risk: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub good_conditions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMitigation {
    pub percentage: u8,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub protected_routes: SummaryCount,
    pub at_risk_routes: SummaryCount,
    pub monitored_vehicles: SummaryCount,
    pub risk_breakdown: RiskBreakdown,
    pub risk_mitigation: RiskMitigation,
}

impl DashboardSummary {
    pub fn from_routes(routes: &CategorizedRoutes) -> Self {
        let count_level = |list: &[RouteAnalysis], level: RiskLevel| {
            list.iter().filter(|route| route.level() == level).count()
        };

        let total = routes.total();
        let percentage = if total == 0 {
            0
        } else {
            (routes.protected.len() as f64 / total as f64 * 100.0).round() as u8
        };

        Self {
            protected_routes: SummaryCount::new(
                routes.protected.len(),
                "Routes with minimal weather risks",
            ),
            at_risk_routes: SummaryCount::new(
                routes.at_risk.len(),
                "Routes with potential weather hazards",
            ),
            monitored_vehicles: SummaryCount::new(
                routes.monitored.len(),
                "Routes currently being tracked",
            ),
            risk_breakdown: RiskBreakdown {
                critical_risk: count_level(&routes.monitored, RiskLevel::Critical),
                high_risk: count_level(&routes.monitored, RiskLevel::High),
                medium_risk: count_level(&routes.at_risk, RiskLevel::Medium),
                good_conditions: routes.protected.len(),
            },
            risk_mitigation: RiskMitigation {
                percentage,
                message: "Consider rescheduling travel for high-risk routes.".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub summary: DashboardSummary,
    pub routes: CategorizedRoutes,
    pub recent_alerts: Vec<RiskAlert>,
    pub recommendations: Vec<Recommendation>,
    pub vehicles: Vec<VehicleProfile>,
    pub last_updated: DateTime<Utc>,
}
