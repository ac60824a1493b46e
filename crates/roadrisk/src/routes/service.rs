use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::domain::{
    AreaAlerts, BasicRoute, CategorizedRoutes, ComparisonEntry, Dashboard, DashboardSummary,
    RiskHistory, RouteAnalysis, RouteAnalysisRequest, RouteComparison, RouteRiskAssessment,
    RouteRiskResult, RouteSecurity, SegmentRisk, VehicleAssessment, WeatherOutlook,
};
use super::repository::{RepositoryError, RouteRepository};
use crate::cache::{Clock, SystemClock};
use crate::geo::{segment_path, Coordinates};
use crate::providers::crime::security_score;
use crate::providers::{
    weather_hazard_score, AlertSeverity, CrimeDataset, RouteWeather, VehicleProfile,
    VehicleRepository, WeatherProvider, WeatherService, DEFAULT_CRIME_RADIUS_KM,
};
use crate::scoring::{
    area_alerts, to_sast, AlertKind, CompositeFactors, Priority, Recommendation,
    RecommendationCategory, RiskAlert, RiskCalculator, RiskLevel, RouteProfile, ROUTE_WEIGHTS,
};

/// Upper bound on weather lookups per stored-route calculation.
pub const MAX_ROUTE_SEGMENTS: usize = 8;
pub const MAX_COMPARED_ROUTES: usize = 10;
pub const MAX_HISTORY_LIMIT: usize = 100;
pub const MAX_OUTLOOK_DAYS: u32 = 14;
pub const AREA_OUTLOOK_DAYS: u32 = 3;

/// Confidence reported for straight-line analyses without a directions service.
const BASIC_ANALYSIS_CONFIDENCE: f64 = 0.7;
const MAX_RECENT_ALERTS: usize = 10;

/// Service composing weather, crime and vehicle data with the route catalogue.
pub struct RouteRiskService<W, R, V> {
    weather: WeatherService<W>,
    crime: Arc<CrimeDataset>,
    calculator: RiskCalculator,
    routes: Arc<R>,
    vehicles: Arc<V>,
    validity: Duration,
    clock: Arc<dyn Clock>,
}

impl<W, R, V> RouteRiskService<W, R, V>
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
    V: VehicleRepository + 'static,
{
    pub fn new(
        weather: WeatherService<W>,
        crime: Arc<CrimeDataset>,
        routes: Arc<R>,
        vehicles: Arc<V>,
        validity: Duration,
    ) -> Self {
        let calculator = RiskCalculator::from_dataset(&crime);
        Self {
            weather,
            crime,
            calculator,
            routes,
            vehicles,
            validity,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn weather_service(&self) -> &WeatherService<W> {
        &self.weather
    }

    pub fn crime(&self) -> &CrimeDataset {
        &self.crime
    }

    /// Straight-line analysis of an ad-hoc route using live weather along the path,
    /// crime at both ends and the owner's vehicle (or the standard profile).
    pub async fn analyze_route(
        &self,
        request: &RouteAnalysisRequest,
        owner_id: &str,
    ) -> Result<RouteAnalysis, RouteRiskError> {
        let path = request.path();
        if let Some(index) = path.iter().position(|point| !point.is_valid()) {
            let field = match index {
                0 => "start",
                last if last + 1 == path.len() => "end",
                _ => "waypoints",
            };
            return Err(RouteRiskError::invalid_coordinates(field));
        }

        let route = BasicRoute::from_request(request);
        let weather = self.weather.route_weather(&path).await;
        let vehicle = self.vehicle_for_route(request.vehicle_id.as_deref(), owner_id);

        let start = self.crime.profile(request.start.location(), DEFAULT_CRIME_RADIUS_KM);
        let end = self.crime.profile(request.end.location(), DEFAULT_CRIME_RADIUS_KM);
        let security = RouteSecurity {
            security_score: security_score(&[start.clone(), end.clone()]),
            start,
            end,
        };

        let now = self.clock.now();
        let conditions = weather
            .aggregate
            .as_ref()
            .map(|aggregate| aggregate.worst_case_conditions());
        let profile = RouteProfile::path(path, Some(route.distance));
        let assessment = self.calculator.calculate_risk_score(
            &vehicle,
            Some(&profile),
            conditions.as_ref(),
            to_sast(now),
        );

        let real_time_alerts = route_alerts(assessment.overall_score, &weather, to_sast(now));
        let route_id = request.route_id();
        debug!(%route_id, score = assessment.overall_score, "route analysed");

        Ok(RouteAnalysis {
            route_id,
            route_name: request.route_name(),
            route,
            weather,
            security,
            risk_assessment: RouteRiskAssessment {
                assessment,
                confidence: BASIC_ANALYSIS_CONFIDENCE,
            },
            real_time_alerts,
            last_updated: now,
        })
    }

    /// Returns the stored result while it is valid; otherwise recomputes the composite
    /// from per-segment weather and stores it for the validity window.
    pub async fn calculate_route_risk(
        &self,
        route_id: &str,
        departure: DateTime<Utc>,
    ) -> Result<RouteRiskResult, RouteRiskError> {
        let now = self.clock.now();

        match self.routes.latest_risk(route_id, now) {
            Ok(Some(mut stored)) if stored.is_valid_at(now) => {
                debug!(%route_id, "route risk served from store");
                stored.cached = true;
                return Ok(stored);
            }
            Ok(_) => {}
            Err(err) => warn!(%route_id, error = %err, "route risk lookup failed"),
        }

        let route = self
            .routes
            .fetch_route(route_id)?
            .ok_or_else(|| RouteRiskError::RouteNotFound(route_id.to_string()))?;

        let segments = segment_path(&route.path(), MAX_ROUTE_SEGMENTS);
        let reports = join_all(
            segments
                .iter()
                .map(|point| self.weather.weather(*point, false)),
        )
        .await;
        let weather_factors: Vec<SegmentRisk> = segments
            .iter()
            .zip(reports.iter())
            .enumerate()
            .map(|(segment_index, (point, report))| SegmentRisk {
                segment_index,
                location: *point,
                hazard_score: weather_hazard_score(&report.current),
                precipitation: report.current.precipitation,
                wind_speed: report.current.wind_speed,
                visibility: report.current.visibility,
                condition: report.current.condition.clone(),
                is_fallback: report.fallback,
            })
            .collect();

        let hazards: Vec<f64> = weather_factors
            .iter()
            .map(|segment| segment.hazard_score)
            .collect();
        let departure_time = to_sast(departure);
        let risk_factors = CompositeFactors::evaluate(&hazards, &route.terrain(), departure_time);
        let risk_score = risk_factors.score(&ROUTE_WEIGHTS);

        let result = RouteRiskResult {
            route_id: route.id.clone(),
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            risk_factors,
            weather_factors,
            departure_time,
            calculated_at: now,
            valid_until: now + self.validity,
            cached: false,
        };

        if let Err(err) = self.routes.store_risk(result.clone()) {
            warn!(%route_id, error = %err, "failed to store route risk");
        }
        info!(%route_id, risk_score, level = %result.risk_level, "route risk calculated");

        Ok(result)
    }

    /// Scores each route independently and recommends the lowest successful score.
    pub async fn compare_routes(
        &self,
        route_ids: &[String],
        departure: DateTime<Utc>,
    ) -> Result<RouteComparison, RouteRiskError> {
        if route_ids.is_empty() {
            return Err(RouteRiskError::Validation {
                field: "route_ids",
                message: "route_ids array is required and must not be empty".to_string(),
            });
        }
        if route_ids.len() > MAX_COMPARED_ROUTES {
            return Err(RouteRiskError::Validation {
                field: "route_ids",
                message: format!("Maximum {MAX_COMPARED_ROUTES} routes can be compared at once"),
            });
        }

        let results = join_all(
            route_ids
                .iter()
                .map(|route_id| self.calculate_route_risk(route_id, departure)),
        )
        .await;

        let routes: Vec<ComparisonEntry> = route_ids
            .iter()
            .zip(results)
            .map(|(route_id, result)| match result {
                Ok(result) => ComparisonEntry::Scored(result),
                Err(err) => ComparisonEntry::Failed {
                    route_id: route_id.clone(),
                    error: err.to_string(),
                    risk_score: None,
                },
            })
            .collect();

        let recommended_route = routes
            .iter()
            .filter_map(|entry| entry.score().map(|score| (entry.route_id(), score)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(route_id, _)| route_id.to_string());

        Ok(RouteComparison {
            routes,
            recommended_route,
            comparison_time: self.clock.now(),
        })
    }

    pub fn risk_history(&self, route_id: &str, limit: usize) -> Result<RiskHistory, RouteRiskError> {
        if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
            return Err(RouteRiskError::Validation {
                field: "limit",
                message: format!("Limit must be a number between 1 and {MAX_HISTORY_LIMIT}"),
            });
        }

        let history = self.routes.risk_history(route_id, limit)?;
        Ok(RiskHistory {
            route_id: route_id.to_string(),
            total_records: history.len(),
            history,
        })
    }

    /// Analyses every route the owner has catalogued and buckets them by score.
    pub async fn dashboard(&self, owner_id: &str) -> Result<Dashboard, RouteRiskError> {
        let records = self.routes.routes_for_owner(owner_id)?;
        let requests: Vec<RouteAnalysisRequest> =
            records.iter().map(|record| record.analysis_request()).collect();

        let analyses = join_all(
            requests
                .iter()
                .map(|request| self.analyze_route(request, owner_id)),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

        let vehicles: Vec<VehicleProfile> = self
            .vehicles
            .for_owner(owner_id)?
            .into_iter()
            .filter(VehicleProfile::is_active)
            .collect();

        let routes = CategorizedRoutes::from_analyses(analyses);
        let mut recent_alerts: Vec<RiskAlert> = routes
            .iter()
            .flat_map(|analysis| analysis.real_time_alerts.iter().cloned())
            .collect();
        recent_alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent_alerts.truncate(MAX_RECENT_ALERTS);

        let now = self.clock.now();
        Ok(Dashboard {
            summary: DashboardSummary::from_routes(&routes),
            recommendations: travel_recommendations(&routes, to_sast(now).hour()),
            routes,
            recent_alerts,
            vehicles,
            last_updated: now,
        })
    }

    pub fn purge_expired_risk(&self) -> Result<usize, RouteRiskError> {
        let removed = self.routes.purge_expired(self.clock.now())?;
        info!(removed, "expired route risk results purged");
        Ok(removed)
    }

    /// Point assessment for a known vehicle: composite score, live alerts, the
    /// weather used and the claim likelihood.
    pub async fn assess_vehicle(
        &self,
        vehicle_id: &str,
        location: Coordinates,
        route: Option<RouteProfile>,
    ) -> Result<VehicleAssessment, RouteRiskError> {
        if !location.is_valid() {
            return Err(RouteRiskError::invalid_coordinates("currentLocation"));
        }

        let vehicle = self
            .vehicles
            .fetch(vehicle_id)?
            .ok_or_else(|| RouteRiskError::VehicleNotFound(vehicle_id.to_string()))?;

        let weather = self.weather.weather(location, true).await;
        let now = self.clock.now();
        let at = to_sast(now);
        let route = route
            .filter(|route| !route.coordinates.is_empty())
            .unwrap_or_else(|| RouteProfile::point(location));

        let risk_assessment =
            self.calculator
                .calculate_risk_score(&vehicle, Some(&route), Some(&weather.current), at);
        let real_time_alerts =
            self.calculator
                .real_time_alerts(&vehicle, location, Some(&weather.current), at);
        let claim_probability =
            self.calculator
                .claim_probability(&vehicle, &risk_assessment.factors, at);

        Ok(VehicleAssessment {
            vehicle_id: vehicle.id,
            risk_assessment,
            real_time_alerts,
            weather_data: weather,
            claim_probability,
            assessment_timestamp: now,
        })
    }

    /// Current weather plus a `days`-long outlook for a point.
    pub async fn weather_outlook(
        &self,
        location: Coordinates,
        days: u32,
    ) -> Result<WeatherOutlook, RouteRiskError> {
        if !(1..=MAX_OUTLOOK_DAYS).contains(&days) {
            return Err(RouteRiskError::Validation {
                field: "days",
                message: format!("days must be between 1 and {MAX_OUTLOOK_DAYS}"),
            });
        }

        let now = self.clock.now();
        let (report, predictions) = self
            .weather
            .predictions(location, to_sast(now).date(), days)
            .await;

        Ok(WeatherOutlook {
            location: report.location,
            current_weather: report.current,
            forecast: report.forecast,
            predictions,
            weather_alerts: report.alerts,
            prediction_timestamp: now,
        })
    }

    /// Area warnings from current weather and a short outlook.
    pub async fn area_alerts(&self, location: Coordinates) -> AreaAlerts {
        let now = self.clock.now();
        let local = to_sast(now);
        let (report, predictions) = self
            .weather
            .predictions(location, local.date(), AREA_OUTLOOK_DAYS)
            .await;
        let alerts = area_alerts(&report.current, &predictions, local);

        AreaAlerts {
            location: report.location,
            current_weather: report.current,
            alerts,
            predictions,
            forecast: report.forecast,
            timestamp: now,
        }
    }

    fn vehicle_for_route(&self, vehicle_id: Option<&str>, owner_id: &str) -> VehicleProfile {
        let Some(vehicle_id) = vehicle_id else {
            return VehicleProfile::standard();
        };

        match self.vehicles.fetch(vehicle_id) {
            Ok(Some(vehicle)) if vehicle.owner_id == owner_id => vehicle,
            Ok(_) => {
                debug!(%vehicle_id, "vehicle not available to owner; using standard profile");
                VehicleProfile::standard()
            }
            Err(err) => {
                warn!(%vehicle_id, error = %err, "could not fetch vehicle data");
                VehicleProfile::standard()
            }
        }
    }
}

/// High-risk route warning plus one heavy-rain alert per wet sample point.
fn route_alerts(
    overall_score: f64,
    weather: &RouteWeather,
    at: NaiveDateTime,
) -> Vec<RiskAlert> {
    let mut alerts = Vec::new();

    if overall_score > 70.0 {
        alerts.push(RiskAlert::new(
            AlertKind::HighRisk,
            AlertSeverity::High,
            "High Risk Route",
            "This route has elevated risk factors.",
            at,
        ));
    }

    for report in &weather.points {
        if report.current.precipitation > 10.0 {
            alerts.push(
                RiskAlert::new(
                    AlertKind::HeavyRain,
                    AlertSeverity::Medium,
                    "Heavy Rain",
                    "Heavy rain detected along route",
                    at,
                )
                .at(Coordinates::new(report.location.lat, report.location.lng)),
            );
        }
    }

    alerts
}

/// Timing advice when routes are risky or travel falls in the evening; rerouting
/// advice when any route has high weather risk.
fn travel_recommendations(routes: &CategorizedRoutes, local_hour: u32) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    let risky = !routes.at_risk.is_empty() || !routes.monitored.is_empty();
    if risky || local_hour >= 18 {
        recommendations.push(Recommendation::new(
            RecommendationCategory::Timing,
            Priority::Medium,
            "Best travel time: 10:00 AM - 2:00 PM",
            &[],
        ));
    }

    let bad_weather = routes.iter().any(|analysis| {
        analysis
            .weather
            .assessment
            .as_ref()
            .is_some_and(|assessment| assessment.risk_level >= RiskLevel::High)
    });
    if bad_weather {
        recommendations.push(Recommendation::new(
            RecommendationCategory::Route,
            Priority::High,
            "Consider alternative route due to weather conditions",
            &[],
        ));
    }

    recommendations
}

/// Error raised by the route risk service.
#[derive(Debug, thiserror::Error)]
pub enum RouteRiskError {
    #[error("{message}")]
    Validation { field: &'static str, message: String },
    #[error("Route {0} not found")]
    RouteNotFound(String),
    #[error("Vehicle {0} not found")]
    VehicleNotFound(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl RouteRiskError {
    fn invalid_coordinates(field: &'static str) -> Self {
        Self::Validation {
            field,
            message: "Coordinates must be within [-90, 90] and [-180, 180]".to_string(),
        }
    }
}
