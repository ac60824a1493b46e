use std::fmt;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{middleware, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::domain::{RouteAnalysisRequest, Waypoint};
use super::rate_limit::{enforce, RateGate, RateLimiter, RouteGroup};
use super::repository::{RepositoryError, RouteRepository};
use super::service::{RouteRiskError, RouteRiskService};
use crate::config::{AppEnvironment, RateLimitConfig};
use crate::geo::Coordinates;
use crate::providers::{VehicleRepository, WeatherProvider};
use crate::scoring::{parse_departure, RouteProfile};

/// Owner attributed to requests; there is no authentication layer.
pub const DEMO_OWNER: &str = "demo_user";

const DEFAULT_OUTLOOK_DAYS: u32 = 7;
const DEFAULT_HISTORY_LIMIT: usize = 10;

pub struct RouterSettings {
    pub environment: AppEnvironment,
    pub owner_id: String,
    pub limiter: Arc<RateLimiter>,
}

impl RouterSettings {
    pub fn new(environment: AppEnvironment, rate_limit: RateLimitConfig) -> Self {
        Self {
            environment,
            owner_id: DEMO_OWNER.to_string(),
            limiter: Arc::new(RateLimiter::new(rate_limit)),
        }
    }
}

pub struct ApiState<W, R, V> {
    service: Arc<RouteRiskService<W, R, V>>,
    environment: AppEnvironment,
    owner_id: Arc<str>,
}

impl<W, R, V> Clone for ApiState<W, R, V> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            environment: self.environment,
            owner_id: Arc::clone(&self.owner_id),
        }
    }
}

impl<W, R, V> ApiState<W, R, V> {
    pub fn new(
        service: Arc<RouteRiskService<W, R, V>>,
        environment: AppEnvironment,
        owner_id: &str,
    ) -> Self {
        Self {
            service,
            environment,
            owner_id: Arc::from(owner_id),
        }
    }

    /// Error text shown to clients; hidden outside development and test.
    fn detail(&self, err: &dyn fmt::Display) -> String {
        if self.environment.is_production() {
            "Internal server error".to_string()
        } else {
            err.to_string()
        }
    }

    fn fail(&self, context: &str, err: RouteRiskError) -> ApiError {
        match &err {
            RouteRiskError::Validation { field, message } => {
                ApiError::validation(field, message.clone())
            }
            RouteRiskError::RouteNotFound(_) => ApiError::NotFound {
                error: "Route not found".to_string(),
                message: err.to_string(),
            },
            RouteRiskError::VehicleNotFound(_) => ApiError::NotFound {
                error: "Vehicle not found".to_string(),
                message: err.to_string(),
            },
            RouteRiskError::Repository(RepositoryError::NotFound) => ApiError::NotFound {
                error: "Record not found".to_string(),
                message: err.to_string(),
            },
            RouteRiskError::Repository(RepositoryError::Unavailable(_)) => ApiError::Unavailable {
                error: format!("{context}: route data temporarily unavailable"),
                message: self.detail(&err),
            },
        }
    }

    fn rejected_body(&self, rejection: JsonRejection) -> ApiError {
        if rejection.status().is_server_error() {
            ApiError::Internal {
                error: "Failed to read request body".to_string(),
                message: self.detail(&rejection),
            }
        } else {
            ApiError::validation("body", rejection.body_text())
        }
    }
}

/// Success envelope; failures are rendered by [`ApiError`].
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        message: None,
    })
}

fn ok_with_message<T: Serialize>(data: T, message: &str) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        message: Some(message.to_string()),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// HTTP-facing failure, rendered as `{success: false, error, ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },
    #[error("{error}")]
    NotFound { error: String, message: String },
    #[error("Too many requests. Please try again later.")]
    RateLimited { retry_after_secs: u64 },
    #[error("{error}")]
    Unavailable { error: String, message: String },
    #[error("{error}")]
    Internal { error: String, message: String },
}

impl ApiError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Validation {
            details: vec![FieldError {
                field: field.to_string(),
                message: message.clone(),
            }],
            message,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({ "success": false, "error": self.to_string() });

        match &self {
            Self::Validation { details, .. } => body["details"] = json!(details),
            Self::NotFound { message, .. }
            | Self::Unavailable { message, .. }
            | Self::Internal { message, .. } => body["message"] = json!(message),
            Self::RateLimited { retry_after_secs } => {
                body["retryAfter"] = json!(format!("{retry_after_secs} seconds"));
            }
        }

        let mut response = (status, Json(body)).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Router exposing the `/api/ml` and `/api/route-risk` endpoints. Each group has its
/// own rate-limit window; the health check is not limited.
pub fn risk_router<W, R, V>(
    service: Arc<RouteRiskService<W, R, V>>,
    settings: RouterSettings,
) -> Router
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
    V: VehicleRepository + 'static,
{
    let state = ApiState::new(service, settings.environment, &settings.owner_id);
    let ml_gate = RateGate {
        limiter: Arc::clone(&settings.limiter),
        group: RouteGroup::Ml,
    };
    let route_risk_gate = RateGate {
        limiter: settings.limiter,
        group: RouteGroup::RouteRisk,
    };

    let ml = Router::new()
        .route(
            "/api/ml/weather-predictions/:lat/:lng",
            get(weather_predictions_handler::<W, R, V>),
        )
        .route(
            "/api/ml/weather-alerts/:lat/:lng",
            get(weather_alerts_handler::<W, R, V>),
        )
        .route(
            "/api/ml/risk-assessment",
            post(risk_assessment_handler::<W, R, V>),
        )
        .route("/api/ml/analyze-route", post(analyze_route_handler::<W, R, V>))
        .route("/api/ml/dashboard", get(dashboard_handler::<W, R, V>))
        .route_layer(middleware::from_fn_with_state(ml_gate, enforce));

    let route_risk = Router::new()
        .route("/api/route-risk/calc-risk", post(calc_risk_handler::<W, R, V>))
        .route("/api/route-risk/compare", post(compare_handler::<W, R, V>))
        .route(
            "/api/route-risk/history/:route_id",
            get(history_handler::<W, R, V>),
        )
        .route(
            "/api/route-risk/cache/expired",
            delete(purge_handler::<W, R, V>),
        )
        .route_layer(middleware::from_fn_with_state(route_risk_gate, enforce));

    Router::new()
        .route("/api/ml/health", get(health_handler::<W, R, V>))
        .merge(ml)
        .merge(route_risk)
        .with_state(state)
}

fn parse_point(lat: &str, lng: &str) -> Result<Coordinates, ApiError> {
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| ApiError::validation("lat", "Latitude must be a number"))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|_| ApiError::validation("lng", "Longitude must be a number"))?;

    if !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::validation("lat", "Latitude must be between -90 and 90"));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(ApiError::validation(
            "lng",
            "Longitude must be between -180 and 180",
        ));
    }
    Ok(Coordinates::new(lat, lng))
}

fn departure_time(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    parse_departure(raw).map_err(|_| {
        ApiError::validation(
            "departure_time",
            "Invalid departure_time format. Use ISO 8601 format.",
        )
    })
}

fn query_rejected(rejection: QueryRejection) -> ApiError {
    ApiError::validation("query", rejection.body_text())
}

pub(crate) async fn health_handler<W, R, V>(
    State(state): State<ApiState<W, R, V>>,
) -> Json<Envelope<Value>>
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
    V: VehicleRepository + 'static,
{
    let service = &state.service;
    ok_with_message(
        json!({
            "services": {
                "risk_calculator": "active",
                "weather_provider": service.weather_service().provider().name(),
                "crime_data": service.crime().source(),
                "route_risk_service": "active",
            },
            "timestamp": service.now(),
        }),
        "Risk assessment service is running",
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct DaysQuery {
    days: Option<u32>,
}

pub(crate) async fn weather_predictions_handler<W, R, V>(
    State(state): State<ApiState<W, R, V>>,
    Path((lat, lng)): Path<(String, String)>,
    query: Result<Query<DaysQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
    V: VehicleRepository + 'static,
{
    let point = parse_point(&lat, &lng)?;
    let Query(query) = query.map_err(query_rejected)?;
    let days = query.days.unwrap_or(DEFAULT_OUTLOOK_DAYS);

    let outlook = state
        .service
        .weather_outlook(point, days)
        .await
        .map_err(|err| state.fail("Weather predictions failed", err))?;
    Ok(ok(outlook))
}

pub(crate) async fn weather_alerts_handler<W, R, V>(
    State(state): State<ApiState<W, R, V>>,
    Path((lat, lng)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError>
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
    V: VehicleRepository + 'static,
{
    let point = parse_point(&lat, &lng)?;
    Ok(ok(state.service.area_alerts(point).await))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RiskAssessmentPayload {
    #[serde(default)]
    vehicle_id: Option<String>,
    #[serde(default)]
    current_location: Option<Coordinates>,
    #[serde(default)]
    route_data: Option<RouteProfile>,
}

pub(crate) async fn risk_assessment_handler<W, R, V>(
    State(state): State<ApiState<W, R, V>>,
    payload: Result<Json<RiskAssessmentPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
    V: VehicleRepository + 'static,
{
    let Json(payload) = payload.map_err(|rejection| state.rejected_body(rejection))?;
    let vehicle_id = payload.vehicle_id.filter(|id| !id.trim().is_empty());
    let (Some(vehicle_id), Some(location)) = (vehicle_id, payload.current_location) else {
        return Err(ApiError::validation(
            "vehicleId",
            "Vehicle ID and current location are required",
        ));
    };

    let assessment = state
        .service
        .assess_vehicle(&vehicle_id, location, payload.route_data)
        .await
        .map_err(|err| state.fail("Risk assessment failed", err))?;
    Ok(ok(assessment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnalyzeRoutePayload {
    #[serde(default)]
    route_id: Option<String>,
    #[serde(default)]
    route_name: Option<String>,
    #[serde(default)]
    start: Option<Waypoint>,
    #[serde(default)]
    end: Option<Waypoint>,
    #[serde(default)]
    waypoints: Vec<Waypoint>,
    #[serde(default)]
    vehicle_id: Option<String>,
}

pub(crate) async fn analyze_route_handler<W, R, V>(
    State(state): State<ApiState<W, R, V>>,
    payload: Result<Json<AnalyzeRoutePayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
    V: VehicleRepository + 'static,
{
    let Json(payload) = payload.map_err(|rejection| state.rejected_body(rejection))?;
    let (Some(start), Some(end)) = (payload.start, payload.end) else {
        return Err(ApiError::validation(
            "start",
            "Start and end locations are required",
        ));
    };

    let request = RouteAnalysisRequest {
        route_id: payload.route_id,
        route_name: payload.route_name,
        start,
        end,
        waypoints: payload.waypoints,
        vehicle_id: payload.vehicle_id,
    };
    let analysis = state
        .service
        .analyze_route(&request, &state.owner_id)
        .await
        .map_err(|err| state.fail("Route analysis failed", err))?;
    Ok(ok(analysis))
}

pub(crate) async fn dashboard_handler<W, R, V>(
    State(state): State<ApiState<W, R, V>>,
) -> Result<impl IntoResponse, ApiError>
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
    V: VehicleRepository + 'static,
{
    let dashboard = state
        .service
        .dashboard(&state.owner_id)
        .await
        .map_err(|err| state.fail("Failed to load dashboard", err))?;
    Ok(ok(dashboard))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CalcRiskPayload {
    #[serde(default, rename = "routeId", alias = "route_id")]
    route_id: Option<String>,
    #[serde(default)]
    departure_time: Option<String>,
}

pub(crate) async fn calc_risk_handler<W, R, V>(
    State(state): State<ApiState<W, R, V>>,
    payload: Result<Json<CalcRiskPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
    V: VehicleRepository + 'static,
{
    let Json(payload) = payload.map_err(|rejection| state.rejected_body(rejection))?;
    let Some(route_id) = payload.route_id.filter(|id| !id.trim().is_empty()) else {
        return Err(ApiError::validation("routeId", "Route ID is required"));
    };
    let departure = match payload.departure_time.as_deref() {
        Some(raw) => departure_time(raw)?,
        None => state.service.now(),
    };

    let result = state
        .service
        .calculate_route_risk(&route_id, departure)
        .await
        .map_err(|err| state.fail("Failed to calculate route risk", err))?;
    Ok(ok_with_message(result, "Route risk calculated successfully"))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ComparePayload {
    #[serde(default)]
    route_ids: Vec<String>,
    #[serde(default)]
    departure_time: Option<String>,
}

pub(crate) async fn compare_handler<W, R, V>(
    State(state): State<ApiState<W, R, V>>,
    payload: Result<Json<ComparePayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
    V: VehicleRepository + 'static,
{
    let Json(payload) = payload.map_err(|rejection| state.rejected_body(rejection))?;
    let departure = match payload.departure_time.as_deref() {
        Some(raw) => departure_time(raw)?,
        None => state.service.now(),
    };

    let comparison = state
        .service
        .compare_routes(&payload.route_ids, departure)
        .await
        .map_err(|err| state.fail("Failed to compare route risks", err))?;
    Ok(ok_with_message(
        comparison,
        "Route risks compared successfully",
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct LimitQuery {
    limit: Option<usize>,
}

pub(crate) async fn history_handler<W, R, V>(
    State(state): State<ApiState<W, R, V>>,
    Path(route_id): Path<String>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
    V: VehicleRepository + 'static,
{
    let Query(query) = query.map_err(query_rejected)?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

    let history = state
        .service
        .risk_history(&route_id, limit)
        .map_err(|err| state.fail("Failed to retrieve risk history", err))?;
    Ok(ok_with_message(
        history,
        "Risk history retrieved successfully",
    ))
}

pub(crate) async fn purge_handler<W, R, V>(
    State(state): State<ApiState<W, R, V>>,
) -> Result<impl IntoResponse, ApiError>
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
    V: VehicleRepository + 'static,
{
    let removed = state
        .service
        .purge_expired_risk()
        .map_err(|err| state.fail("Failed to clear expired cache", err))?;
    Ok(ok_with_message(
        json!({ "removed": removed, "timestamp": state.service.now() }),
        "Expired cache cleared successfully",
    ))
}
