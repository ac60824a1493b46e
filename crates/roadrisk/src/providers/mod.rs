//! External data feeding the calculator: live weather, crime tables and vehicles.
//!
//! Weather lookups fail over to a hardcoded report instead of surfacing errors;
//! callers tell the two apart through `WeatherReport::source` and `fallback`.

pub mod crime;
mod http;
pub mod vehicle;
pub mod weather;
mod weather_service;

pub use crime::{
    CrimeDataset, CrimeIncident, CrimeKind, CrimeProfile, CrimeSeverity, Hotspot,
    DEFAULT_CRIME_RADIUS_KM,
};
pub use http::{HttpWeatherProvider, WeatherApi};
pub use vehicle::{VehicleProfile, VehicleRepository, VehicleStatus};
pub use weather::{
    generate_weather_alerts, weather_code_risk, weather_hazard_score, AlertSeverity,
    DailyPrediction, DataSource, ForecastPoint, ReportLocation, WeatherAlert, WeatherAlertKind,
    WeatherConditions, WeatherReport,
};
pub use weather_service::{
    RouteWeather, RouteWeatherAssessment, WeatherAggregate, WeatherService, MAX_ROUTE_SAMPLES,
};

use std::future::Future;

use crate::geo::Coordinates;

/// Upstream source of current conditions for a point.
pub trait WeatherProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn current(
        &self,
        point: Coordinates,
    ) -> impl Future<Output = Result<WeatherReport, ProviderError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("weather request failed: {0}")]
    Request(String),
    #[error("weather API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("weather response could not be parsed: {0}")]
    Parse(String),
    #[error("weather client could not be built: {0}")]
    Client(String),
}
