use crate::config::ConfigError;
use crate::providers::ProviderError;
use crate::routes::RouteRiskError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Provider(ProviderError),
    Risk(RouteRiskError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Provider(err) => write!(f, "provider error: {}", err),
            AppError::Risk(err) => write!(f, "risk error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Provider(err) => Some(err),
            AppError::Risk(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Risk(RouteRiskError::Validation { .. }) => StatusCode::BAD_REQUEST,
            AppError::Risk(RouteRiskError::RouteNotFound(_))
            | AppError::Risk(RouteRiskError::VehicleNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Risk(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ProviderError> for AppError {
    fn from(value: ProviderError) -> Self {
        Self::Provider(value)
    }
}

impl From<RouteRiskError> for AppError {
    fn from(value: RouteRiskError) -> Self {
        Self::Risk(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_errors_map_to_client_statuses() {
        let missing = AppError::from(RouteRiskError::VehicleNotFound("vehicle_9".to_string()));
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let invalid = AppError::from(RouteRiskError::Validation {
            field: "limit",
            message: "Limit must be a number between 1 and 100".to_string(),
        });
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn display_prefixes_the_failing_layer() {
        let err = AppError::from(ConfigError::InvalidCacheBackend("redis".to_string()));
        assert!(err.to_string().starts_with("configuration error:"));
    }
}
