use crate::cli::ServeArgs;
use crate::infra::{build_risk_service, AppState};
use crate::routes::with_risk_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use roadrisk::config::AppConfig;
use roadrisk::error::AppError;
use roadrisk::providers::WeatherProvider;
use roadrisk::routes::RouterSettings;
use roadrisk::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(build_risk_service(&config)?);
    let provider = service.weather_service().provider().name();
    let settings = RouterSettings::new(config.environment, config.rate_limit);

    let app = with_risk_routes(service, settings)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        provider,
        cache = ?config.cache.backend,
        "route risk service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
