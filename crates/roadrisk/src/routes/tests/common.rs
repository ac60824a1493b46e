use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::cache::{Clock, ManualClock, MemoryCache};
use crate::config::{AppEnvironment, RateLimitConfig};
use crate::geo::Coordinates;
use crate::providers::{
    CrimeDataset, DataSource, ProviderError, VehicleProfile, VehicleRepository, VehicleStatus,
    WeatherProvider, WeatherReport, WeatherService,
};
use crate::routes::domain::{RouteRiskResult, Waypoint};
use crate::routes::repository::{RepositoryError, RouteRecord, RouteRepository};
use crate::routes::router::{risk_router, RouterSettings};
use crate::routes::service::RouteRiskService;

pub(super) const OWNER: &str = "demo_user";
pub(super) const JOHANNESBURG: Coordinates = Coordinates::new(-26.2041, 28.0473);
pub(super) const SANDTON: Coordinates = Coordinates::new(-26.1076, 28.0567);
pub(super) const ROSEBANK: Coordinates = Coordinates::new(-26.0908, 28.0567);

pub(super) type TestService =
    RouteRiskService<StubWeather, MemoryRouteRepository, MemoryVehicleRepository>;

/// Tuesday 2025-06-03, 10:00 in Johannesburg.
pub(super) fn weekday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 3, 8, 0, 0).unwrap()
}

pub(super) fn clock() -> ManualClock {
    ManualClock::new(weekday_morning())
}

pub(super) fn validity() -> Duration {
    Duration::hours(6)
}

fn waypoint(point: Coordinates, name: &str) -> Waypoint {
    Waypoint::new(point.lat, point.lng, Some(name))
}

pub(super) fn home_to_work() -> RouteRecord {
    RouteRecord {
        id: "route_1".to_string(),
        owner_id: OWNER.to_string(),
        name: "Home to Work".to_string(),
        source: waypoint(JOHANNESBURG, "Johannesburg"),
        destination: waypoint(SANDTON, "Sandton"),
        waypoints: Vec::new(),
        vehicle_id: Some("vehicle_1".to_string()),
        distance_km: None,
        has_mountain_roads: false,
        highway_percentage: 100.0,
    }
}

/// Mountain pass with little highway; scores higher than [`home_to_work`].
pub(super) fn shopping_trip() -> RouteRecord {
    RouteRecord {
        id: "route_2".to_string(),
        owner_id: OWNER.to_string(),
        name: "Shopping Trip".to_string(),
        source: waypoint(SANDTON, "Sandton"),
        destination: waypoint(ROSEBANK, "Rosebank"),
        waypoints: Vec::new(),
        vehicle_id: Some("vehicle_2".to_string()),
        distance_km: None,
        has_mountain_roads: true,
        highway_percentage: 30.0,
    }
}

pub(super) fn corolla() -> VehicleProfile {
    VehicleProfile {
        id: "vehicle_1".to_string(),
        owner_id: OWNER.to_string(),
        make: "Toyota".to_string(),
        model: "Corolla".to_string(),
        year: 2020,
        main_driver_age: 35,
        primary_location: "Johannesburg".to_string(),
        coverage_amount: 300_000,
        status: VehicleStatus::Active,
        policy_number: Some("POL-12345".to_string()),
    }
}

pub(super) fn bmw() -> VehicleProfile {
    VehicleProfile {
        id: "vehicle_2".to_string(),
        owner_id: OWNER.to_string(),
        make: "BMW".to_string(),
        model: "X3".to_string(),
        year: 2022,
        main_driver_age: 42,
        primary_location: "Cape Town".to_string(),
        coverage_amount: 800_000,
        status: VehicleStatus::Active,
        policy_number: Some("POL-67890".to_string()),
    }
}

pub(super) fn parked_bakkie() -> VehicleProfile {
    VehicleProfile {
        id: "vehicle_3".to_string(),
        owner_id: OWNER.to_string(),
        make: "Toyota".to_string(),
        model: "Hilux".to_string(),
        year: 2012,
        main_driver_age: 58,
        primary_location: "Pretoria".to_string(),
        coverage_amount: 150_000,
        status: VehicleStatus::Inactive,
        policy_number: None,
    }
}

/// Weather provider returning fixed conditions and counting upstream calls.
pub(super) struct StubWeather {
    calls: AtomicUsize,
    precipitation: f64,
    offline: bool,
}

impl StubWeather {
    pub(super) fn calm() -> Self {
        Self::raining(0.0)
    }

    pub(super) fn raining(precipitation: f64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            precipitation,
            offline: false,
        }
    }

    pub(super) fn offline() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            precipitation: 0.0,
            offline: true,
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WeatherProvider for StubWeather {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn current(&self, point: Coordinates) -> Result<WeatherReport, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(ProviderError::Request("connection refused".to_string()));
        }
        let mut report = WeatherReport::fallback(point, weekday_morning());
        report.source = DataSource::OpenMeteo;
        report.fallback = false;
        report.current.precipitation = self.precipitation;
        if self.precipitation > 0.0 {
            report.current.condition = "Rain".to_string();
            report.current.description = "heavy intensity rain".to_string();
        }
        Ok(report)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRouteRepository {
    routes: Arc<Mutex<HashMap<String, RouteRecord>>>,
    results: Arc<Mutex<Vec<RouteRiskResult>>>,
}

impl MemoryRouteRepository {
    pub(super) fn with_routes(routes: Vec<RouteRecord>) -> Self {
        let repository = Self::default();
        {
            let mut guard = repository.routes.lock().expect("repository mutex poisoned");
            for route in routes {
                guard.insert(route.id.clone(), route);
            }
        }
        repository
    }

    pub(super) fn stored(&self) -> Vec<RouteRiskResult> {
        self.results
            .lock()
            .expect("repository mutex poisoned")
            .clone()
    }
}

impl RouteRepository for MemoryRouteRepository {
    fn fetch_route(&self, route_id: &str) -> Result<Option<RouteRecord>, RepositoryError> {
        let guard = self.routes.lock().expect("repository mutex poisoned");
        Ok(guard.get(route_id).cloned())
    }

    fn routes_for_owner(&self, owner_id: &str) -> Result<Vec<RouteRecord>, RepositoryError> {
        let guard = self.routes.lock().expect("repository mutex poisoned");
        let mut routes: Vec<RouteRecord> = guard
            .values()
            .filter(|route| route.owner_id == owner_id)
            .cloned()
            .collect();
        routes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(routes)
    }

    fn latest_risk(
        &self,
        route_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RouteRiskResult>, RepositoryError> {
        let guard = self.results.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|result| result.route_id == route_id && result.is_valid_at(now))
            .max_by_key(|result| result.calculated_at)
            .cloned())
    }

    fn store_risk(&self, result: RouteRiskResult) -> Result<(), RepositoryError> {
        self.results
            .lock()
            .expect("repository mutex poisoned")
            .push(result);
        Ok(())
    }

    fn risk_history(
        &self,
        route_id: &str,
        limit: usize,
    ) -> Result<Vec<RouteRiskResult>, RepositoryError> {
        let guard = self.results.lock().expect("repository mutex poisoned");
        let mut history: Vec<RouteRiskResult> = guard
            .iter()
            .filter(|result| result.route_id == route_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.calculated_at.cmp(&a.calculated_at));
        history.truncate(limit);
        Ok(history)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut guard = self.results.lock().expect("repository mutex poisoned");
        let before = guard.len();
        guard.retain(|result| result.is_valid_at(now));
        Ok(before - guard.len())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryVehicleRepository {
    vehicles: Arc<Mutex<HashMap<String, VehicleProfile>>>,
}

impl MemoryVehicleRepository {
    pub(super) fn with_vehicles(vehicles: Vec<VehicleProfile>) -> Self {
        let repository = Self::default();
        {
            let mut guard = repository
                .vehicles
                .lock()
                .expect("repository mutex poisoned");
            for vehicle in vehicles {
                guard.insert(vehicle.id.clone(), vehicle);
            }
        }
        repository
    }
}

impl VehicleRepository for MemoryVehicleRepository {
    fn fetch(&self, vehicle_id: &str) -> Result<Option<VehicleProfile>, RepositoryError> {
        let guard = self.vehicles.lock().expect("repository mutex poisoned");
        Ok(guard.get(vehicle_id).cloned())
    }

    fn for_owner(&self, owner_id: &str) -> Result<Vec<VehicleProfile>, RepositoryError> {
        let guard = self.vehicles.lock().expect("repository mutex poisoned");
        let mut vehicles: Vec<VehicleProfile> = guard
            .values()
            .filter(|vehicle| vehicle.owner_id == owner_id)
            .cloned()
            .collect();
        vehicles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(vehicles)
    }
}

pub(super) struct UnavailableRepository;

impl RouteRepository for UnavailableRepository {
    fn fetch_route(&self, _route_id: &str) -> Result<Option<RouteRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn routes_for_owner(&self, _owner_id: &str) -> Result<Vec<RouteRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn latest_risk(
        &self,
        _route_id: &str,
        _now: DateTime<Utc>,
    ) -> Result<Option<RouteRiskResult>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn store_risk(&self, _result: RouteRiskResult) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn risk_history(
        &self,
        _route_id: &str,
        _limit: usize,
    ) -> Result<Vec<RouteRiskResult>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn service_with<W, R>(
    weather: W,
    routes: R,
    clock: &ManualClock,
) -> RouteRiskService<W, R, MemoryVehicleRepository>
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
{
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let cache = Arc::new(MemoryCache::with_clock(Arc::clone(&clock)));
    let weather = WeatherService::new(Arc::new(weather), cache, Duration::minutes(10))
        .with_clock(Arc::clone(&clock));
    let vehicles = MemoryVehicleRepository::with_vehicles(vec![corolla(), bmw(), parked_bakkie()]);

    RouteRiskService::new(
        weather,
        Arc::new(CrimeDataset::south_africa()),
        Arc::new(routes),
        Arc::new(vehicles),
        validity(),
    )
    .with_clock(clock)
}

/// Calm weather, both demo routes and a clock fixed at [`weekday_morning`].
pub(super) fn build_service() -> (TestService, MemoryRouteRepository, ManualClock) {
    let clock = clock();
    let routes = MemoryRouteRepository::with_routes(vec![home_to_work(), shopping_trip()]);
    let service = service_with(StubWeather::calm(), routes.clone(), &clock);
    (service, routes, clock)
}

pub(super) fn settings(environment: AppEnvironment, max_requests: u32) -> RouterSettings {
    RouterSettings::new(
        environment,
        RateLimitConfig {
            window_secs: 900,
            max_requests,
        },
    )
}

pub(super) fn router_with_service<W, R>(
    service: RouteRiskService<W, R, MemoryVehicleRepository>,
    settings: RouterSettings,
) -> axum::Router
where
    W: WeatherProvider + 'static,
    R: RouteRepository + 'static,
{
    risk_router(Arc::new(service), settings)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
