use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use roadrisk::cache::{CacheStore, FileCache, MemoryCache};
use roadrisk::config::{AppConfig, CacheBackend};
use roadrisk::error::AppError;
use roadrisk::providers::{
    CrimeDataset, HttpWeatherProvider, VehicleProfile, VehicleRepository, VehicleStatus,
    WeatherApi, WeatherService,
};
use roadrisk::routes::{
    RepositoryError, RouteRecord, RouteRepository, RouteRiskResult, RouteRiskService, Waypoint,
    DEMO_OWNER,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

pub(crate) type RiskService =
    RouteRiskService<HttpWeatherProvider, InMemoryRouteRepository, InMemoryVehicleRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Route catalogue and stored results, seeded with the demo owner's routes.
#[derive(Default, Clone)]
pub(crate) struct InMemoryRouteRepository {
    routes: Arc<Mutex<HashMap<String, RouteRecord>>>,
    results: Arc<Mutex<Vec<RouteRiskResult>>>,
}

impl InMemoryRouteRepository {
    pub(crate) fn seeded() -> Self {
        let repository = Self::default();
        {
            let mut guard = repository.routes.lock().expect("repository mutex poisoned");
            for route in demo_routes() {
                guard.insert(route.id.clone(), route);
            }
        }
        repository
    }
}

impl RouteRepository for InMemoryRouteRepository {
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
        let mut guard = self.results.lock().expect("repository mutex poisoned");
        guard.push(result);
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
pub(crate) struct InMemoryVehicleRepository {
    vehicles: Arc<Mutex<HashMap<String, VehicleProfile>>>,
}

impl InMemoryVehicleRepository {
    pub(crate) fn seeded() -> Self {
        let repository = Self::default();
        {
            let mut guard = repository
                .vehicles
                .lock()
                .expect("repository mutex poisoned");
            for vehicle in demo_vehicles() {
                guard.insert(vehicle.id.clone(), vehicle);
            }
        }
        repository
    }
}

impl VehicleRepository for InMemoryVehicleRepository {
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

fn demo_vehicles() -> Vec<VehicleProfile> {
    vec![
        VehicleProfile {
            id: "vehicle_1".to_string(),
            owner_id: DEMO_OWNER.to_string(),
            make: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: 2020,
            main_driver_age: 35,
            primary_location: "Johannesburg".to_string(),
            coverage_amount: 300_000,
            status: VehicleStatus::Active,
            policy_number: Some("POL-12345".to_string()),
        },
        VehicleProfile {
            id: "vehicle_2".to_string(),
            owner_id: DEMO_OWNER.to_string(),
            make: "BMW".to_string(),
            model: "X3".to_string(),
            year: 2022,
            main_driver_age: 42,
            primary_location: "Cape Town".to_string(),
            coverage_amount: 800_000,
            status: VehicleStatus::Active,
            policy_number: Some("POL-67890".to_string()),
        },
    ]
}

fn demo_routes() -> Vec<RouteRecord> {
    let johannesburg = Waypoint::new(-26.2041, 28.0473, Some("Johannesburg"));
    let sandton = Waypoint::new(-26.1076, 28.0567, Some("Sandton"));
    let rosebank = Waypoint::new(-26.0908, 28.0567, Some("Rosebank"));

    vec![
        RouteRecord {
            id: "route_1".to_string(),
            owner_id: DEMO_OWNER.to_string(),
            name: "Home to Work".to_string(),
            source: johannesburg,
            destination: sandton.clone(),
            waypoints: Vec::new(),
            vehicle_id: Some("vehicle_1".to_string()),
            distance_km: None,
            has_mountain_roads: false,
            highway_percentage: 100.0,
        },
        RouteRecord {
            id: "route_2".to_string(),
            owner_id: DEMO_OWNER.to_string(),
            name: "Shopping Trip".to_string(),
            source: sandton,
            destination: rosebank,
            waypoints: Vec::new(),
            vehicle_id: Some("vehicle_1".to_string()),
            distance_km: None,
            has_mountain_roads: false,
            highway_percentage: 100.0,
        },
    ]
}

/// Wires the weather cache, upstream provider, crime tables and seeded repositories
/// into a service according to `config`.
pub(crate) fn build_risk_service(config: &AppConfig) -> Result<RiskService, AppError> {
    let cache: Arc<dyn CacheStore> = match config.cache.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::File => Arc::new(FileCache::new(config.cache.dir.clone())),
    };
    let api = WeatherApi::from_key(config.weather.openweather_api_key.clone());
    let provider = HttpWeatherProvider::new(api, config.weather.timeout())?;
    let weather = WeatherService::new(Arc::new(provider), cache, config.cache.weather_ttl());
    let crime = CrimeDataset::load(config.risk.crime_data_path.as_deref());

    Ok(RouteRiskService::new(
        weather,
        Arc::new(crime),
        Arc::new(InMemoryRouteRepository::seeded()),
        Arc::new(InMemoryVehicleRepository::seeded()),
        config.risk.route_validity(),
    ))
}
