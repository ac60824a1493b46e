use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{RouteAnalysisRequest, RouteRiskResult, Waypoint};
use crate::geo::{path_length_km, Coordinates};
use crate::scoring::RouteTerrain;

fn all_highway() -> f64 {
    100.0
}

/// Catalogued route owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub source: Waypoint,
    pub destination: Waypoint,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    /// Known road distance; the straight path length is used when absent.
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub has_mountain_roads: bool,
    #[serde(default = "all_highway")]
    pub highway_percentage: f64,
}

impl RouteRecord {
    pub fn path(&self) -> Vec<Coordinates> {
        std::iter::once(&self.source)
            .chain(self.waypoints.iter())
            .chain(std::iter::once(&self.destination))
            .map(Waypoint::location)
            .collect()
    }

    pub fn terrain(&self) -> RouteTerrain {
        RouteTerrain {
            distance_km: self
                .distance_km
                .unwrap_or_else(|| path_length_km(&self.path())),
            has_mountain_roads: self.has_mountain_roads,
            highway_percentage: self.highway_percentage,
        }
    }

    pub fn analysis_request(&self) -> RouteAnalysisRequest {
        RouteAnalysisRequest {
            route_id: Some(self.id.clone()),
            route_name: Some(self.name.clone()),
            start: self.source.clone(),
            end: self.destination.clone(),
            waypoints: self.waypoints.clone(),
            vehicle_id: self.vehicle_id.clone(),
        }
    }
}

/// Route catalogue plus the store of computed route-risk results.
pub trait RouteRepository: Send + Sync {
    fn fetch_route(&self, route_id: &str) -> Result<Option<RouteRecord>, RepositoryError>;
    fn routes_for_owner(&self, owner_id: &str) -> Result<Vec<RouteRecord>, RepositoryError>;
    /// Most recently calculated result still valid at `now`.
    fn latest_risk(
        &self,
        route_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RouteRiskResult>, RepositoryError>;
    fn store_risk(&self, result: RouteRiskResult) -> Result<(), RepositoryError>;
    /// Stored results, newest first.
    fn risk_history(
        &self,
        route_id: &str,
        limit: usize,
    ) -> Result<Vec<RouteRiskResult>, RepositoryError>;
    /// Deletes results whose validity ended before `now`; returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
