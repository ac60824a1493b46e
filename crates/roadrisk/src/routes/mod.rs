//! Route analysis, stored route-risk results and the HTTP surface over them.
//!
//! Ad-hoc analyses are computed from straight-line paths; catalogued routes get a
//! per-segment composite score that is kept for a validity window and reused
//! until it expires.

pub mod domain;
pub mod rate_limit;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    generate_route_id, AreaAlerts, BasicRoute, CategorizedRoutes, ComparisonEntry, Dashboard,
    DashboardSummary, RiskHistory, RouteAnalysis, RouteAnalysisRequest, RouteCategory,
    RouteComparison, RouteRiskAssessment, RouteRiskResult, RouteSecurity, SegmentRisk,
    VehicleAssessment, WeatherOutlook, Waypoint,
};
pub use rate_limit::{RateLimiter, RouteGroup};
pub use repository::{RepositoryError, RouteRecord, RouteRepository};
pub use router::{risk_router, ApiError, RouterSettings, DEMO_OWNER};
pub use service::{RouteRiskError, RouteRiskService};
