use super::common::*;
use chrono::{Duration, TimeZone, Utc};

use crate::geo::RouteClass;
use crate::providers::AlertSeverity;
use crate::routes::domain::{ComparisonEntry, RouteAnalysisRequest, Waypoint};
use crate::routes::repository::RepositoryError;
use crate::routes::service::RouteRiskError;
use crate::scoring::{AlertKind, RiskLevel, RouteProfile};

#[tokio::test]
async fn route_risk_is_stored_and_reused_until_it_expires() {
    let (service, repository, clock) = build_service();

    let first = service
        .calculate_route_risk("route_1", weekday_morning())
        .await
        .expect("calm route scores");
    assert!(!first.cached);
    assert_eq!(first.risk_score, 0.0);
    assert_eq!(first.risk_level, RiskLevel::Low);
    assert_eq!(first.valid_until, weekday_morning() + validity());
    assert!(!first.weather_factors.is_empty());
    assert!(first.weather_factors.iter().all(|segment| !segment.is_fallback));
    let upstream_calls = service.weather_service().provider().calls();

    clock.advance(Duration::hours(1));
    let second = service
        .calculate_route_risk("route_1", weekday_morning())
        .await
        .expect("stored result");
    assert!(second.cached);
    assert_eq!(second.calculated_at, first.calculated_at);
    assert_eq!(service.weather_service().provider().calls(), upstream_calls);
    assert_eq!(repository.stored().len(), 1);

    clock.advance(Duration::hours(5));
    let third = service
        .calculate_route_risk("route_1", weekday_morning())
        .await
        .expect("recomputed result");
    assert!(!third.cached);
    assert_eq!(third.calculated_at, weekday_morning() + validity());
    assert_eq!(repository.stored().len(), 2);
}

#[tokio::test]
async fn departure_hour_drives_traffic_and_night_components() {
    let clock = clock();

    let rush_hour = service_with(
        StubWeather::calm(),
        MemoryRouteRepository::with_routes(vec![home_to_work()]),
        &clock,
    );
    let result = rush_hour
        .calculate_route_risk("route_1", Utc.with_ymd_and_hms(2025, 6, 3, 5, 30, 0).unwrap())
        .await
        .expect("rush hour score");
    assert_eq!(result.risk_factors.traffic_risk, 15.0);
    assert_eq!(result.risk_factors.time_of_day_risk, 0.0);
    assert_eq!(result.risk_score, 5.0);
    assert_eq!(result.departure_time.to_string(), "2025-06-03 07:30:00");

    let late_night = service_with(
        StubWeather::calm(),
        MemoryRouteRepository::with_routes(vec![home_to_work()]),
        &clock,
    );
    let result = late_night
        .calculate_route_risk("route_1", Utc.with_ymd_and_hms(2025, 6, 3, 21, 0, 0).unwrap())
        .await
        .expect("night score");
    assert_eq!(result.risk_factors.time_of_day_risk, 20.0);
    assert_eq!(result.risk_score, 6.0);
}

#[tokio::test]
async fn heavy_rain_along_route_raises_the_weather_component() {
    let clock = clock();
    let service = service_with(
        StubWeather::raining(25.0),
        MemoryRouteRepository::with_routes(vec![home_to_work()]),
        &clock,
    );

    let result = service
        .calculate_route_risk("route_1", weekday_morning())
        .await
        .expect("wet route scores");

    assert_eq!(result.risk_factors.weather_risk, 40.0);
    assert_eq!(result.risk_score, 24.0);
    assert!(result
        .weather_factors
        .iter()
        .all(|segment| segment.condition == "Rain"));
}

#[tokio::test]
async fn offline_weather_marks_segments_as_fallback() {
    let clock = clock();
    let service = service_with(
        StubWeather::offline(),
        MemoryRouteRepository::with_routes(vec![home_to_work()]),
        &clock,
    );

    let result = service
        .calculate_route_risk("route_1", weekday_morning())
        .await
        .expect("fallback weather still scores");

    assert!(result.weather_factors.iter().all(|segment| segment.is_fallback));
    assert_eq!(result.risk_factors.weather_risk, 0.0);
}

#[tokio::test]
async fn unknown_route_is_reported_as_not_found() {
    let (service, repository, _) = build_service();

    match service.calculate_route_risk("route_404", weekday_morning()).await {
        Err(RouteRiskError::RouteNotFound(route_id)) => assert_eq!(route_id, "route_404"),
        other => panic!("expected route not found, got {other:?}"),
    }
    assert!(repository.stored().is_empty());
}

#[tokio::test]
async fn repository_outage_propagates() {
    let clock = clock();
    let service = service_with(StubWeather::calm(), UnavailableRepository, &clock);

    match service.calculate_route_risk("route_1", weekday_morning()).await {
        Err(RouteRiskError::Repository(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected repository outage, got {other:?}"),
    }
}

#[tokio::test]
async fn compare_recommends_lowest_score_and_keeps_failures() {
    let (service, _, _) = build_service();
    let route_ids = vec![
        "route_2".to_string(),
        "route_missing".to_string(),
        "route_1".to_string(),
    ];

    let comparison = service
        .compare_routes(&route_ids, weekday_morning())
        .await
        .expect("comparison succeeds");

    assert_eq!(comparison.routes.len(), 3);
    assert_eq!(comparison.routes[0].score(), Some(4.0));
    match &comparison.routes[1] {
        ComparisonEntry::Failed {
            route_id,
            error,
            risk_score,
        } => {
            assert_eq!(route_id, "route_missing");
            assert_eq!(error, "Route route_missing not found");
            assert!(risk_score.is_none());
        }
        other => panic!("expected failed entry, got {other:?}"),
    }
    assert_eq!(comparison.recommended_route.as_deref(), Some("route_1"));
    assert_eq!(comparison.comparison_time, weekday_morning());
}

#[tokio::test]
async fn compare_rejects_empty_and_oversized_requests() {
    let (service, _, _) = build_service();

    match service.compare_routes(&[], weekday_morning()).await {
        Err(RouteRiskError::Validation { field, message }) => {
            assert_eq!(field, "route_ids");
            assert_eq!(message, "route_ids array is required and must not be empty");
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let too_many: Vec<String> = (0..11).map(|index| format!("route_{index}")).collect();
    match service.compare_routes(&too_many, weekday_morning()).await {
        Err(RouteRiskError::Validation { message, .. }) => {
            assert_eq!(message, "Maximum 10 routes can be compared at once");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn history_lists_newest_first_within_limit() {
    let (service, _, clock) = build_service();
    for _ in 0..3 {
        service
            .calculate_route_risk("route_1", weekday_morning())
            .await
            .expect("score");
        clock.advance(validity());
    }

    let history = service.risk_history("route_1", 2).expect("history");
    assert_eq!(history.total_records, 2);
    assert!(history.history[0].calculated_at > history.history[1].calculated_at);

    assert!(matches!(
        service.risk_history("route_1", 0),
        Err(RouteRiskError::Validation { field: "limit", .. })
    ));
    assert!(matches!(
        service.risk_history("route_1", 101),
        Err(RouteRiskError::Validation { field: "limit", .. })
    ));
}

#[tokio::test]
async fn purge_removes_only_expired_results() {
    let (service, repository, clock) = build_service();
    service
        .calculate_route_risk("route_1", weekday_morning())
        .await
        .expect("score");
    clock.advance(Duration::hours(4));
    service
        .calculate_route_risk("route_2", weekday_morning())
        .await
        .expect("score");

    clock.advance(Duration::hours(3));
    assert_eq!(service.purge_expired_risk().expect("purge"), 1);

    let remaining = repository.stored();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].route_id, "route_2");
}

#[tokio::test]
async fn analysis_derives_identity_and_flags_wet_points() {
    let clock = clock();
    let service = service_with(
        StubWeather::raining(25.0),
        MemoryRouteRepository::default(),
        &clock,
    );
    let request = RouteAnalysisRequest::new(
        Waypoint::new(-26.2041, 28.0473, Some("Johannesburg")),
        Waypoint::new(-26.1076, 28.0567, Some("Sandton")),
    );

    let analysis = service
        .analyze_route(&request, OWNER)
        .await
        .expect("analysis");

    assert_eq!(analysis.route_id, "route__26_2041_28_0473_to__26_1076_28_0567");
    assert_eq!(analysis.route_name, "Johannesburg to Sandton");
    assert_eq!(analysis.route.source, "basic_calculation");
    assert!((analysis.route.distance - 10.7).abs() < 0.5);
    assert_eq!(analysis.route.class, RouteClass::ShortDistance);
    assert!(analysis.route.duration_in_traffic > analysis.route.duration);
    assert_eq!(analysis.risk_assessment.confidence, 0.7);
    assert_eq!(analysis.last_updated, weekday_morning());
    assert!((0.0..=100.0).contains(&analysis.security.security_score));

    let rain: Vec<_> = analysis
        .real_time_alerts
        .iter()
        .filter(|alert| alert.kind == AlertKind::HeavyRain)
        .collect();
    assert_eq!(rain.len(), analysis.weather.points.len());
    assert!(rain
        .iter()
        .all(|alert| alert.severity == AlertSeverity::Medium && alert.location.is_some()));
}

#[tokio::test]
async fn analysis_rejects_out_of_range_waypoints() {
    let (service, _, _) = build_service();
    let mut request = RouteAnalysisRequest::new(
        Waypoint::new(-26.2041, 28.0473, None),
        Waypoint::new(-26.1076, 28.0567, None),
    );
    request.waypoints.push(Waypoint::new(-95.0, 28.0, None));

    match service.analyze_route(&request, OWNER).await {
        Err(RouteRiskError::Validation { field, .. }) => assert_eq!(field, "waypoints"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn dashboard_buckets_owner_routes_and_lists_active_vehicles() {
    let (service, _, _) = build_service();

    let dashboard = service.dashboard(OWNER).await.expect("dashboard");

    assert_eq!(dashboard.routes.total(), 2);
    let summary = &dashboard.summary;
    assert_eq!(
        summary.protected_routes.count + summary.at_risk_routes.count + summary.monitored_vehicles.count,
        2
    );
    let expected_share = (summary.protected_routes.count as f64 / 2.0 * 100.0).round() as u8;
    assert_eq!(summary.risk_mitigation.percentage, expected_share);

    let vehicle_ids: Vec<&str> = dashboard
        .vehicles
        .iter()
        .map(|vehicle| vehicle.id.as_str())
        .collect();
    assert_eq!(vehicle_ids, vec!["vehicle_1", "vehicle_2"]);

    let risky = !dashboard.routes.at_risk.is_empty() || !dashboard.routes.monitored.is_empty();
    assert_eq!(!dashboard.recommendations.is_empty(), risky);
    assert!(dashboard.recent_alerts.len() <= 10);
}

#[tokio::test]
async fn dashboard_for_owner_without_routes_is_empty() {
    let (service, _, _) = build_service();

    let dashboard = service.dashboard("someone_else").await.expect("dashboard");

    assert_eq!(dashboard.routes.total(), 0);
    assert_eq!(dashboard.summary.risk_mitigation.percentage, 0);
    assert!(dashboard.vehicles.is_empty());
    assert!(dashboard.recommendations.is_empty());
}

#[tokio::test]
async fn vehicle_assessment_covers_score_alerts_and_claims() {
    let (service, _, _) = build_service();

    let assessment = service
        .assess_vehicle("vehicle_1", JOHANNESBURG, None)
        .await
        .expect("assessment");

    assert_eq!(assessment.vehicle_id, "vehicle_1");
    assert!((0.0..=100.0).contains(&assessment.risk_assessment.overall_score));
    assert!(assessment.claim_probability.percentage <= 95);
    assert!(!assessment.weather_data.fallback);
    assert_eq!(assessment.assessment_timestamp, weekday_morning());
}

#[tokio::test]
async fn vehicle_assessment_uses_route_when_given() {
    let (service, _, _) = build_service();
    let route = RouteProfile::path(vec![JOHANNESBURG, SANDTON, ROSEBANK], None);

    let with_route = service
        .assess_vehicle("vehicle_2", JOHANNESBURG, Some(route))
        .await
        .expect("assessment");
    let point_only = service
        .assess_vehicle("vehicle_2", JOHANNESBURG, None)
        .await
        .expect("assessment");

    assert!(with_route.risk_assessment.overall_score >= point_only.risk_assessment.overall_score);
}

#[tokio::test]
async fn vehicle_assessment_rejects_unknown_vehicle_and_bad_location() {
    let (service, _, _) = build_service();

    assert!(matches!(
        service.assess_vehicle("vehicle_9", JOHANNESBURG, None).await,
        Err(RouteRiskError::VehicleNotFound(_))
    ));
    assert!(matches!(
        service
            .assess_vehicle("vehicle_1", crate::geo::Coordinates::new(120.0, 28.0), None)
            .await,
        Err(RouteRiskError::Validation {
            field: "currentLocation",
            ..
        })
    ));
}

#[tokio::test]
async fn outlook_respects_day_bounds() {
    let (service, _, _) = build_service();

    let outlook = service
        .weather_outlook(SANDTON, 3)
        .await
        .expect("outlook");
    assert_eq!(outlook.predictions.len(), 3);
    assert_eq!(
        outlook.predictions[0].date,
        chrono::NaiveDate::from_ymd_opt(2025, 6, 4).unwrap()
    );

    assert!(matches!(
        service.weather_outlook(SANDTON, 0).await,
        Err(RouteRiskError::Validation { field: "days", .. })
    ));
    assert!(matches!(
        service.weather_outlook(SANDTON, 15).await,
        Err(RouteRiskError::Validation { field: "days", .. })
    ));
}

#[tokio::test]
async fn area_alerts_cover_three_days() {
    let (service, _, _) = build_service();

    let alerts = service.area_alerts(ROSEBANK).await;

    assert_eq!(alerts.predictions.len(), 3);
    assert_eq!(alerts.location.lat, ROSEBANK.lat);
    assert_eq!(alerts.timestamp, weekday_morning());
}
