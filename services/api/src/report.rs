use crate::infra::build_risk_service;
use chrono::{DateTime, Utc};
use clap::Args;
use roadrisk::config::AppConfig;
use roadrisk::error::AppError;
use roadrisk::geo::Coordinates;
use roadrisk::routes::{RouteRiskResult, VehicleAssessment};
use roadrisk::scoring::parse_departure;

#[derive(Args, Debug)]
pub(crate) struct AssessArgs {
    /// Vehicle identifier from the demo fleet (vehicle_1, vehicle_2)
    #[arg(long)]
    pub(crate) vehicle: String,
    /// Current latitude
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) lat: f64,
    /// Current longitude
    #[arg(long, allow_hyphen_values = true)]
    pub(crate) lng: f64,
    /// Print the raw JSON payload instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct RouteArgs {
    /// Catalogued route identifier (route_1, route_2)
    #[arg(long)]
    pub(crate) route_id: String,
    /// Departure time, RFC 3339 or local South African time. Defaults to now.
    #[arg(long, value_parser = parse_departure)]
    pub(crate) departure: Option<DateTime<Utc>>,
    /// Print the raw JSON payload instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_assessment(args: AssessArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = build_risk_service(&config)?;

    let assessment = service
        .assess_vehicle(&args.vehicle, Coordinates::new(args.lat, args.lng), None)
        .await?;

    if args.json {
        print_json(&assessment);
    } else {
        render_assessment(&assessment);
    }
    Ok(())
}

pub(crate) async fn run_route_risk(args: RouteArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = build_risk_service(&config)?;
    let departure = args.departure.unwrap_or_else(|| service.now());

    let result = service.calculate_route_risk(&args.route_id, departure).await?;

    if args.json {
        print_json(&result);
    } else {
        render_route_risk(&result);
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(err) => println!("Payload unavailable: {}", err),
    }
}

fn render_assessment(assessment: &VehicleAssessment) {
    let risk = &assessment.risk_assessment;
    println!("Risk assessment for {}", assessment.vehicle_id);
    println!("Overall: {:.2} ({})", risk.overall_score, risk.level);

    println!("\nFactors");
    for (category, factor) in &risk.factors {
        println!("- {:?}: {:.1}", category, factor.score);
        for reason in &factor.factors {
            println!("    {}", reason);
        }
    }

    let weather = &assessment.weather_data;
    println!(
        "\nWeather: {} ({:.1} mm, {:.0} km/h wind, {:.1} km visibility){}",
        weather.current.condition,
        weather.current.precipitation,
        weather.current.wind_speed,
        weather.current.visibility,
        if weather.fallback { " [fallback]" } else { "" }
    );

    let alerts = &assessment.real_time_alerts.alerts;
    if alerts.is_empty() {
        println!("\nAlerts: none");
    } else {
        println!("\nAlerts");
        for alert in alerts {
            println!("- [{:?}] {}: {}", alert.severity, alert.title, alert.message);
        }
    }

    if !risk.recommendations.is_empty() {
        println!("\nRecommendations");
        for recommendation in &risk.recommendations {
            println!("- {}", recommendation.message);
        }
    }

    let claim = &assessment.claim_probability;
    println!("\nClaim probability: {}% ({})", claim.percentage, claim.level);
}

fn render_route_risk(result: &RouteRiskResult) {
    println!("Route risk for {}", result.route_id);
    println!(
        "Score: {:.0} ({}){}",
        result.risk_score,
        result.risk_level,
        if result.cached { " [stored]" } else { "" }
    );
    println!("Departure (local): {}", result.departure_time);
    println!("Valid until: {}", result.valid_until.to_rfc3339());

    let factors = &result.risk_factors;
    println!("\nComponents");
    println!("- Weather: {:.1}", factors.weather_risk);
    println!("- Route complexity: {:.1}", factors.route_complexity);
    println!("- Traffic: {:.1}", factors.traffic_risk);
    println!("- Time of day: {:.1}", factors.time_of_day_risk);

    println!("\nSegments");
    for segment in &result.weather_factors {
        println!(
            "- #{} ({:.4}, {:.4}): hazard {:.0}, {}{}",
            segment.segment_index,
            segment.location.lat,
            segment.location.lng,
            segment.hazard_score,
            segment.condition,
            if segment.is_fallback { " [fallback]" } else { "" }
        );
    }
}
