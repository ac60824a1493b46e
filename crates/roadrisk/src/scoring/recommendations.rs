use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{FactorDetails, RiskCategory, RiskFactor, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Overall,
    Weather,
    Security,
    Timing,
    Vehicle,
    Route,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
}

impl Recommendation {
    pub fn new(
        category: RecommendationCategory,
        priority: Priority,
        message: &str,
        actions: &[&str],
    ) -> Self {
        Self {
            category,
            priority,
            message: message.to_string(),
            actions: actions.iter().map(|action| action.to_string()).collect(),
        }
    }
}

fn score_of(factors: &BTreeMap<RiskCategory, RiskFactor>, category: RiskCategory) -> f64 {
    factors.get(&category).map_or(0.0, |factor| factor.score)
}

/// Category advice in a fixed order, with an overall entry placed first when the
/// total is high.
pub(super) fn generate(
    overall: f64,
    factors: &BTreeMap<RiskCategory, RiskFactor>,
) -> Vec<Recommendation> {
    use Priority::{Critical, High, Medium};
    use RecommendationCategory as Category;

    let mut recommendations = Vec::new();

    let weather = score_of(factors, RiskCategory::Weather);
    if weather > 20.0 {
        recommendations.push(Recommendation::new(
            Category::Weather,
            High,
            "Severe weather conditions detected. Consider postponing travel or taking alternative route.",
            &["Check weather updates", "Reduce speed", "Increase following distance"],
        ));
    } else if weather > 10.0 {
        recommendations.push(Recommendation::new(
            Category::Weather,
            Medium,
            "Moderate weather risk. Drive with caution.",
            &[
                "Monitor weather conditions",
                "Use headlights",
                "Reduce speed in poor visibility",
            ],
        ));
    }

    if score_of(factors, RiskCategory::Location) > 20.0 {
        recommendations.push(Recommendation::new(
            Category::Security,
            High,
            "Route passes through high-crime areas. Take extra security precautions.",
            &[
                "Lock doors and windows",
                "Avoid stops in high-risk areas",
                "Consider alternative route",
                "Travel in convoy if possible",
            ],
        ));
    }

    let late_night = factors.get(&RiskCategory::Time).is_some_and(|factor| {
        matches!(
            factor.details,
            FactorDetails::Time {
                window: TimeWindow::HighRisk,
                ..
            }
        )
    });
    if late_night {
        recommendations.push(Recommendation::new(
            Category::Timing,
            Medium,
            "Traveling during high-risk hours. Extra vigilance required.",
            &[
                "Stay alert",
                "Avoid isolated areas",
                "Keep fuel tank above half",
                "Inform someone of your route",
            ],
        ));
    }

    if score_of(factors, RiskCategory::Vehicle) > 15.0 {
        recommendations.push(Recommendation::new(
            Category::Vehicle,
            Medium,
            "Vehicle profile indicates elevated risk factors.",
            &[
                "Ensure vehicle maintenance is up to date",
                "Check tire condition",
                "Verify insurance coverage",
            ],
        ));
    }

    if overall > 70.0 {
        recommendations.insert(
            0,
            Recommendation::new(
                Category::Overall,
                Critical,
                "CRITICAL RISK LEVEL: Strongly recommend postponing travel or finding alternative transportation.",
                &[
                    "Postpone travel if possible",
                    "Consider public transport",
                    "Wait for conditions to improve",
                ],
            ),
        );
    } else if overall > 50.0 {
        recommendations.insert(
            0,
            Recommendation::new(
                Category::Overall,
                High,
                "High risk detected. Proceed with extreme caution or consider alternatives.",
                &[
                    "Reassess travel necessity",
                    "Plan frequent check-ins",
                    "Carry emergency supplies",
                ],
            ),
        );
    }

    recommendations
}
