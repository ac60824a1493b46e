use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{RiskCalculator, RiskCategory, RiskFactor, RiskLevel};
use crate::providers::VehicleProfile;

const BASE_CLAIM_PROBABILITY: f64 = 0.05;
const MAX_CLAIM_PROBABILITY: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaimProbability {
    pub probability: f64,
    pub percentage: u8,
    pub level: RiskLevel,
}

impl ClaimProbability {
    fn from_probability(probability: f64) -> Self {
        let level = if probability > 0.3 {
            RiskLevel::High
        } else if probability > 0.15 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        Self {
            probability,
            percentage: (probability * 100.0).round() as u8,
            level,
        }
    }
}

impl RiskCalculator {
    /// Likelihood of an insurance claim, scaled from a 5% base by the category
    /// scores and the vehicle and driver ages.
    pub fn claim_probability(
        &self,
        vehicle: &VehicleProfile,
        factors: &BTreeMap<RiskCategory, RiskFactor>,
        at: NaiveDateTime,
    ) -> ClaimProbability {
        let total: f64 = factors.values().map(|factor| factor.score).sum();
        let mut probability = BASE_CLAIM_PROBABILITY * (1.0 + total / 200.0);

        if at.year() - vehicle.year > 10 {
            probability *= 1.3;
        }

        if vehicle.main_driver_age < 25 {
            probability *= 1.8;
        } else if vehicle.main_driver_age > 65 {
            probability *= 1.2;
        }

        ClaimProbability::from_probability(probability.clamp(0.0, MAX_CLAIM_PROBABILITY))
    }
}
