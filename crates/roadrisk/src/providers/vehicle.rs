use serde::{Deserialize, Serialize};

use crate::routes::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleStatus {
    Active,
    Inactive,
}

/// Insured vehicle as the calculator sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleProfile {
    pub id: String,
    pub owner_id: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub main_driver_age: u32,
    pub primary_location: String,
    pub coverage_amount: u64,
    pub status: VehicleStatus,
    pub policy_number: Option<String>,
}

impl VehicleProfile {
    /// Stand-in used when a route is analysed without a known vehicle.
    pub fn standard() -> Self {
        Self {
            id: "default".to_string(),
            owner_id: String::new(),
            make: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: 2020,
            main_driver_age: 35,
            primary_location: "Johannesburg".to_string(),
            coverage_amount: 300_000,
            status: VehicleStatus::Active,
            policy_number: None,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }

    pub fn is_active(&self) -> bool {
        self.status == VehicleStatus::Active
    }
}

/// Read-only vehicle lookups.
pub trait VehicleRepository: Send + Sync {
    fn fetch(&self, vehicle_id: &str) -> Result<Option<VehicleProfile>, RepositoryError>;
    fn for_owner(&self, owner_id: &str) -> Result<Vec<VehicleProfile>, RepositoryError>;
}
