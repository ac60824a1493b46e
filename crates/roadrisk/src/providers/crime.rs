use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::geo::{haversine_km, Coordinates};

pub const DEFAULT_CRIME_RADIUS_KM: f64 = 5.0;
const MAX_REPORTED_INCIDENTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrimeKind {
    Theft,
    Hijacking,
    Burglary,
    Robbery,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrimeSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CrimeSeverity {
    pub fn is_serious(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// One row of the incident table: a reporting area and its monthly volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrimeIncident {
    pub id: u32,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type", alias = "kind")]
    pub kind: CrimeKind,
    pub severity: CrimeSeverity,
    pub area: String,
    pub incidents_per_month: u32,
}

impl CrimeIncident {
    pub fn location(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// Named area the calculator treats as dangerous, with a 0-100 risk rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub risk_level: f64,
}

impl Hotspot {
    fn new(name: &str, lat: f64, lng: f64, risk_level: f64) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lng,
            risk_level,
        }
    }

    pub fn location(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrimeProfile {
    pub area_risk_score: f64,
    pub nearby_incidents: Vec<CrimeIncident>,
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub fallback: bool,
}

/// Incident and hotspot tables backing crime lookups.
#[derive(Debug, Clone)]
pub struct CrimeDataset {
    incidents: Vec<CrimeIncident>,
    hotspots: Vec<Hotspot>,
    source: String,
    /// Set when a configured CSV could not be used and the built-in table stands in.
    fallback: bool,
}

impl CrimeDataset {
    /// The built-in South African tables.
    pub fn south_africa() -> Self {
        Self {
            incidents: default_incidents(),
            hotspots: default_hotspots(),
            source: "built-in".to_string(),
            fallback: false,
        }
    }

    fn built_in_fallback() -> Self {
        Self {
            fallback: true,
            ..Self::south_africa()
        }
    }

    pub fn with_incidents(incidents: Vec<CrimeIncident>) -> Self {
        Self {
            incidents,
            hotspots: default_hotspots(),
            source: "custom".to_string(),
            fallback: false,
        }
    }

    /// Incidents from a CSV file when `path` is given and readable, otherwise the
    /// built-in table. Hotspots are always the built-in list.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::south_africa();
        };

        match File::open(path)
            .map_err(csv::Error::from)
            .and_then(Self::read_incidents)
        {
            Ok(incidents) if !incidents.is_empty() => {
                info!(path = %path.display(), count = incidents.len(), "loaded crime incidents");
                Self {
                    incidents,
                    hotspots: default_hotspots(),
                    source: path.display().to_string(),
                    fallback: false,
                }
            }
            Ok(_) => {
                warn!(path = %path.display(), "crime data file has no rows, using built-in table");
                Self::built_in_fallback()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "crime data unreadable, using built-in table");
                Self::built_in_fallback()
            }
        }
    }

    /// Parses `id,lat,lng,type,severity,area,incidents_per_month` rows.
    pub fn read_incidents<R: Read>(reader: R) -> Result<Vec<CrimeIncident>, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        reader.deserialize().collect()
    }

    pub fn incidents(&self) -> &[CrimeIncident] {
        &self.incidents
    }

    pub fn hotspots(&self) -> &[Hotspot] {
        &self.hotspots
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Crime picture within `radius_km` of `point`.
    pub fn profile(&self, point: Coordinates, radius_km: f64) -> CrimeProfile {
        let nearby: Vec<&CrimeIncident> = self
            .incidents
            .iter()
            .filter(|incident| haversine_km(point, incident.location()) <= radius_km)
            .collect();

        CrimeProfile {
            area_risk_score: area_crime_risk(&nearby, radius_km),
            risk_factors: crime_risk_factors(&nearby),
            nearby_incidents: nearby
                .into_iter()
                .take(MAX_REPORTED_INCIDENTS)
                .cloned()
                .collect(),
            fallback: self.fallback,
        }
    }
}

impl Default for CrimeDataset {
    fn default() -> Self {
        Self::south_africa()
    }
}

fn area_crime_risk(incidents: &[&CrimeIncident], radius_km: f64) -> f64 {
    if incidents.is_empty() {
        return 10.0;
    }

    let total: u32 = incidents
        .iter()
        .map(|incident| incident.incidents_per_month.max(1))
        .sum();
    let area = std::f64::consts::PI * radius_km * radius_km;
    let mut score = (f64::from(total) / area * 10.0).min(100.0);

    if incidents.iter().any(|incident| incident.severity.is_serious()) {
        score *= 1.5;
    }

    score.min(100.0).round()
}

fn crime_risk_factors(incidents: &[&CrimeIncident]) -> Vec<String> {
    let mut factors = Vec::new();

    if incidents.iter().any(|i| i.kind == CrimeKind::Hijacking) {
        factors.push("Vehicle hijacking incidents reported".to_string());
    }
    if incidents.iter().any(|i| i.kind == CrimeKind::Theft) {
        factors.push("Vehicle theft incidents reported".to_string());
    }
    if incidents.iter().any(|i| i.severity == CrimeSeverity::Critical) {
        factors.push("Critical severity incidents in area".to_string());
    }
    if incidents.iter().filter(|i| i.incidents_per_month > 50).count() > 2 {
        factors.push("High frequency crime area".to_string());
    }

    factors
}

/// 100 minus the mean area risk; higher is safer.
pub fn security_score(profiles: &[CrimeProfile]) -> f64 {
    if profiles.is_empty() {
        return 50.0;
    }
    let average =
        profiles.iter().map(|p| p.area_risk_score).sum::<f64>() / profiles.len() as f64;
    (100.0 - average).round()
}

fn default_incidents() -> Vec<CrimeIncident> {
    use CrimeKind::{Hijacking, Theft};
    use CrimeSeverity::{Critical, High, Medium};

    [
        (1, -26.2041, 28.0473, Theft, High, "Johannesburg CBD", 150),
        (2, -26.1849, 28.0488, Hijacking, Critical, "Hillbrow", 45),
        (3, -26.1009, 28.0963, Theft, High, "Alexandra", 120),
        (4, -26.2678, 27.8546, Theft, Medium, "Soweto", 80),
        (5, -33.9249, 18.4241, Theft, Medium, "Cape Town CBD", 90),
        (6, -34.0299, 18.6248, Hijacking, High, "Cape Flats", 110),
        (7, -34.0364, 18.6248, Theft, High, "Mitchells Plain", 95),
        (8, -29.8587, 31.0218, Theft, Medium, "Durban Central", 70),
        (9, -29.9729, 30.8827, Hijacking, High, "Umlazi", 85),
        (10, -25.7479, 28.2293, Theft, Medium, "Pretoria CBD", 60),
    ]
    .into_iter()
    .map(
        |(id, lat, lng, kind, severity, area, incidents_per_month)| CrimeIncident {
            id,
            lat,
            lng,
            kind,
            severity,
            area: area.to_string(),
            incidents_per_month,
        },
    )
    .collect()
}

fn default_hotspots() -> Vec<Hotspot> {
    vec![
        Hotspot::new("Johannesburg CBD", -26.2041, 28.0473, 85.0),
        Hotspot::new("Hillbrow", -26.1849, 28.0488, 90.0),
        Hotspot::new("Alexandra", -26.1009, 28.0963, 80.0),
        Hotspot::new("Soweto", -26.2678, 27.8546, 70.0),
        Hotspot::new("Cape Flats", -34.0299, 18.6248, 85.0),
        Hotspot::new("Mitchells Plain", -34.0364, 18.6248, 75.0),
        Hotspot::new("Khayelitsha", -34.05, 18.682, 80.0),
        Hotspot::new("Durban Central", -29.8587, 31.0218, 65.0),
        Hotspot::new("Umlazi", -29.9729, 30.8827, 70.0),
        Hotspot::new("Phoenix", -29.7008, 31.0169, 75.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_area_scores_base_risk() {
        let dataset = CrimeDataset::south_africa();
        let profile = dataset.profile(Coordinates::new(-30.0, 24.0), DEFAULT_CRIME_RADIUS_KM);
        assert_eq!(profile.area_risk_score, 10.0);
        assert!(profile.nearby_incidents.is_empty());
        assert!(profile.risk_factors.is_empty());
    }

    #[test]
    fn johannesburg_cbd_profile() {
        let dataset = CrimeDataset::south_africa();
        let profile = dataset.profile(Coordinates::new(-26.2041, 28.0473), DEFAULT_CRIME_RADIUS_KM);

        // CBD and Hillbrow: 195 incidents over 25π km², boosted for severity.
        let expected = ((195.0 / (std::f64::consts::PI * 25.0)) * 10.0 * 1.5_f64)
            .min(100.0)
            .round();
        assert_eq!(profile.area_risk_score, expected);
        assert_eq!(profile.nearby_incidents.len(), 2);
        assert!(profile
            .risk_factors
            .contains(&"Vehicle hijacking incidents reported".to_string()));
        assert!(profile
            .risk_factors
            .contains(&"Critical severity incidents in area".to_string()));
        assert!(!profile
            .risk_factors
            .contains(&"High frequency crime area".to_string()));
    }

    #[test]
    fn security_score_inverts_average_risk() {
        assert_eq!(security_score(&[]), 50.0);
        let profile = |score| CrimeProfile {
            area_risk_score: score,
            nearby_incidents: Vec::new(),
            risk_factors: Vec::new(),
            fallback: false,
        };
        assert_eq!(security_score(&[profile(20.0), profile(40.0)]), 70.0);
    }

    #[test]
    fn loads_incidents_from_csv() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "id,lat,lng,kind,severity,area,incidents_per_month").unwrap();
        writeln!(file, "1,-26.1076,28.0567,hijacking,critical,Sandton,60").unwrap();
        writeln!(file, "2,-26.1080,28.0570,arson,low,Sandton,4").unwrap();

        let dataset = CrimeDataset::load(Some(file.path()));

        assert_eq!(dataset.incidents().len(), 2);
        assert_eq!(dataset.incidents()[0].kind, CrimeKind::Hijacking);
        assert_eq!(dataset.incidents()[1].kind, CrimeKind::Other);
        assert_eq!(dataset.hotspots().len(), 10);
        assert!(!dataset.profile(Coordinates::new(-26.1076, 28.0567), 5.0).fallback);
    }

    #[test]
    fn unreadable_csv_falls_back_to_built_in_table() {
        let dir = tempfile::tempdir().expect("temp dir");
        let dataset = CrimeDataset::load(Some(&dir.path().join("missing.csv")));
        assert_eq!(dataset.incidents().len(), 10);
        assert_eq!(dataset.source(), "built-in");
        let point = Coordinates::new(-26.2041, 28.0473);
        assert!(dataset.profile(point, DEFAULT_CRIME_RADIUS_KM).fallback);
        assert!(!CrimeDataset::south_africa()
            .profile(point, DEFAULT_CRIME_RADIUS_KM)
            .fallback);

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "id,lat,lng,kind,severity,area,incidents_per_month").unwrap();
        writeln!(file, "x,not,a,row,at,all,!").unwrap();
        let garbled = CrimeDataset::load(Some(file.path()));
        assert_eq!(garbled.source(), "built-in");
        assert!(garbled.profile(point, DEFAULT_CRIME_RADIUS_KM).fallback);
    }
}
