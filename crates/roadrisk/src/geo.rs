//! Great-circle helpers shared by the providers, the calculator and the route service.

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Average speed assumption behind the duration estimate (minutes per km).
pub const MINUTES_PER_KM: f64 = 1.2;
/// Same estimate with typical urban congestion.
pub const TRAFFIC_MINUTES_PER_KM: f64 = 1.4;

/// A WGS84 point. Accepts `lng`, `lon` or `longitude` on input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "lon", alias = "longitude")]
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        haversine_km(*self, *other)
    }
}

pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn path_length_km(points: &[Coordinates]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum()
}

/// Picks at most roughly `max` points, keeping the path's final point.
pub fn sample_points(points: &[Coordinates], max: usize) -> Vec<Coordinates> {
    if points.len() <= max || max == 0 {
        return points.to_vec();
    }

    let step = points.len() / max;
    let mut sampled: Vec<Coordinates> = points.iter().step_by(step).copied().collect();

    if let Some(last) = points.last() {
        if sampled.last() != Some(last) {
            sampled.push(*last);
        }
    }

    sampled
}

/// Splits a path into `segments` pieces of equal length and returns the end point of
/// each piece. Zero-length paths collapse to their last point.
pub fn segment_path(points: &[Coordinates], segments: usize) -> Vec<Coordinates> {
    let Some(last) = points.last().copied() else {
        return Vec::new();
    };

    let total = path_length_km(points);
    if segments == 0 || total <= f64::EPSILON {
        return vec![last];
    }

    let step = total / segments as f64;
    let mut output = Vec::with_capacity(segments);
    let mut travelled = 0.0;
    let mut target = step;

    for pair in points.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let leg = haversine_km(from, to);
        while leg > 0.0 && target <= travelled + leg && output.len() + 1 < segments {
            let fraction = (target - travelled) / leg;
            output.push(Coordinates::new(
                from.lat + (to.lat - from.lat) * fraction,
                from.lng + (to.lng - from.lng) * fraction,
            ));
            target += step;
        }
        travelled += leg;
    }

    output.push(last);
    output
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    ShortDistance,
    MediumDistance,
    LongDistance,
}

impl RouteClass {
    pub fn from_distance(distance_km: f64) -> Self {
        if distance_km > 100.0 {
            Self::LongDistance
        } else if distance_km > 30.0 {
            Self::MediumDistance
        } else {
            Self::ShortDistance
        }
    }
}

/// Straight-line estimate between two points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteStatistics {
    pub distance_km: f64,
    pub estimated_minutes: f64,
    pub estimated_minutes_in_traffic: f64,
    pub class: RouteClass,
}

impl RouteStatistics {
    pub fn between(start: Coordinates, end: Coordinates) -> Self {
        let distance_km = start.distance_to(&end);
        Self {
            distance_km,
            estimated_minutes: distance_km * MINUTES_PER_KM,
            estimated_minutes_in_traffic: distance_km * TRAFFIC_MINUTES_PER_KM,
            class: RouteClass::from_distance(distance_km),
        }
    }
}
