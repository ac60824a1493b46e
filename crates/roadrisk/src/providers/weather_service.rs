use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::weather::{
    daily_predictions, generate_weather_alerts, weather_hazard_score, DailyPrediction,
    WeatherConditions, WeatherReport,
};
use super::WeatherProvider;
use crate::cache::{self, CacheStore, Clock, SystemClock};
use crate::geo::{sample_points, Coordinates};
use crate::scoring::RiskLevel;

/// Sampling density for route weather; see [`sample_points`].
pub const MAX_ROUTE_SAMPLES: usize = 10;

/// Cached, fail-safe front for a [`WeatherProvider`].
pub struct WeatherService<P> {
    provider: Arc<P>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<P> Clone for WeatherService<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            cache: Arc::clone(&self.cache),
            ttl: self.ttl,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<P> WeatherService<P>
where
    P: WeatherProvider,
{
    pub fn new(provider: Arc<P>, cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            provider,
            cache,
            ttl,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn cache_key(point: Coordinates) -> String {
        format!("weather_{:.4}_{:.4}", point.lat, point.lng)
    }

    /// Current report for `point`. Never fails: provider errors produce the
    /// fallback report, which is not cached.
    pub async fn weather(&self, point: Coordinates, include_alerts: bool) -> WeatherReport {
        let key = Self::cache_key(point);

        let mut report = match cache::load::<WeatherReport>(self.cache.as_ref(), &key) {
            Some(report) => {
                debug!(%key, "weather cache hit");
                report
            }
            None => match self.provider.current(point).await {
                Ok(mut report) => {
                    report.alerts = generate_weather_alerts(&report.current);
                    cache::store(self.cache.as_ref(), &key, &report, self.ttl);
                    report
                }
                Err(err) => {
                    warn!(provider = self.provider.name(), %key, error = %err, "using fallback weather");
                    WeatherReport::fallback(point, self.clock.now())
                }
            },
        };

        if !include_alerts {
            report.alerts.clear();
        }
        report
    }

    /// Weather along a path, thinned to roughly [`MAX_ROUTE_SAMPLES`] points and
    /// fetched concurrently.
    pub async fn route_weather(&self, path: &[Coordinates]) -> RouteWeather {
        let points = sample_points(path, MAX_ROUTE_SAMPLES);
        let reports = join_all(points.iter().map(|point| self.weather(*point, false))).await;
        RouteWeather::from_reports(reports)
    }

    /// Current report for `point` plus a `days`-long outlook starting tomorrow.
    pub async fn predictions(
        &self,
        point: Coordinates,
        today: NaiveDate,
        days: u32,
    ) -> (WeatherReport, Vec<DailyPrediction>) {
        let report = self.weather(point, true).await;
        let outlook = daily_predictions(&report, today, days);
        (report, outlook)
    }
}

/// Per-point reports plus their summary. `aggregate` and `assessment` are absent
/// for an empty path. Both summaries score points with [`weather_hazard_score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteWeather {
    pub points: Vec<WeatherReport>,
    pub aggregate: Option<WeatherAggregate>,
    pub assessment: Option<RouteWeatherAssessment>,
}

impl RouteWeather {
    pub fn from_reports(points: Vec<WeatherReport>) -> Self {
        let aggregate = WeatherAggregate::from_reports(&points);
        let assessment = RouteWeatherAssessment::from_reports(&points);
        Self {
            points,
            aggregate,
            assessment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherAggregate {
    pub max_temperature: f64,
    pub min_temperature: f64,
    pub max_precipitation: f64,
    pub max_wind_speed: f64,
    pub average_wind_speed: f64,
    pub max_humidity: f64,
    pub min_visibility: f64,
    pub dominant_condition: String,
    pub average_risk_score: f64,
}

impl WeatherAggregate {
    pub fn from_reports(reports: &[WeatherReport]) -> Option<Self> {
        let first = reports.first()?;
        let count = reports.len() as f64;

        let mut aggregate = Self {
            max_temperature: first.current.temperature,
            min_temperature: first.current.temperature,
            max_precipitation: first.current.precipitation,
            max_wind_speed: first.current.wind_speed,
            average_wind_speed: 0.0,
            max_humidity: first.current.humidity,
            min_visibility: first.current.visibility,
            dominant_condition: dominant_condition(reports),
            average_risk_score: 0.0,
        };

        for report in reports {
            let current = &report.current;
            aggregate.max_temperature = aggregate.max_temperature.max(current.temperature);
            aggregate.min_temperature = aggregate.min_temperature.min(current.temperature);
            aggregate.max_precipitation = aggregate.max_precipitation.max(current.precipitation);
            aggregate.max_wind_speed = aggregate.max_wind_speed.max(current.wind_speed);
            aggregate.max_humidity = aggregate.max_humidity.max(current.humidity);
            aggregate.min_visibility = aggregate.min_visibility.min(current.visibility);
            aggregate.average_wind_speed += current.wind_speed / count;
            aggregate.average_risk_score += weather_hazard_score(current) / count;
        }

        Some(aggregate)
    }

    /// Worst observed value of each reading, shaped as one set of conditions for
    /// the calculator. The hotter extreme is used only when it reaches 35 C.
    pub fn worst_case_conditions(&self) -> WeatherConditions {
        let temperature = if self.max_temperature >= 35.0 {
            self.max_temperature
        } else {
            self.min_temperature
        };
        WeatherConditions {
            temperature,
            feels_like: temperature,
            humidity: self.max_humidity,
            pressure: 1013.0,
            precipitation: self.max_precipitation,
            wind_speed: self.max_wind_speed,
            wind_direction: 0.0,
            visibility: self.min_visibility,
            condition: self.dominant_condition.clone(),
            description: self.dominant_condition.to_lowercase(),
            cloudiness: 0.0,
            weather_code: None,
        }
    }
}

/// Most frequent condition label; ties go to the one seen first.
fn dominant_condition(reports: &[WeatherReport]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for report in reports {
        let label = report.current.condition.as_str();
        match counts.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, count)) => *count += 1,
            None => counts.push((label, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (label, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((label, count));
        }
    }
    best.map(|(label, _)| label.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteWeatherAssessment {
    pub max_risk: f64,
    pub average_risk: f64,
    pub risk_level: RiskLevel,
    pub high_risk_points: Vec<usize>,
}

impl RouteWeatherAssessment {
    pub fn from_reports(reports: &[WeatherReport]) -> Option<Self> {
        if reports.is_empty() {
            return None;
        }
        let scores: Vec<f64> = reports
            .iter()
            .map(|report| weather_hazard_score(&report.current))
            .collect();
        let max_risk = scores.iter().copied().fold(0.0_f64, f64::max);
        let average_risk = scores.iter().sum::<f64>() / scores.len() as f64;

        let risk_level = if max_risk > 70.0 {
            RiskLevel::Critical
        } else if max_risk > 50.0 {
            RiskLevel::High
        } else if max_risk > 25.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let high_risk_points = scores
            .iter()
            .enumerate()
            .filter(|(_, score)| **score > 50.0)
            .map(|(index, _)| index)
            .collect();

        Some(Self {
            max_risk,
            average_risk,
            risk_level,
            high_risk_points,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::cache::{ManualClock, MemoryCache};
    use crate::providers::ProviderError;

    struct ScriptedProvider {
        calls: AtomicUsize,
        fail: bool,
        precipitation: f64,
    }

    impl ScriptedProvider {
        fn healthy(precipitation: f64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                precipitation,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
                precipitation: 0.0,
            }
        }
    }

    impl WeatherProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn current(&self, point: Coordinates) -> Result<WeatherReport, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::Request("offline".into()));
            }
            let mut report = WeatherReport::fallback(point, Utc::now());
            report.fallback = false;
            report.source = crate::providers::DataSource::OpenMeteo;
            report.current.precipitation = self.precipitation;
            report.current.condition = "Rain".into();
            report.risk_score = 60.0;
            Ok(report)
        }
    }

    fn service(provider: ScriptedProvider, clock: &ManualClock) -> WeatherService<ScriptedProvider> {
        let clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let cache = Arc::new(MemoryCache::with_clock(Arc::clone(&clock)));
        WeatherService::new(Arc::new(provider), cache, Duration::minutes(10)).with_clock(clock)
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn second_lookup_within_ttl_is_served_from_cache() {
        let clock = clock();
        let weather = service(ScriptedProvider::healthy(25.0), &clock);
        let point = Coordinates::new(-26.2041, 28.0473);

        let first = weather.weather(point, true).await;
        let second = weather.weather(point, true).await;

        assert_eq!(weather.provider().calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(first.alerts.len(), 1, "heavy rain alert attached on fetch");

        clock.advance(Duration::minutes(11));
        weather.weather(point, true).await;
        assert_eq!(weather.provider().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn alerts_are_stripped_when_not_requested() {
        let clock = clock();
        let weather = service(ScriptedProvider::healthy(25.0), &clock);
        let report = weather.weather(Coordinates::new(-26.2, 28.0), false).await;
        assert!(report.alerts.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_yields_uncached_fallback() {
        let clock = clock();
        let weather = service(ScriptedProvider::failing(), &clock);
        let point = Coordinates::new(-33.9249, 18.4241);

        let report = weather.weather(point, true).await;
        assert!(report.fallback);
        assert_eq!(report.risk_score, 25.0);

        weather.weather(point, true).await;
        assert_eq!(
            weather.provider().calls.load(Ordering::SeqCst),
            2,
            "fallback must not be cached"
        );
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("log buffer poisoned").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn fallback_is_logged_as_warning() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let clock = clock();
        let weather = service(ScriptedProvider::failing(), &clock);
        weather.weather(Coordinates::new(-29.8587, 31.0218), false).await;

        let output = String::from_utf8(logs.0.lock().expect("log buffer poisoned").clone())
            .expect("utf8 log output");
        assert!(output.contains("WARN"), "got {output}");
        assert!(output.contains("using fallback weather"));
    }

    #[test]
    fn cache_key_uses_four_decimals() {
        let key = WeatherService::<ScriptedProvider>::cache_key(Coordinates::new(-26.20412, 28.0473));
        assert_eq!(key, "weather_-26.2041_28.0473");
    }

    #[tokio::test]
    async fn route_weather_thins_long_paths() {
        let clock = clock();
        let weather = service(ScriptedProvider::healthy(25.0), &clock);
        let path: Vec<Coordinates> = (0..25)
            .map(|i| Coordinates::new(-26.0 - f64::from(i) * 0.01, 28.0))
            .collect();

        let route = weather.route_weather(&path).await;

        assert_eq!(route.points.len(), sample_points(&path, MAX_ROUTE_SAMPLES).len());
        assert!(route.points.len() < path.len());
        assert!(route
            .points
            .iter()
            .all(|report| report.current.precipitation > 10.0));
        let assessment = route.assessment.as_ref().expect("assessment");
        // 25 mm of rain alone scores 40 on the hazard scale.
        assert_eq!(assessment.max_risk, 40.0);
        assert_eq!(assessment.risk_level, RiskLevel::Medium);
        assert!(assessment.high_risk_points.is_empty());
    }

    #[tokio::test]
    async fn empty_route_has_no_summary() {
        let clock = clock();
        let weather = service(ScriptedProvider::healthy(0.0), &clock);
        let route = weather.route_weather(&[]).await;
        assert!(route.points.is_empty());
        assert!(route.aggregate.is_none());
        assert!(route.assessment.is_none());
    }

    #[test]
    fn dominant_condition_prefers_first_seen_on_ties() {
        let now = Utc::now();
        let mut reports = Vec::new();
        for label in ["Clouds", "Rain", "Rain", "Clouds"] {
            let mut report = WeatherReport::fallback(Coordinates::new(0.0, 0.0), now);
            report.current.condition = label.to_string();
            reports.push(report);
        }
        let aggregate = WeatherAggregate::from_reports(&reports).unwrap();
        assert_eq!(aggregate.dominant_condition, "Clouds");
    }
}
