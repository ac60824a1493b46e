use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::weather::{
    weather_code_risk, weather_hazard_score, DataSource, ForecastPoint, ReportLocation,
    WeatherConditions, WeatherReport,
};
use super::{ProviderError, WeatherProvider};
use crate::geo::Coordinates;

const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";
const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5";
const FORECAST_POINTS: usize = 8;

/// Upstream weather API and its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeatherApi {
    /// Free, keyless; carries WMO weather codes.
    OpenMeteo,
    OpenWeatherMap { api_key: String },
}

impl WeatherApi {
    /// OpenWeatherMap when a key is configured, Open-Meteo otherwise.
    pub fn from_key(api_key: Option<String>) -> Self {
        match api_key {
            Some(api_key) => Self::OpenWeatherMap { api_key },
            None => Self::OpenMeteo,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpWeatherProvider {
    api: WeatherApi,
    client: reqwest::Client,
}

impl HttpWeatherProvider {
    pub fn new(api: WeatherApi, timeout: StdDuration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProviderError::Client(err.to_string()))?;
        Ok(Self { api, client })
    }

    pub fn api(&self) -> &WeatherApi {
        &self.api
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|err| ProviderError::Parse(err.to_string()))
    }

    async fn fetch_open_meteo(&self, point: Coordinates) -> Result<WeatherReport, ProviderError> {
        let query = [
            ("latitude", format!("{:.6}", point.lat)),
            ("longitude", format!("{:.6}", point.lng)),
            (
                "current",
                "temperature_2m,relative_humidity_2m,apparent_temperature,precipitation,weather_code,\
                 cloud_cover,pressure_msl,wind_speed_10m,wind_direction_10m,visibility"
                    .to_string(),
            ),
            (
                "hourly",
                "temperature_2m,precipitation,precipitation_probability,weather_code,wind_speed_10m"
                    .to_string(),
            ),
            ("forecast_hours", FORECAST_POINTS.to_string()),
            ("timezone", "auto".to_string()),
        ];
        let body: OpenMeteoResponse = self.get_json(OPEN_METEO_URL, &query).await?;
        Ok(open_meteo_report(point, body, Utc::now()))
    }

    async fn fetch_openweathermap(
        &self,
        point: Coordinates,
        api_key: &str,
    ) -> Result<WeatherReport, ProviderError> {
        let query = [
            ("lat", format!("{:.6}", point.lat)),
            ("lon", format!("{:.6}", point.lng)),
            ("appid", api_key.to_string()),
            ("units", "metric".to_string()),
        ];
        let current: OwmCurrent = self
            .get_json(&format!("{OPENWEATHER_URL}/weather"), &query)
            .await?;

        let mut forecast_query = query.to_vec();
        forecast_query.push(("cnt", FORECAST_POINTS.to_string()));
        let forecast = match self
            .get_json::<OwmForecast>(&format!("{OPENWEATHER_URL}/forecast"), &forecast_query)
            .await
        {
            Ok(forecast) => Some(forecast),
            Err(err) => {
                debug!(error = %err, "forecast unavailable, continuing with current conditions");
                None
            }
        };

        Ok(openweathermap_report(point, current, forecast, Utc::now()))
    }
}

impl WeatherProvider for HttpWeatherProvider {
    fn name(&self) -> &'static str {
        match self.api {
            WeatherApi::OpenMeteo => "open-meteo",
            WeatherApi::OpenWeatherMap { .. } => "openweathermap",
        }
    }

    async fn current(&self, point: Coordinates) -> Result<WeatherReport, ProviderError> {
        let result = match &self.api {
            WeatherApi::OpenMeteo => self.fetch_open_meteo(point).await,
            WeatherApi::OpenWeatherMap { api_key } => {
                self.fetch_openweathermap(point, api_key).await
            }
        };
        if let Err(err) = &result {
            warn!(provider = self.name(), lat = point.lat, lng = point.lng, error = %err, "weather lookup failed");
        }
        result
    }
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    current: OpenMeteoCurrent,
    #[serde(default)]
    hourly: Option<OpenMeteoHourly>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoCurrent {
    #[serde(default)]
    temperature_2m: f64,
    #[serde(default)]
    apparent_temperature: Option<f64>,
    #[serde(default)]
    relative_humidity_2m: f64,
    #[serde(default)]
    pressure_msl: Option<f64>,
    #[serde(default)]
    precipitation: f64,
    #[serde(default)]
    weather_code: i32,
    #[serde(default)]
    cloud_cover: f64,
    #[serde(default)]
    wind_speed_10m: f64,
    #[serde(default)]
    wind_direction_10m: f64,
    /// Metres, not offered for every grid cell.
    #[serde(default)]
    visibility: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenMeteoHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<f64>,
    #[serde(default)]
    precipitation: Vec<f64>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<i32>,
    #[serde(default)]
    wind_speed_10m: Vec<f64>,
}

fn open_meteo_report(point: Coordinates, body: OpenMeteoResponse, now: DateTime<Utc>) -> WeatherReport {
    let current = body.current;
    let code = current.weather_code;
    let (condition, description) = describe_weather_code(code);
    let visibility = current
        .visibility
        .map(|metres| metres / 1000.0)
        .unwrap_or_else(|| estimated_visibility_km(code));

    let conditions = WeatherConditions {
        temperature: current.temperature_2m,
        feels_like: current.apparent_temperature.unwrap_or(current.temperature_2m),
        humidity: current.relative_humidity_2m,
        pressure: current.pressure_msl.unwrap_or(1013.0),
        precipitation: current.precipitation,
        wind_speed: current.wind_speed_10m,
        wind_direction: current.wind_direction_10m,
        visibility,
        condition: condition.to_string(),
        description: description.to_string(),
        cloudiness: current.cloud_cover,
        weather_code: Some(code),
    };

    let hourly = body.hourly.unwrap_or_default();
    let forecast = hourly
        .time
        .iter()
        .enumerate()
        .take(FORECAST_POINTS)
        .map(|(i, time)| {
            let code = hourly.weather_code.get(i).copied().unwrap_or(0);
            ForecastPoint {
                datetime: time.clone(),
                temperature: hourly.temperature_2m.get(i).copied().unwrap_or_default(),
                precipitation: hourly.precipitation.get(i).copied().unwrap_or_default(),
                precipitation_probability: hourly
                    .precipitation_probability
                    .get(i)
                    .copied()
                    .flatten(),
                wind_speed: hourly.wind_speed_10m.get(i).copied().unwrap_or_default(),
                weather_condition: describe_weather_code(code).0.to_string(),
                risk_score: weather_code_risk(code),
            }
        })
        .collect();

    let risk_score = weather_hazard_score(&conditions).max(weather_code_risk(code));

    WeatherReport {
        location: ReportLocation::at(point),
        current: conditions,
        forecast,
        alerts: Vec::new(),
        risk_score,
        source: DataSource::OpenMeteo,
        fallback: false,
        timestamp: now,
    }
}

fn describe_weather_code(code: i32) -> (&'static str, &'static str) {
    match code {
        0 => ("Clear", "clear sky"),
        1 => ("Clouds", "mainly clear"),
        2 => ("Clouds", "partly cloudy"),
        3 => ("Clouds", "overcast"),
        45 | 48 => ("Fog", "fog"),
        51..=57 => ("Drizzle", "drizzle"),
        61..=67 => ("Rain", "rain"),
        71..=77 => ("Snow", "snow"),
        80..=82 => ("Rain", "rain showers"),
        85 | 86 => ("Snow", "snow showers"),
        95..=99 => ("Thunderstorm", "thunderstorm"),
        _ => ("Unknown", "unknown conditions"),
    }
}

/// Rough visibility by WMO code, for cells without a visibility reading.
fn estimated_visibility_km(code: i32) -> f64 {
    match code {
        0..=3 => 10.0,
        45..=48 => 1.0,
        51..=55 => 8.0,
        56..=57 => 5.0,
        61..=65 => 6.0,
        66..=67 => 4.0,
        71..=77 => 3.0,
        80..=82 => 5.0,
        85..=86 => 2.0,
        95..=99 => 3.0,
        _ => 10.0,
    }
}

#[derive(Debug, Deserialize)]
struct OwmCurrent {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sys: Option<OwmSys>,
    main: OwmMain,
    #[serde(default)]
    wind: OwmWind,
    /// Metres.
    #[serde(default)]
    visibility: Option<f64>,
    #[serde(default)]
    weather: Vec<OwmWeather>,
    #[serde(default)]
    clouds: OwmClouds,
    #[serde(default)]
    rain: Option<OwmVolume>,
    #[serde(default)]
    snow: Option<OwmVolume>,
}

#[derive(Debug, Deserialize)]
struct OwmSys {
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    pressure: f64,
}

/// Metres per second.
#[derive(Debug, Default, Deserialize)]
struct OwmWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWeather {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwmClouds {
    #[serde(default)]
    all: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwmVolume {
    #[serde(rename = "1h", default)]
    one_hour: Option<f64>,
    #[serde(rename = "3h", default)]
    three_hours: Option<f64>,
}

impl OwmVolume {
    fn amount(volume: &Option<OwmVolume>) -> f64 {
        volume
            .as_ref()
            .and_then(|v| v.one_hour.or(v.three_hours))
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Deserialize)]
struct OwmForecast {
    #[serde(default)]
    list: Vec<OwmForecastItem>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastItem {
    dt_txt: String,
    main: OwmMain,
    #[serde(default)]
    wind: OwmWind,
    #[serde(default)]
    visibility: Option<f64>,
    #[serde(default)]
    weather: Vec<OwmWeather>,
    #[serde(default)]
    pop: Option<f64>,
    #[serde(default)]
    rain: Option<OwmVolume>,
    #[serde(default)]
    snow: Option<OwmVolume>,
}

const MS_TO_KMH: f64 = 3.6;

fn openweathermap_report(
    point: Coordinates,
    current: OwmCurrent,
    forecast: Option<OwmForecast>,
    now: DateTime<Utc>,
) -> WeatherReport {
    let (condition, description) = current
        .weather
        .first()
        .map(|w| (w.main.clone(), w.description.clone()))
        .unwrap_or_else(|| ("Unknown".to_string(), String::new()));

    let conditions = WeatherConditions {
        temperature: current.main.temp,
        feels_like: current.main.feels_like.unwrap_or(current.main.temp),
        humidity: current.main.humidity,
        pressure: current.main.pressure,
        precipitation: OwmVolume::amount(&current.rain) + OwmVolume::amount(&current.snow),
        wind_speed: current.wind.speed * MS_TO_KMH,
        wind_direction: current.wind.deg,
        visibility: current.visibility.map_or(10.0, |metres| metres / 1000.0),
        condition,
        description,
        cloudiness: current.clouds.all,
        weather_code: None,
    };

    let forecast = forecast
        .map(|forecast| {
            forecast
                .list
                .into_iter()
                .take(FORECAST_POINTS)
                .map(|item| {
                    let precipitation =
                        OwmVolume::amount(&item.rain) + OwmVolume::amount(&item.snow);
                    let wind_speed = item.wind.speed * MS_TO_KMH;
                    let weather_condition = item
                        .weather
                        .first()
                        .map(|w| w.main.clone())
                        .unwrap_or_else(|| "Unknown".to_string());
                    let hazard = weather_hazard_score(&WeatherConditions {
                        temperature: item.main.temp,
                        feels_like: item.main.feels_like.unwrap_or(item.main.temp),
                        humidity: item.main.humidity,
                        pressure: item.main.pressure,
                        precipitation,
                        wind_speed,
                        wind_direction: item.wind.deg,
                        visibility: item.visibility.map_or(10.0, |metres| metres / 1000.0),
                        condition: weather_condition.clone(),
                        description: String::new(),
                        cloudiness: 0.0,
                        weather_code: None,
                    });
                    ForecastPoint {
                        datetime: item.dt_txt,
                        temperature: item.main.temp,
                        precipitation,
                        precipitation_probability: item.pop.map(|p| p * 100.0),
                        wind_speed,
                        weather_condition,
                        risk_score: hazard,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let risk_score = weather_hazard_score(&conditions);

    WeatherReport {
        location: ReportLocation {
            lat: point.lat,
            lng: point.lng,
            name: current.name,
            country: current.sys.and_then(|sys| sys.country),
        },
        current: conditions,
        forecast,
        alerts: Vec::new(),
        risk_score,
        source: DataSource::OpenWeatherMap,
        fallback: false,
        timestamp: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn open_meteo_risk_takes_the_worse_of_code_and_hazard() {
        let body: OpenMeteoResponse = serde_json::from_value(json!({
            "current": {
                "temperature_2m": 14.2,
                "relative_humidity_2m": 88.0,
                "precipitation": 12.5,
                "weather_code": 63,
                "cloud_cover": 100.0,
                "wind_speed_10m": 22.0,
                "wind_direction_10m": 270.0
            },
            "hourly": {
                "time": ["2025-06-01T10:00", "2025-06-01T11:00"],
                "temperature_2m": [14.0, 13.5],
                "precipitation": [8.0, 2.0],
                "precipitation_probability": [90.0, null],
                "weather_code": [63, 3],
                "wind_speed_10m": [20.0, 18.0]
            }
        }))
        .unwrap();

        let report = open_meteo_report(Coordinates::new(-33.92, 18.42), body, now());

        assert_eq!(report.source, DataSource::OpenMeteo);
        assert!(!report.fallback);
        assert_eq!(report.current.condition, "Rain");
        assert_eq!(report.current.visibility, 6.0);
        // Code 63 is worth 60; precipitation above 10 mm alone is 25.
        assert_eq!(report.risk_score, 60.0);
        assert_eq!(report.forecast.len(), 2);
        assert_eq!(report.forecast[1].precipitation_probability, None);
        assert_eq!(report.forecast[1].risk_score, 25.0);
    }

    #[test]
    fn openweathermap_converts_units_and_sums_precipitation() {
        let current: OwmCurrent = serde_json::from_value(json!({
            "name": "Durban",
            "sys": { "country": "ZA" },
            "main": { "temp": 24.0, "feels_like": 26.0, "humidity": 80.0, "pressure": 1009.0 },
            "wind": { "speed": 12.5, "deg": 90.0 },
            "visibility": 2500.0,
            "weather": [{ "main": "Rain", "description": "moderate rain" }],
            "clouds": { "all": 75.0 },
            "rain": { "1h": 4.0 },
            "snow": { "3h": 1.0 }
        }))
        .unwrap();

        let report = openweathermap_report(Coordinates::new(-29.85, 31.02), current, None, now());

        assert_eq!(report.current.wind_speed, 45.0);
        assert_eq!(report.current.visibility, 2.5);
        assert_eq!(report.current.precipitation, 5.0);
        assert_eq!(report.location.name.as_deref(), Some("Durban"));
        // rain > 2 mm, wind > 40 km/h, visibility < 3 km
        assert_eq!(report.risk_score, 10.0 + 20.0 + 25.0);
        assert!(report.forecast.is_empty());
    }

    #[test]
    fn openweathermap_forecast_is_capped() {
        let item = json!({
            "dt_txt": "2025-06-01 09:00:00",
            "main": { "temp": 20.0, "humidity": 50.0, "pressure": 1015.0 },
            "wind": { "speed": 2.0, "deg": 10.0 },
            "weather": [{ "main": "Clear" }]
        });
        let forecast: OwmForecast =
            serde_json::from_value(json!({ "list": vec![item; 12] })).unwrap();
        let current: OwmCurrent =
            serde_json::from_value(json!({ "main": { "temp": 20.0 } })).unwrap();

        let report =
            openweathermap_report(Coordinates::new(-26.2, 28.0), current, Some(forecast), now());
        assert_eq!(report.forecast.len(), FORECAST_POINTS);
        assert_eq!(report.current.condition, "Unknown");
    }

    #[test]
    fn api_choice_follows_key_presence() {
        assert_eq!(WeatherApi::from_key(None), WeatherApi::OpenMeteo);
        assert_eq!(
            WeatherApi::from_key(Some("k".into())),
            WeatherApi::OpenWeatherMap { api_key: "k".into() }
        );
    }
}
