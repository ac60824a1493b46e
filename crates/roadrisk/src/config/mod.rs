use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub weather: WeatherConfig,
    pub cache: CacheConfig,
    pub risk: RiskConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let ansi = env::var("APP_LOG_ANSI")
            .map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let openweather_api_key = env::var("OPENWEATHER_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        let timeout_secs = read_number("WEATHER_API_TIMEOUT_SECS", 10)?;

        let backend = match env::var("WEATHER_CACHE_BACKEND") {
            Ok(raw) => CacheBackend::parse(&raw).ok_or(ConfigError::InvalidCacheBackend(raw))?,
            Err(_) => CacheBackend::Memory,
        };
        let cache_dir = env::var("WEATHER_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".cache/weather"));
        let weather_ttl_secs = read_number("WEATHER_CACHE_TTL_SECS", 600)?;

        let route_validity_hours = read_number("ROUTE_RISK_VALIDITY_HOURS", 6)?;
        let crime_data_path = env::var("CRIME_DATA_PATH").ok().map(PathBuf::from);

        let window_secs = read_number("RATE_LIMIT_WINDOW_SECS", 900)?;
        let max_requests = read_number("RATE_LIMIT_MAX_REQUESTS", 30)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, ansi },
            weather: WeatherConfig {
                openweather_api_key,
                timeout_secs,
            },
            cache: CacheConfig {
                backend,
                dir: cache_dir,
                weather_ttl_secs,
            },
            risk: RiskConfig {
                route_validity_hours,
                crime_data_path,
            },
            rate_limit: RateLimitConfig {
                window_secs,
                max_requests: max_requests as u32,
            },
        })
    }
}

fn read_number(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Colour escape codes in log lines, off by default for log collectors.
    pub ansi: bool,
}

/// Upstream weather API selection. OpenWeatherMap is used when a key is present.
#[derive(Debug, Clone, Default)]
pub struct WeatherConfig {
    pub openweather_api_key: Option<String>,
    pub timeout_secs: u64,
}

impl WeatherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    File,
}

impl CacheBackend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Some(Self::Memory),
            "file" | "disk" => Some(Self::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub dir: PathBuf,
    pub weather_ttl_secs: u64,
}

impl CacheConfig {
    pub fn weather_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.weather_ttl_secs as i64)
    }
}

#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub route_validity_hours: u64,
    pub crime_data_path: Option<PathBuf>,
}

impl RiskConfig {
    pub fn route_validity(&self) -> chrono::Duration {
        chrono::Duration::hours(self.route_validity_hours as i64)
    }
}

/// Fixed-window request limits applied per client and route group.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 900,
            max_requests: 30,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str, value: String },
    InvalidCacheBackend(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be a non-negative integer (got '{value}')")
            }
            ConfigError::InvalidCacheBackend(value) => {
                write!(
                    f,
                    "WEATHER_CACHE_BACKEND must be 'memory' or 'file' (got '{value}')"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidCacheBackend(_) => None,
        }
    }
}
