use crate::screening::classifier::OperatingThreshold;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CACHE_CAPACITY: usize = 5000;
const DEFAULT_SCORER_TIMEOUT_MS: u64 = 2000;

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
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub screening: ScreeningConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            screening: ScreeningConfig::from_env()?,
        })
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
}

/// Pipeline settings fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct ScreeningConfig {
    pub threshold: OperatingThreshold,
    pub cache_capacity: usize,
    pub artifact_dir: PathBuf,
    pub forms_csv: PathBuf,
    /// `None` lets the scorer run without a deadline.
    pub scorer_timeout: Option<Duration>,
    pub access_token: Option<String>,
    pub public_url: String,
}

impl ScreeningConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let threshold = parse_threshold(
            &env::var("SCREEN_THRESHOLD").unwrap_or_else(|_| "0.5".to_string()),
        )?;
        let cache_capacity = parse_cache_capacity(env::var("SCREEN_CACHE_CAPACITY").ok())?;

        let timeout_ms = match env::var("SCREEN_SCORER_TIMEOUT_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidScorerTimeout(raw))?,
            Err(_) => DEFAULT_SCORER_TIMEOUT_MS,
        };
        let scorer_timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));

        let access_token = env::var("SCREEN_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        Ok(Self {
            threshold,
            cache_capacity,
            artifact_dir: env::var("SCREEN_ARTIFACT_DIR")
                .unwrap_or_else(|_| "artifacts".to_string())
                .into(),
            forms_csv: env::var("SCREEN_FORMS_CSV")
                .unwrap_or_else(|_| "forms.csv".to_string())
                .into(),
            scorer_timeout,
            access_token,
            public_url: env::var("SCREEN_PUBLIC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

fn parse_threshold(raw: &str) -> Result<OperatingThreshold, ConfigError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidThreshold(raw.to_string()))?;
    OperatingThreshold::from_value(value).ok_or(ConfigError::UnsupportedThreshold(value))
}

fn parse_cache_capacity(raw: Option<String>) -> Result<usize, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_CACHE_CAPACITY);
    };
    match raw.trim().parse::<usize>() {
        Ok(capacity) if capacity > 0 => Ok(capacity),
        _ => Err(ConfigError::InvalidCacheCapacity(raw)),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidThreshold(String),
    UnsupportedThreshold(f64),
    InvalidCacheCapacity(String),
    InvalidScorerTimeout(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidThreshold(raw) => {
                write!(f, "SCREEN_THRESHOLD '{raw}' is not a number")
            }
            ConfigError::UnsupportedThreshold(value) => write!(
                f,
                "SCREEN_THRESHOLD {value} has no banding table (supported: {})",
                OperatingThreshold::supported_values()
                    .iter()
                    .map(|value| value.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ConfigError::InvalidCacheCapacity(raw) => {
                write!(f, "SCREEN_CACHE_CAPACITY '{raw}' must be a positive integer")
            }
            ConfigError::InvalidScorerTimeout(raw) => {
                write!(f, "SCREEN_SCORER_TIMEOUT_MS '{raw}' must be milliseconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "SCREEN_THRESHOLD",
            "SCREEN_CACHE_CAPACITY",
            "SCREEN_ARTIFACT_DIR",
            "SCREEN_FORMS_CSV",
            "SCREEN_SCORER_TIMEOUT_MS",
            "SCREEN_ACCESS_TOKEN",
            "SCREEN_PUBLIC_URL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.screening.threshold, OperatingThreshold::Half);
        assert_eq!(config.screening.cache_capacity, 5000);
        assert_eq!(
            config.screening.scorer_timeout,
            Some(Duration::from_millis(2000))
        );
        assert!(config.screening.access_token.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn rejects_threshold_without_banding_table() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SCREEN_THRESHOLD", "0.6");
        match AppConfig::load() {
            Err(ConfigError::UnsupportedThreshold(value)) => assert_eq!(value, 0.6),
            other => panic!("expected unsupported threshold, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn accepts_each_supported_threshold() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        for (raw, expected) in [
            ("0.5", OperatingThreshold::Half),
            ("0.45", OperatingThreshold::FortyFive),
            (" 0.40 ", OperatingThreshold::Forty),
        ] {
            env::set_var("SCREEN_THRESHOLD", raw);
            let config = AppConfig::load().expect("supported threshold loads");
            assert_eq!(config.screening.threshold, expected);
        }
        reset_env();
    }

    #[test]
    fn rejects_zero_cache_capacity() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SCREEN_CACHE_CAPACITY", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidCacheCapacity(_))
        ));
        reset_env();
    }

    #[test]
    fn zero_timeout_disables_scorer_deadline() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SCREEN_SCORER_TIMEOUT_MS", "0");
        env::set_var("SCREEN_PUBLIC_URL", "https://screen.example.org/");
        let config = AppConfig::load().expect("config loads");
        assert!(config.screening.scorer_timeout.is_none());
        assert_eq!(config.screening.public_url, "https://screen.example.org");
        reset_env();
    }
}
