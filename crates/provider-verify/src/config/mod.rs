use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
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
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
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

        let pipeline = PipelineConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pipeline,
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

/// Limits governing batch intake and fan-out. The concurrency bounds exist
/// because stage functions call rate-limited external registries.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Largest accepted batch; oversized submissions are rejected outright.
    pub max_batch_size: usize,
    /// Records processed simultaneously within one batch.
    pub max_concurrent_records: usize,
    /// Optional cap across all in-flight batches.
    pub global_max_concurrent: Option<usize>,
    /// Bound on each individual stage call; elapsing counts as a stage
    /// failure for that record.
    pub stage_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 500,
            max_concurrent_records: 8,
            global_max_concurrent: None,
            stage_timeout: Duration::from_millis(10_000),
        }
    }
}

impl PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_batch_size =
            read_limit("APP_MAX_BATCH_SIZE")?.unwrap_or(defaults.max_batch_size);
        let max_concurrent_records =
            read_limit("APP_MAX_CONCURRENT_RECORDS")?.unwrap_or(defaults.max_concurrent_records);
        let global_max_concurrent = read_limit("APP_GLOBAL_MAX_CONCURRENT")?;
        let stage_timeout = read_limit("APP_STAGE_TIMEOUT_MS")?
            .map(|millis| Duration::from_millis(millis as u64))
            .unwrap_or(defaults.stage_timeout);

        Ok(Self {
            max_batch_size,
            max_concurrent_records,
            global_max_concurrent,
            stage_timeout,
        })
    }
}

fn read_limit(name: &'static str) -> Result<Option<usize>, ConfigError> {
    match env::var(name) {
        Ok(raw) => {
            let value = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidLimit { name })?;
            if value == 0 {
                return Err(ConfigError::InvalidLimit { name });
            }
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLimit { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLimit { name } => {
                write!(f, "{name} must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidLimit { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
