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
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
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

        let data_dir = PathBuf::from(
            env::var("SCORECARD_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
        );
        let storage = StorageConfig {
            weights_file: path_var("SCORECARD_WEIGHTS_FILE")
                .unwrap_or_else(|| data_dir.join("scoring_weights.json")),
            weights_table: path_var("SCORECARD_WEIGHTS_TABLE")
                .unwrap_or_else(|| data_dir.join("scorecard_variables.csv")),
            history_file: path_var("SCORECARD_HISTORY_FILE")
                .unwrap_or_else(|| data_dir.join("config_history.json")),
            history_depth: parse_var("SCORECARD_HISTORY_DEPTH", 3)?,
            sync_state_file: path_var("SCORECARD_SYNC_STATE_FILE")
                .unwrap_or_else(|| data_dir.join("sync_state.json")),
            data_dir,
        };
        if storage.history_depth == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "SCORECARD_HISTORY_DEPTH",
                value: "0".to_string(),
            });
        }

        let max_attempts: u32 = parse_var("SYNC_MAX_ATTEMPTS", 3)?;
        let backoff_ms: u64 = parse_var("SYNC_RETRY_BACKOFF_MS", 50)?;
        let sync = SyncConfig {
            max_attempts: max_attempts.max(1),
            retry_backoff: Duration::from_millis(backoff_ms),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage,
            sync,
        })
    }
}

fn path_var(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
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
}

/// Locations of the weight stores and the configuration history.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub weights_file: PathBuf,
    pub weights_table: PathBuf,
    pub history_file: PathBuf,
    pub history_depth: usize,
    /// Last known store agreement, kept across restarts.
    pub sync_state_file: PathBuf,
}

impl StorageConfig {
    /// Default file names under `data_dir`, keeping three history entries.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            weights_file: data_dir.join("scoring_weights.json"),
            weights_table: data_dir.join("scorecard_variables.csv"),
            history_file: data_dir.join("config_history.json"),
            history_depth: 3,
            sync_state_file: data_dir.join("sync_state.json"),
            data_dir,
        }
    }
}

/// Retry budget applied to every store operation during synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a positive number (found '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
