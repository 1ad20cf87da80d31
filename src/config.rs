//! Server configuration from environment variables

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_GRPC_PORT: u16 = 44044;
pub const DEFAULT_GRPC_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_DATA_CORRUPT: f64 = 10.0;
pub const DEFAULT_DB_PATH: &str = "dashboards.db";
pub const DEFAULT_DB_MAX_IDLE: usize = 4;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue {
        variable: &'static str,
        value: String,
        reason: String,
    },
    File {
        path: PathBuf,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue {
                variable,
                value,
                reason,
            } => write!(f, "invalid value for {}: {:?} ({})", variable, value, reason),
            ConfigError::File { path, reason } => {
                write!(f, "unable to load env file {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the dashboards server
///
/// Loaded from environment variables with defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Debug-level default log filter
    pub debug: bool,

    pub grpc_port: u16,

    /// Applied to every RPC
    pub grpc_timeout: Duration,

    /// Maximum tolerated share of corrupt rows, in percent
    pub max_data_corrupt: f64,

    pub db_path: String,
    pub ohlcv_table: String,

    /// Idle read-only connections kept by the store
    pub db_max_idle: usize,

    /// Run sql/schema migrations before serving
    pub run_migrations: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            debug: false,
            grpc_port: DEFAULT_GRPC_PORT,
            grpc_timeout: DEFAULT_GRPC_TIMEOUT,
            max_data_corrupt: DEFAULT_MAX_DATA_CORRUPT,
            db_path: DEFAULT_DB_PATH.to_string(),
            ohlcv_table: crate::query::DEFAULT_TABLE.to_string(),
            db_max_idle: DEFAULT_DB_MAX_IDLE,
            run_migrations: false,
        }
    }
}

impl ServerConfig {
    /// Load `.env` (or the file passed with `-f <path>`), then read the environment
    pub fn load() -> Result<Self, ConfigError> {
        match Self::env_file_from_args() {
            Some(path) => {
                dotenv::from_path(&path).map_err(|e| ConfigError::File {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            }
            None => {
                dotenv::dotenv().ok();
            }
        }

        Self::from_env()
    }

    /// Parse `-f <path>` from command line arguments
    pub fn env_file_from_args() -> Option<PathBuf> {
        let args: Vec<String> = env::args().collect();
        args.iter()
            .position(|arg| arg == "-f")
            .and_then(|idx| args.get(idx + 1))
            .map(PathBuf::from)
    }

    /// Environment variables:
    /// - `DASHBOARDS_DEBUG` (default: false)
    /// - `DASHBOARDS_GRPC_PORT` (default: 44044), overridden by `PORT`
    /// - `DASHBOARDS_GRPC_TIMEOUT` (default: 5s)
    /// - `DASHBOARDS_MAX_DATA_CORRUPT` (default: 10)
    /// - `DASHBOARDS_DB_PATH` (default: dashboards.db)
    /// - `DASHBOARDS_OHLCV_TABLE` (default: ohlcv_hourly)
    /// - `DASHBOARDS_DB_MAX_IDLE` (default: 4)
    /// - `DASHBOARDS_RUN_MIGRATIONS` (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let grpc_port = match lookup("PORT") {
            Some(port) => parse_var("PORT", port)?,
            None => parse_or("DASHBOARDS_GRPC_PORT", &lookup, defaults.grpc_port)?,
        };

        let grpc_timeout = match lookup("DASHBOARDS_GRPC_TIMEOUT") {
            Some(raw) => parse_duration(&raw).ok_or_else(|| ConfigError::InvalidValue {
                variable: "DASHBOARDS_GRPC_TIMEOUT",
                value: raw.clone(),
                reason: "expected a duration like 500ms, 5s or 1m".to_string(),
            })?,
            None => defaults.grpc_timeout,
        };

        let max_data_corrupt: f64 =
            parse_or("DASHBOARDS_MAX_DATA_CORRUPT", &lookup, defaults.max_data_corrupt)?;
        if !(0.0..=100.0).contains(&max_data_corrupt) {
            return Err(ConfigError::InvalidValue {
                variable: "DASHBOARDS_MAX_DATA_CORRUPT",
                value: max_data_corrupt.to_string(),
                reason: "expected a percentage between 0 and 100".to_string(),
            });
        }

        Ok(Self {
            debug: parse_or("DASHBOARDS_DEBUG", &lookup, defaults.debug)?,
            grpc_port,
            grpc_timeout,
            max_data_corrupt,
            db_path: lookup("DASHBOARDS_DB_PATH").unwrap_or(defaults.db_path),
            ohlcv_table: lookup("DASHBOARDS_OHLCV_TABLE").unwrap_or(defaults.ohlcv_table),
            db_max_idle: parse_or("DASHBOARDS_DB_MAX_IDLE", &lookup, defaults.db_max_idle)?,
            run_migrations: parse_or(
                "DASHBOARDS_RUN_MIGRATIONS",
                &lookup,
                defaults.run_migrations,
            )?,
        })
    }
}

fn parse_var<T>(variable: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            variable,
            reason: e.to_string(),
            value: raw,
        })
}

fn parse_or<T, F>(variable: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(variable) {
        Some(raw) => parse_var(variable, raw),
        None => Ok(default),
    }
}

/// Parse `500ms`, `5s`, `2m` or a bare number of seconds
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Some(ms) = raw.strip_suffix("ms") {
        return ms.trim().parse().ok().map(Duration::from_millis);
    }
    if let Some(secs) = raw.strip_suffix('s') {
        return secs.trim().parse().ok().map(Duration::from_secs);
    }
    if let Some(mins) = raw.strip_suffix('m') {
        return mins
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs);
    }
    raw.parse().ok().map(Duration::from_secs)
}
