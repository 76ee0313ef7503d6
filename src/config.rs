//! Tracker configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Variable names match the ones the
//! deployment already uses (`DB_URL`, `DB_FILE_SERVER_*`).

use std::path::PathBuf;

use crate::error::TrackerError;

/// Top-level tracker configuration.
///
/// Loaded once at startup via [`TrackerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Path of the SQLite database file (e.g. `tmp/temp.db`).
    pub db_path: PathBuf,

    /// Endpoint of a remote-sync store variant, when deployed against one.
    pub sync_url: Option<String>,

    /// Credential for the remote-sync store variant.
    pub sync_auth_token: Option<String>,

    /// Path of the bootstrap SQL script executed once at startup.
    pub schema_path: PathBuf,

    /// Upstream train-position endpoint.
    pub upstream_url: String,

    /// Total timeout for one upstream request, in seconds.
    pub fetch_timeout_secs: u64,

    /// Seconds between ingestion cycles.
    pub poll_interval_secs: u64,

    /// Maximum number of ingestion cycles allowed to run concurrently.
    /// Ticks that arrive while all slots are busy are dropped.
    pub max_overlapping_cycles: usize,

    /// Optional self-termination delay: the process shuts down this many
    /// seconds after start.
    pub shutdown_after_secs: Option<u64>,

    /// Port the database file server binds to (on `0.0.0.0`).
    pub file_server_port: u16,

    /// Basic-auth username for database downloads.
    pub file_server_user: String,

    /// Basic-auth password for database downloads.
    pub file_server_pass: String,

    /// Name of the zip archive the database is served as.
    pub archive_name: String,
}

impl TrackerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Config`] when a value is present but
    /// unusable (zero poll interval or overlap cap).
    pub fn from_env() -> Result<Self, TrackerError> {
        dotenvy::dotenv().ok();

        let config = Self {
            db_path: PathBuf::from(env_or("DB_URL", "tmp/temp.db")),
            sync_url: env_opt("DB_SYNC_URL"),
            sync_auth_token: env_opt("DB_SYNC_AUTH_TOKEN"),
            schema_path: PathBuf::from(env_or("SCHEMA_PATH", "schema.sql")),
            upstream_url: env_or(
                "UPSTREAM_URL",
                "https://vonatinfo.mav-start.hu/map.aspx/getData",
            ),
            fetch_timeout_secs: parse_env("FETCH_TIMEOUT_SECS", 10),
            poll_interval_secs: parse_env("POLL_INTERVAL_SECS", 10),
            max_overlapping_cycles: parse_env("MAX_OVERLAPPING_CYCLES", 2),
            shutdown_after_secs: env_opt("SHUTDOWN_AFTER_SECS"),
            file_server_port: parse_env("DB_FILE_SERVER_PORT", 8000),
            file_server_user: env_or("DB_FILE_SERVER_USER", "admin"),
            file_server_pass: env_or("DB_FILE_SERVER_PASS", "password"),
            archive_name: env_or("DB_FILE_SERVER_ZIPNAME", "database.zip"),
        };

        if config.poll_interval_secs == 0 {
            return Err(TrackerError::Config(
                "POLL_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        if config.max_overlapping_cycles == 0 {
            return Err(TrackerError::Config(
                "MAX_OVERLAPPING_CYCLES must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}

/// Reads an environment variable, falling back to `default` when unset.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Reads an optional environment variable; empty values count as unset.
fn env_opt<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
