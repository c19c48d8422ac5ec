/// Configuration management for Leaderboard Service
///
/// Loads configuration from environment variables (a `.env` file is honoured in `main`).
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::providers::neynar::NEYNAR_BASE_URL;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Social-graph provider configuration
    pub provider: ProviderConfig,
    /// Job configuration
    pub jobs: JobsConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port
    pub http_port: u16,
    /// Emit JSON logs
    pub json_logs: bool,
}

/// Database configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
    /// Min connections in pool
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
    /// Seconds an idle connection is kept
    pub idle_timeout_secs: u64,
    /// Seconds before a connection is recycled
    pub max_lifetime_secs: u64,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .finish()
    }
}

/// Social-graph provider (Neynar) configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Ingestion and retention settings
#[derive(Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Shared secret expected in the `secret` query parameter of job triggers.
    /// When unset every trigger is rejected.
    pub cron_secret: Option<String>,
    /// Number of users fetched per ingestion run
    pub top_n: usize,
    /// Rows older than this many days are swept
    pub retention_days: i64,
}

impl std::fmt::Debug for JobsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobsConfig")
            .field("cron_secret", &self.cron_secret.as_ref().map(|_| "[REDACTED]"))
            .field("top_n", &self.top_n)
            .field("retention_days", &self.retention_days)
            .finish()
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            cron_secret: None,
            top_n: default_top_n(),
            retention_days: default_retention_days(),
        }
    }
}

// Default values
fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_top_n() -> usize {
    50
}

fn default_retention_days() -> i64 {
    7
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: parse_env("PORT").unwrap_or(8080),
            json_logs: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable not set")?,
            max_connections: parse_env("DB_MAX_CONNECTIONS")
                .unwrap_or_else(default_max_connections),
            min_connections: parse_env("DB_MIN_CONNECTIONS")
                .unwrap_or_else(default_min_connections),
            acquire_timeout_secs: parse_env("DB_ACQUIRE_TIMEOUT_SECS").unwrap_or(10),
            idle_timeout_secs: parse_env("DB_IDLE_TIMEOUT_SECS").unwrap_or(600),
            max_lifetime_secs: parse_env("DB_MAX_LIFETIME_SECS").unwrap_or(1800),
        };

        let provider = ProviderConfig {
            api_key: std::env::var("NEYNAR_API_KEY")
                .context("NEYNAR_API_KEY environment variable not set")?,
            base_url: std::env::var("NEYNAR_BASE_URL")
                .unwrap_or_else(|_| NEYNAR_BASE_URL.to_string()),
            request_timeout_secs: parse_env("NEYNAR_TIMEOUT_SECS").unwrap_or(15),
        };

        let jobs = JobsConfig {
            cron_secret: std::env::var("CRON_SECRET").ok().filter(|s| !s.is_empty()),
            top_n: parse_env("INGEST_TOP_N").unwrap_or_else(default_top_n),
            retention_days: parse_env("RETENTION_DAYS").unwrap_or_else(default_retention_days),
        };

        Ok(Config {
            app,
            database,
            provider,
            jobs,
        })
    }

    /// Reject values that would make the service misbehave at runtime
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            bail!("DB_MAX_CONNECTIONS must be greater than 0");
        }
        if self.database.min_connections > self.database.max_connections {
            bail!("DB_MIN_CONNECTIONS must not exceed DB_MAX_CONNECTIONS");
        }
        if self.jobs.top_n == 0 || self.jobs.top_n > 100 {
            bail!("INGEST_TOP_N must be between 1 and 100");
        }
        if self.jobs.retention_days <= 0 {
            bail!("RETENTION_DAYS must be positive");
        }
        Ok(())
    }
}
