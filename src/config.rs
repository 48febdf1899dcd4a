//! Application configuration management
//!
//! This module handles loading and validating configuration from environment variables.
//! All configuration is loaded at startup and validated before the application runs.

use std::env;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::constants::{
    DEFAULT_DATABASE_MAX_CONNECTIONS, DEFAULT_JUDGE_QUEUE, DEFAULT_JUDGE_RESULTS_QUEUE,
    DEFAULT_JWT_EXPIRY_HOURS,
    DEFAULT_PRETEST_MAX_PER_WINDOW, DEFAULT_PRETEST_MEMORY, DEFAULT_PRETEST_TIME,
    DEFAULT_PRETEST_WINDOW_SECS, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, PROBLEM_PER_PAGE,
};

/// Global application configuration (lazily initialized)
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::from_env().expect("Failed to load configuration from environment")
});

/// Main application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub judge: JudgeConfig,
    pub pretest: PretestConfig,
    pub problems: ProblemsConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// JWT authentication configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiry_hours: i64,
}

/// Judge dispatch configuration
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Redis list the judge workers pop from
    pub queue_name: String,
    /// Redis list the judge workers push reports onto
    pub results_queue: String,
}

/// Pretest limits
#[derive(Debug, Clone)]
pub struct PretestConfig {
    pub window_secs: u64,
    pub max_per_window: u64,
    /// Time limit in `1s` / `500ms` notation
    pub time: String,
    /// Memory limit in `256m` / `1g` notation
    pub memory: String,
}

/// Problem listing configuration
#[derive(Debug, Clone)]
pub struct ProblemsConfig {
    pub per_page: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            redis: RedisConfig::from_env()?,
            jwt: JwtConfig::from_env()?,
            judge: JudgeConfig::from_env()?,
            pretest: PretestConfig::from_env()?,
            problems: ProblemsConfig::from_env()?,
        })
    }
}

/// Read an optional variable, parsing it when present
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            port: parse_var("SERVER_PORT", DEFAULT_SERVER_PORT)?,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            rust_log: "info".to_string(),
        }
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL".to_string()))?,
            max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
        })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/judgeline".to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
        }
    }
}

impl RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        })
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
        }
    }
}

impl JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret: env::var("JWT_SECRET")
                .map_err(|_| ConfigError::Missing("JWT_SECRET".to_string()))?,
            expiry_hours: parse_var("JWT_EXPIRY_HOURS", DEFAULT_JWT_EXPIRY_HOURS)?,
        })
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "development-secret".to_string(),
            expiry_hours: DEFAULT_JWT_EXPIRY_HOURS,
        }
    }
}

impl JudgeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            queue_name: env::var("JUDGE_QUEUE").unwrap_or_else(|_| DEFAULT_JUDGE_QUEUE.to_string()),
            results_queue: env::var("JUDGE_RESULTS_QUEUE")
                .unwrap_or_else(|_| DEFAULT_JUDGE_RESULTS_QUEUE.to_string()),
        })
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            queue_name: DEFAULT_JUDGE_QUEUE.to_string(),
            results_queue: DEFAULT_JUDGE_RESULTS_QUEUE.to_string(),
        }
    }
}

impl PretestConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            window_secs: parse_var("PRETEST_WINDOW_SECS", DEFAULT_PRETEST_WINDOW_SECS)?,
            max_per_window: parse_var("PRETEST_MAX_PER_WINDOW", DEFAULT_PRETEST_MAX_PER_WINDOW)?,
            time: env::var("PRETEST_TIME").unwrap_or_else(|_| DEFAULT_PRETEST_TIME.to_string()),
            memory: env::var("PRETEST_MEMORY")
                .unwrap_or_else(|_| DEFAULT_PRETEST_MEMORY.to_string()),
        };

        if config.window_secs == 0 {
            return Err(ConfigError::InvalidValue("PRETEST_WINDOW_SECS".to_string()));
        }
        if config.max_per_window == 0 {
            return Err(ConfigError::InvalidValue("PRETEST_MAX_PER_WINDOW".to_string()));
        }
        crate::utils::parse_time_ms(&config.time)
            .map_err(|_| ConfigError::InvalidValue("PRETEST_TIME".to_string()))?;
        crate::utils::parse_memory_mb(&config.memory)
            .map_err(|_| ConfigError::InvalidValue("PRETEST_MEMORY".to_string()))?;

        Ok(config)
    }
}

impl Default for PretestConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_PRETEST_WINDOW_SECS,
            max_per_window: DEFAULT_PRETEST_MAX_PER_WINDOW,
            time: DEFAULT_PRETEST_TIME.to_string(),
            memory: DEFAULT_PRETEST_MEMORY.to_string(),
        }
    }
}

impl ProblemsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let per_page = parse_var("PROBLEM_PER_PAGE", PROBLEM_PER_PAGE)?;
        if per_page == 0 {
            return Err(ConfigError::InvalidValue("PROBLEM_PER_PAGE".to_string()));
        }
        Ok(Self { per_page })
    }
}

impl Default for ProblemsConfig {
    fn default() -> Self {
        Self {
            per_page: PROBLEM_PER_PAGE,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}
