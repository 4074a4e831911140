//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use grocery_reservations::DEFAULT_MAX_ATTEMPTS;
use std::env;

/// `GROCERY_DATABASE_URL` value selecting the in-memory store.
pub const MEMORY_DATABASE_URL: &str = "memory";

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Store configuration
    pub store: StoreConfig,

    /// Reservation configuration
    pub reservations: ReservationConfig,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite URL, or `memory`
    pub database_url: String,
    /// Seed the sample catalogue and lists on start
    pub seed: bool,
}

impl StoreConfig {
    /// Check whether the in-memory store is selected.
    pub fn is_memory(&self) -> bool {
        self.database_url.eq_ignore_ascii_case(MEMORY_DATABASE_URL)
    }
}

/// Reservation configuration.
#[derive(Debug, Clone)]
pub struct ReservationConfig {
    /// Compare-and-swap attempts per transition
    pub max_transfer_attempts: u32,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (in-memory store)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let api = Self::load_api_config()?;
        let store = Self::load_store_config(environment)?;
        let reservations = Self::load_reservation_config()?;

        Ok(Self {
            api,
            store,
            reservations,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            store: StoreConfig {
                database_url: MEMORY_DATABASE_URL.to_string(),
                seed: false,
            },
            reservations: ReservationConfig {
                max_transfer_attempts: DEFAULT_MAX_ATTEMPTS,
            },
            environment: Environment::Test,
        }
    }

    fn load_environment() -> DaemonResult<Environment> {
        let env_str = env::var("GROCERY_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid GROCERY_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config() -> DaemonResult<ApiConfig> {
        let host = env::var("GROCERY_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port_str = env::var("GROCERY_API_PORT").unwrap_or_else(|_| "8080".to_string());

        let port = port_str
            .parse::<u16>()
            .map_err(|_| DaemonError::Config(format!("Invalid GROCERY_API_PORT: {}", port_str)))?;

        Ok(ApiConfig { host, port })
    }

    fn load_store_config(environment: Environment) -> DaemonResult<StoreConfig> {
        let database_url = env::var("GROCERY_DATABASE_URL").unwrap_or_else(|_| match environment {
            Environment::Test => MEMORY_DATABASE_URL.to_string(),
            _ => "sqlite://grocery.db".to_string(),
        });

        let seed = match env::var("GROCERY_SEED") {
            Ok(val) => parse_bool("GROCERY_SEED", &val)?,
            Err(_) => environment != Environment::Production,
        };

        Ok(StoreConfig { database_url, seed })
    }

    fn load_reservation_config() -> DaemonResult<ReservationConfig> {
        let max_transfer_attempts = match env::var("GROCERY_MAX_TRANSFER_ATTEMPTS") {
            Ok(val) => val
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    DaemonError::Config(format!("Invalid GROCERY_MAX_TRANSFER_ATTEMPTS: {}", val))
                })?,
            Err(_) => DEFAULT_MAX_ATTEMPTS,
        };

        Ok(ReservationConfig {
            max_transfer_attempts,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> DaemonResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DaemonError::Config(format!("Invalid {}: {}", key, other))),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            store: StoreConfig {
                database_url: "sqlite://grocery.db".to_string(),
                seed: true,
            },
            reservations: ReservationConfig {
                max_transfer_attempts: DEFAULT_MAX_ATTEMPTS,
            },
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
