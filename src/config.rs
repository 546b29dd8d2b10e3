//! Configuration read from the environment.
//!
//! | Variable                        | Default  |
//! |---------------------------------|----------|
//! | `DATABASE_URL`                  | required |
//! | `DATABASE_MAX_CONNECTIONS`      | `5`      |
//! | `DATABASE_ACQUIRE_TIMEOUT_SECS` | `30`     |
//! | `RENTAL_LOCK_VEHICLE`           | `false`  |

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, StoreError};
use crate::service::RentalOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Creates a connection pool.
    pub async fn connect(&self) -> Result<MySqlPool, StoreError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.url)
            .await?;
        Ok(pool)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database: DatabaseConfig,
    pub rental: RentalOptions,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?;
        let acquire_timeout = parse_or(&lookup, "DATABASE_ACQUIRE_TIMEOUT_SECS", 30)?;
        let lock_vehicle = parse_or(&lookup, "RENTAL_LOCK_VEHICLE", false)?;

        Ok(Self {
            database: DatabaseConfig {
                url,
                max_connections,
                acquire_timeout: Duration::from_secs(acquire_timeout),
            },
            rental: RentalOptions { lock_vehicle },
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
