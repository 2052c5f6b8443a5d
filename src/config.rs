use std::{env, fmt::Display, str::FromStr};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub session_secret: String,
    pub session_lifetime_hours: i64,
    pub database_max_connections: u32,
    pub public_url: String,
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env loaded: {e}");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let public_url: String = try_load(&lookup, "PUBLIC_URL", "http://localhost")?;

        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            redis_url: try_load(&lookup, "REDIS_URL", "redis://127.0.0.1/")?,
            session_secret: required(&lookup, "SESSION_SECRET")?,
            session_lifetime_hours: try_load(&lookup, "SESSION_LIFETIME_HOURS", "24")?,
            database_max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            public_url: public_url.trim_end_matches('/').to_owned(),
        })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            log::warn!("{key} not set, using default: {default}");
            default.to_string()
        })
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}
