use std::str::FromStr;
use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DOMAIN: &str = "mailshuffle.xyz";
const DEFAULT_TEMP_TTL_DAYS: i64 = 7;
const DEFAULT_JWT_TTL_HOURS: i64 = 168;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime configuration, read from the environment (and `.env`).
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub domain: String,
    /// When set, webhook posts must carry a valid Mailgun signature.
    pub mailgun_signing_key: Option<String>,
    pub temp_mailbox_ttl: chrono::Duration,
    pub jwt_ttl: chrono::Duration,
    pub sweep_interval: std::time::Duration,
    pub db_max_connections: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL")
            .or_else(|| get("MONGODB_URI"))
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let temp_ttl_days: i64 = parse_or(&get, "TEMP_MAILBOX_TTL_DAYS", DEFAULT_TEMP_TTL_DAYS)?;
        let jwt_ttl_hours: i64 = parse_or(&get, "JWT_TTL_HOURS", DEFAULT_JWT_TTL_HOURS)?;
        if temp_ttl_days <= 0 {
            return Err(ConfigError::Invalid {
                name: "TEMP_MAILBOX_TTL_DAYS",
                value: temp_ttl_days.to_string(),
            });
        }
        if jwt_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "JWT_TTL_HOURS",
                value: jwt_ttl_hours.to_string(),
            });
        }
        // A zero period would make the sweeper's interval panic.
        let sweep_interval_secs: u64 =
            parse_or(&get, "SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;
        if sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SWEEP_INTERVAL_SECS",
                value: sweep_interval_secs.to_string(),
            });
        }

        Ok(Self {
            database_url,
            jwt_secret,
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            domain: get("DOMAIN")
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string())
                .to_lowercase(),
            mailgun_signing_key: get("MAILGUN_SIGNING_KEY"),
            temp_mailbox_ttl: chrono::Duration::days(temp_ttl_days),
            jwt_ttl: chrono::Duration::hours(jwt_ttl_hours),
            sweep_interval: std::time::Duration::from_secs(sweep_interval_secs),
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
        })
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
