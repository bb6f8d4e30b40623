use std::{env, fmt, ops::RangeInclusive, str::FromStr};

use crate::auth::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECS};

const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 30;
const DEFAULT_REFRESH_TOKEN_MINUTES: i64 = 7 * 24 * 60;

/// Token lifetimes are capped at ten years so expiry timestamps never overflow.
const TOKEN_MINUTES_RANGE: RangeInclusive<i64> = 1..=10 * 365 * 24 * 60;
const RATE_WINDOW_SECS_RANGE: RangeInclusive<u64> = 1..=24 * 60 * 60;

/// Errors raised while reading configuration. All of them are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is absent or empty.
    Missing(&'static str),
    /// A variable is present but cannot be parsed.
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => {
                write!(f, "{} has an invalid value: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_minutes: i64,
    pub bcrypt_cost: u32,
    /// Concurrent password hashing jobs.
    pub hasher_workers: usize,
    /// Hashing jobs allowed to wait for a worker before new ones are refused.
    pub hasher_queue_capacity: usize,
    pub login_rate_limit: usize,
    pub login_rate_window_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let database_url = match get("DATABASE_URL") {
            Some(url) => url,
            None => {
                let password = get("DB_PASSWORD").ok_or(ConfigError::Missing("DB_PASSWORD"))?;
                format!(
                    "postgres://{}:{}@{}:{}/{}",
                    get("DB_USER").unwrap_or_else(|| "postgres".to_string()),
                    password,
                    get("DB_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
                    get("DB_PORT").unwrap_or_else(|| "5432".to_string()),
                    get("DB_NAME").unwrap_or_else(|| "postgres".to_string()),
                )
            }
        };

        Ok(Self {
            database_url,
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
            server_port: parse_or(&get, "SERVER_PORT", 8080)?,
            server_host: get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            jwt_secret,
            access_token_minutes: parse_in(
                &get,
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                DEFAULT_ACCESS_TOKEN_MINUTES,
                TOKEN_MINUTES_RANGE,
            )?,
            refresh_token_minutes: parse_in(
                &get,
                "REFRESH_TOKEN_EXPIRE_MINUTES",
                DEFAULT_REFRESH_TOKEN_MINUTES,
                TOKEN_MINUTES_RANGE,
            )?,
            bcrypt_cost: parse_or(&get, "BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            hasher_workers: parse_in(&get, "HASHER_WORKERS", 4, 1..=usize::MAX)?,
            hasher_queue_capacity: parse_or(&get, "HASHER_QUEUE_CAPACITY", 64)?,
            login_rate_limit: parse_in(
                &get,
                "LOGIN_RATE_LIMIT",
                DEFAULT_MAX_REQUESTS,
                1..=usize::MAX,
            )?,
            login_rate_window_secs: parse_in(
                &get,
                "LOGIN_RATE_WINDOW_SECS",
                DEFAULT_WINDOW_SECS as u64,
                RATE_WINDOW_SECS_RANGE,
            )?,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

/// Like [`parse_or`], but a value outside `range` is `Invalid` too.
fn parse_in<T, G>(
    get: &G,
    key: &'static str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd,
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, key, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: get(key).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "postgres://test");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.access_token_minutes, 30);
        assert_eq!(config.refresh_token_minutes, 10080);
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.login_rate_limit, 5);
        assert_eq!(config.login_rate_window_secs, 60);
        assert_eq!(config.server_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let result = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://test")]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("JWT_SECRET"));

        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", "   "),
        ]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn test_database_url_from_parts() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "secret"),
            ("DB_PASSWORD", "pw"),
            ("DB_HOST", "db"),
            ("DB_NAME", "tasks"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "postgres://postgres:pw@db:5432/tasks");

        let result = Config::from_lookup(lookup(&[("JWT_SECRET", "secret")]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("DB_PASSWORD"));
    }

    #[test]
    fn test_custom_and_invalid_values() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", "secret"),
            ("SERVER_PORT", "3000"),
            ("SERVER_HOST", "0.0.0.0"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "15"),
        ]))
        .unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.access_token_minutes, 15);

        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", "secret"),
            ("SERVER_PORT", "eighty"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "SERVER_PORT", .. })
        ));
    }

    #[test]
    fn test_out_of_range_values_are_invalid() {
        let cases = [
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "0"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "-5"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "9223372036854775807"),
            ("REFRESH_TOKEN_EXPIRE_MINUTES", "100000000000"),
            ("LOGIN_RATE_WINDOW_SECS", "0"),
            ("LOGIN_RATE_WINDOW_SECS", "18446744073709551615"),
            ("LOGIN_RATE_LIMIT", "0"),
            ("HASHER_WORKERS", "0"),
        ];
        for (key, value) in cases {
            let result = Config::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://test"),
                ("JWT_SECRET", "secret"),
                (key, value),
            ]));
            assert_eq!(
                result.unwrap_err(),
                ConfigError::Invalid {
                    key,
                    value: value.to_string()
                },
                "{}={}",
                key,
                value
            );
        }

        // The largest accepted lifetime still yields a usable expiry.
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", "secret"),
            ("REFRESH_TOKEN_EXPIRE_MINUTES", "5256000"),
        ]))
        .unwrap();
        let expiry = chrono::Utc::now() + chrono::Duration::minutes(config.refresh_token_minutes);
        assert!(expiry.timestamp() > 0);
    }
}
