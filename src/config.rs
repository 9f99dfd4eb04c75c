use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SQLITE_PATH: &str = "plants.db";
const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 10000;
const DEFAULT_NOTIFICATION_INTERVAL_SECS: u64 = 3600;
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOCK_FILE: &str = "bot.lock";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in environment variables or .env file")]
    Missing(&'static str),
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Which relational engine backs the plant store.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseConfig {
    Postgres { url: String },
    Sqlite { path: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub telegram_api_url: String,
    pub database: DatabaseConfig,
    pub pool_size: u32,
    pub host: String,
    pub port: u16,
    pub notification_period: Duration,
    pub send_timeout: Duration,
    pub lock_file: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram_token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        // DATABASE_URL is the toggle between the two backends.
        let database = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) => DatabaseConfig::Postgres { url },
            None => DatabaseConfig::Sqlite {
                path: lookup("SQLITE_PATH").unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
            },
        };

        let pool_size = parse_positive_or(&lookup, "DB_POOL_SIZE", DEFAULT_POOL_SIZE)?;
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let interval_secs = parse_positive_or(
            &lookup,
            "NOTIFICATION_INTERVAL_SECS",
            DEFAULT_NOTIFICATION_INTERVAL_SECS,
        )?;
        let send_timeout_secs = parse_positive_or(
            &lookup,
            "NOTIFICATION_SEND_TIMEOUT_SECS",
            DEFAULT_SEND_TIMEOUT_SECS,
        )?;

        Ok(Config {
            telegram_token,
            telegram_api_url: lookup("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            database,
            pool_size,
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            notification_period: Duration::from_secs(interval_secs),
            send_timeout: Duration::from_secs(send_timeout_secs),
            lock_file: PathBuf::from(
                lookup("BOT_LOCK_FILE").unwrap_or_else(|| DEFAULT_LOCK_FILE.to_string()),
            ),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

/// Like `parse_or`, but zero is rejected: pool sizes, periods and timeouts
/// of zero never make progress.
fn parse_positive_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialEq + Default + ToString,
{
    let value = parse_or(lookup, key, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_sqlite_and_hourly_scans() {
        let config = Config::from_lookup(lookup_from(&[("TELEGRAM_BOT_TOKEN", "abc")])).unwrap();
        assert_eq!(
            config.database,
            DatabaseConfig::Sqlite {
                path: "plants.db".to_string()
            }
        );
        assert_eq!(config.notification_period, Duration::from_secs(3600));
        assert_eq!(config.port, 10000);
        assert_eq!(config.lock_file, PathBuf::from("bot.lock"));
    }

    #[test]
    fn database_url_selects_postgres() {
        let config = Config::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "abc"),
            ("DATABASE_URL", "postgres://localhost/plants"),
            ("NOTIFICATION_INTERVAL_SECS", "60"),
        ]))
        .unwrap();
        assert_eq!(
            config.database,
            DatabaseConfig::Postgres {
                url: "postgres://localhost/plants".to_string()
            }
        );
        assert_eq!(config.notification_period, Duration::from_secs(60));
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = Config::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "abc"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PORT",
                value: "eighty".to_string()
            }
        );

        let err = Config::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "abc"),
            ("NOTIFICATION_INTERVAL_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "NOTIFICATION_INTERVAL_SECS", .. }));
    }

    #[test]
    fn rejects_zero_pool_size_and_send_timeout() {
        for key in ["DB_POOL_SIZE", "NOTIFICATION_SEND_TIMEOUT_SECS"] {
            let err = Config::from_lookup(lookup_from(&[("TELEGRAM_BOT_TOKEN", "abc"), (key, "0")]))
                .unwrap_err();
            assert_eq!(
                err,
                ConfigError::Invalid {
                    key,
                    value: "0".to_string()
                }
            );
        }

        let config = Config::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "abc"),
            ("DB_POOL_SIZE", "4"),
            ("NOTIFICATION_SEND_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.send_timeout, Duration::from_secs(5));
    }
}
