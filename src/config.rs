use std::{env, time::Duration};

use thiserror::Error;
use url::Url;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;
pub const DEFAULT_LEETCODE_URL: &str = "https://leetcode.com";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} missing in env")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// What to do with the watermark when a notification could not be delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WatermarkPolicy {
    /// Record the activity as seen anyway. A failed message is never retried.
    #[default]
    AlwaysAdvance,
    /// Leave the watermark alone so the next tick tries to notify again.
    HoldOnSendFailure,
}

#[derive(Clone, Debug)]
pub enum DatabaseTarget {
    Local(String),
    Remote { url: String, auth_token: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    pub group_chat_id: String,
    pub database: DatabaseTarget,
    pub poll_interval: Duration,
    pub port: Option<u16>,
    pub fetch_concurrency: usize,
    pub watermark_policy: WatermarkPolicy,
    pub leetcode_url: Url,
    pub telegram_api_url: Url,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let bot_token = required("BOT_TOKEN")?;
        let group_chat_id = required("GROUP_CHAT_ID")?;

        let database_url = required("DATABASE_URL")?;
        let database = if database_url.starts_with("libsql://")
            || database_url.starts_with("https://")
        {
            DatabaseTarget::Remote {
                url: database_url,
                auth_token: required("DATABASE_AUTH_TOKEN")?,
            }
        } else {
            DatabaseTarget::Local(database_url)
        };

        let poll_secs: u64 = parse_or("POLL_INTERVAL", get("POLL_INTERVAL"), DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_secs == 0 {
            return Err(invalid("POLL_INTERVAL", "0", "must be at least 1 second"));
        }

        let port = get("PORT")
            .map(|v| {
                v.trim()
                    .parse::<u16>()
                    .map_err(|e| invalid("PORT", &v, &e.to_string()))
            })
            .transpose()?;

        let fetch_concurrency: usize = parse_or(
            "FETCH_CONCURRENCY",
            get("FETCH_CONCURRENCY"),
            DEFAULT_FETCH_CONCURRENCY,
        )?;
        if fetch_concurrency == 0 {
            return Err(invalid("FETCH_CONCURRENCY", "0", "must be at least 1"));
        }

        let advance: bool = parse_or(
            "ADVANCE_ON_SEND_FAILURE",
            get("ADVANCE_ON_SEND_FAILURE"),
            true,
        )?;
        let watermark_policy = if advance {
            WatermarkPolicy::AlwaysAdvance
        } else {
            WatermarkPolicy::HoldOnSendFailure
        };

        let leetcode_url = parse_url(
            "LEETCODE_URL",
            get("LEETCODE_URL").unwrap_or_else(|| DEFAULT_LEETCODE_URL.into()),
        )?;
        let telegram_api_url = parse_url(
            "TELEGRAM_API_URL",
            get("TELEGRAM_API_URL").unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.into()),
        )?;

        Ok(Config {
            bot_token,
            group_chat_id,
            database,
            poll_interval: Duration::from_secs(poll_secs),
            port,
            fetch_concurrency,
            watermark_policy,
            leetcode_url,
            telegram_api_url,
        })
    }
}

fn invalid(name: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.into(),
        reason: reason.into(),
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|e: T::Err| invalid(name, &v, &e.to_string())),
    }
}

fn parse_url(name: &'static str, raw: String) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| invalid(name, &raw, &e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    const BASE: [(&str, &str); 3] = [
        ("BOT_TOKEN", "123:abc"),
        ("GROUP_CHAT_ID", "-1001"),
        ("DATABASE_URL", "watcher.db"),
    ];

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&BASE)).unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.port, None);
        assert_eq!(config.fetch_concurrency, DEFAULT_FETCH_CONCURRENCY);
        assert_eq!(config.watermark_policy, WatermarkPolicy::AlwaysAdvance);
        assert_eq!(config.leetcode_url.as_str(), "https://leetcode.com/");
        assert!(matches!(config.database, DatabaseTarget::Local(ref p) if p == "watcher.db"));
    }

    #[test]
    fn missing_required_values_are_fatal() {
        let err = Config::from_lookup(lookup(&BASE[..2])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));

        let err = Config::from_lookup(lookup(&[("BOT_TOKEN", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("BOT_TOKEN"));
    }

    #[test]
    fn remote_database_needs_token() {
        let mut pairs = BASE.to_vec();
        pairs[2] = ("DATABASE_URL", "libsql://watcher.turso.io");
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_AUTH_TOKEN"));

        pairs.push(("DATABASE_AUTH_TOKEN", "secret"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert!(matches!(config.database, DatabaseTarget::Remote { .. }));
    }

    #[test]
    fn optional_values_are_parsed() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("POLL_INTERVAL", "15"),
            ("PORT", "8080"),
            ("FETCH_CONCURRENCY", "2"),
            ("ADVANCE_ON_SEND_FAILURE", "False"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.fetch_concurrency, 2);
        assert_eq!(config.watermark_policy, WatermarkPolicy::HoldOnSendFailure);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        for (key, value) in [
            ("POLL_INTERVAL", "soon"),
            ("POLL_INTERVAL", "0"),
            ("PORT", "70000"),
            ("FETCH_CONCURRENCY", "0"),
        ] {
            let mut pairs = BASE.to_vec();
            pairs.push((key, value));
            let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { name, .. } if name == key),
                "{key}={value} gave {err:?}"
            );
        }
    }
}
