//! Beat configuration
//!
//! Loaded once from a TOML file, then overridden from the environment:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | SQLBEAT_HOSTNAME | `database.hostname` |
//! | SQLBEAT_PORT | `database.port` |
//! | SQLBEAT_USERNAME | `database.username` |
//! | SQLBEAT_PASSWORD | `database.password` |
//! | SQLBEAT_PERIOD_MS | `period_ms` |
//!
//! [`BeatConfig::validate`] must succeed before any connection is made.

use crate::error::ConfigError;
use crate::metrics::QueryMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);
pub const DEFAULT_DELTA_SUFFIX: &str = "__DELTA";
pub const DEFAULT_DELTA_KEY_SUFFIX: &str = "__DELTAKEY";
pub const DEFAULT_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3306;

const READ_ONLY_VERBS: [&str; 2] = ["SELECT", "SHOW"];

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    /// Time between cycle starts
    #[serde(rename = "period_ms", with = "duration_millis")]
    pub period: Duration,
    /// Column suffix marking a value for per-second rate tracking
    pub delta_suffix: String,
    /// Column suffix marking a value as part of a row's identity
    pub delta_key_suffix: String,
    /// Evict rate state for series unseen this long; unset keeps it forever
    #[serde(rename = "state_ttl_ms", with = "option_duration_millis")]
    pub state_ttl: Option<Duration>,
    /// Stop polling after a failed cycle instead of waiting for the next tick
    pub stop_on_error: bool,
    pub database: DatabaseConfig,
    pub queries: Vec<QueryConfig>,
}

impl Default for BeatConfig {
    fn default() -> Self {
        BeatConfig {
            period: DEFAULT_PERIOD,
            delta_suffix: DEFAULT_DELTA_SUFFIX.to_string(),
            delta_key_suffix: DEFAULT_DELTA_KEY_SUFFIX.to_string(),
            state_ttl: None,
            stop_on_error: true,
            database: DatabaseConfig::default(),
            queries: Vec::new(),
        }
    }
}

/// Data source connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub hostname: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            hostname: DEFAULT_HOSTNAME.to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
        }
    }
}

/// One query entry as written in the file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryConfig {
    #[serde(rename = "type")]
    pub mode: String,
    pub sql: String,
}

impl QueryConfig {
    pub fn new(mode: impl Into<String>, sql: impl Into<String>) -> Self {
        QueryConfig {
            mode: mode.into(),
            sql: sql.into(),
        }
    }
}

/// A validated query, ready to poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Position in the configured list, used in logs and errors
    pub index: usize,
    pub mode: QueryMode,
    pub sql: String,
}

impl BeatConfig {
    /// Read, parse and apply environment overrides. Does not validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `SQLBEAT_*` environment variables on top of the file values
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(hostname) = lookup("SQLBEAT_HOSTNAME") {
            self.database.hostname = hostname;
        }
        if let Some(port) = lookup("SQLBEAT_PORT") {
            self.database.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                name: "SQLBEAT_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(username) = lookup("SQLBEAT_USERNAME") {
            self.database.username = Some(username);
        }
        if let Some(password) = lookup("SQLBEAT_PASSWORD") {
            self.database.password = Some(password);
        }
        if let Some(period) = lookup("SQLBEAT_PERIOD_MS") {
            let ms: u64 = period.parse().map_err(|_| ConfigError::InvalidValue {
                name: "SQLBEAT_PERIOD_MS",
                value: period.clone(),
            })?;
            self.period = Duration::from_millis(ms);
        }
        Ok(())
    }

    /// Check everything that must hold before polling starts.
    pub fn validate(&self) -> Result<Vec<Query>, ConfigError> {
        if self.queries.is_empty() {
            return Err(ConfigError::NoQueries);
        }
        if self.period.is_zero() {
            return Err(ConfigError::InvalidPeriod);
        }
        if self.delta_suffix.is_empty() {
            return Err(ConfigError::EmptyMarker {
                name: "delta_suffix",
            });
        }
        if self.delta_key_suffix.is_empty() {
            return Err(ConfigError::EmptyMarker {
                name: "delta_key_suffix",
            });
        }
        if self.delta_suffix == self.delta_key_suffix {
            return Err(ConfigError::MarkerOverlap(self.delta_suffix.clone()));
        }

        self.queries
            .iter()
            .enumerate()
            .map(|(index, query)| {
                let mode = query
                    .mode
                    .parse::<QueryMode>()
                    .map_err(|_| ConfigError::UnknownMode {
                        index,
                        mode: query.mode.clone(),
                    })?;
                if !is_read_only(&query.sql) {
                    return Err(ConfigError::UnsafeQuery {
                        index,
                        sql: query.sql.clone(),
                    });
                }
                Ok(Query {
                    index,
                    mode,
                    sql: query.sql.clone(),
                })
            })
            .collect()
    }
}

/// `SELECT`/`SHOW` prefix (case-insensitive, surrounding whitespace ignored)
/// and no statement separator anywhere.
pub fn is_read_only(sql: &str) -> bool {
    let clean = sql.trim().to_uppercase();
    READ_ONLY_VERBS.iter().any(|verb| clean.starts_with(verb)) && !clean.contains(';')
}

/// Serde helper for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
