//! Error taxonomy for the beat
//!
//! - [`ConfigError`]: fatal at startup, polling never begins
//! - [`SourceError`]: the data source could not run a query; aborts the cycle
//! - [`AssembleError`]: a result set could not be turned into records
//! - [`PublishError`]: the sink refused a finished record
//! - [`BeatError`]: what a cycle reports back to the polling loop

use thiserror::Error;

/// Configuration load or validation failure
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("there are no queries to execute")]
    NoQueries,

    #[error("query #{index}: unknown query type: {mode}")]
    UnknownMode { index: usize, mode: String },

    #[error("query #{index}: only SELECT/SHOW queries are allowed (the char ; is forbidden): {sql}")]
    UnsafeQuery { index: usize, sql: String },

    #[error("{name} must not be empty")]
    EmptyMarker { name: &'static str },

    #[error("delta_suffix and delta_key_suffix must differ (both are {0:?})")]
    MarkerOverlap(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("period must be greater than zero")]
    InvalidPeriod,
}

/// Failure reported by a query executor
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("connection error: {message}")]
    Connection { message: String },

    #[error("query failed: {message} (sql: {sql})")]
    Query { sql: String, message: String },
}

impl SourceError {
    pub fn connection(message: impl Into<String>) -> Self {
        SourceError::Connection {
            message: message.into(),
        }
    }

    pub fn query(sql: impl Into<String>, message: impl Into<String>) -> Self {
        SourceError::Query {
            sql: sql.into(),
            message: message.into(),
        }
    }
}

/// Failure while turning one query's result set into records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    #[error("query #{query}: query type multiple-rows requires at least one delta key column")]
    MissingKeyColumn { query: usize },

    #[error("query #{query}, row {row}: expected {expected} values, found {found}")]
    RowDecode {
        query: usize,
        row: usize,
        expected: usize,
        found: usize,
    },
}

impl AssembleError {
    /// Query-scoped errors drop that query's records but let the cycle continue.
    pub fn is_query_scoped(&self) -> bool {
        matches!(self, AssembleError::MissingKeyColumn { .. })
    }
}

/// Failure handing a record to the sink
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("publish I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Cycle-aborting failure surfaced to the polling loop
#[derive(Error, Debug)]
pub enum BeatError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}
