//! Emitted metric records and the query modes that produce them

use super::value::MetricValue;
use crate::clock::Timestamp;
use crate::error::ConfigError;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Field carrying the record timestamp in serialized output
pub const TIMESTAMP_FIELD: &str = "@timestamp";
/// Field carrying the query mode in serialized output
pub const TYPE_FIELD: &str = "type";

/// How a query's result set is turned into records
///
/// Fixed per query at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// First row only, one record
    SingleRow,
    /// Every row becomes its own record; delta columns keyed per row
    MultipleRows,
    /// Every row is a name/value pair folded into one record
    TwoColumns,
    /// First row only, `Seconds_Behind_Master` column only
    ShowSlaveDelay,
}

impl QueryMode {
    pub const ALL: [QueryMode; 4] = [
        QueryMode::SingleRow,
        QueryMode::MultipleRows,
        QueryMode::TwoColumns,
        QueryMode::ShowSlaveDelay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::SingleRow => "single-row",
            QueryMode::MultipleRows => "multiple-rows",
            QueryMode::TwoColumns => "two-columns",
            QueryMode::ShowSlaveDelay => "show-slave-delay",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = ConfigError;

    /// Index is unknown here; callers validating a query list re-tag it.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownMode {
                index: 0,
                mode: s.to_string(),
            })
    }
}

/// One emitted unit: timestamp, mode tag and typed fields
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub timestamp: Timestamp,
    pub mode: QueryMode,
    fields: BTreeMap<String, MetricValue>,
}

impl MetricRecord {
    pub fn new(mode: QueryMode, timestamp: Timestamp) -> Self {
        MetricRecord {
            timestamp,
            mode,
            fields: BTreeMap::new(),
        }
    }

    /// Set a field, replacing any earlier value under the same name
    ///
    /// A field named `@timestamp` is kept here but never serialized; the
    /// record timestamp always wins.
    pub fn insert(&mut self, name: impl Into<String>, value: MetricValue) {
        let name = name.into();
        if name == TIMESTAMP_FIELD {
            debug!(mode = %self.mode, "column @timestamp is shadowed by the record timestamp");
        }
        self.fields.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, MetricValue> {
        &self.fields
    }

    /// No fields besides the implicit mode tag
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// Flat object: `@timestamp` (epoch millis), `type`, then every field.
///
/// A column literally named `type` takes precedence over the mode tag. A
/// column named `@timestamp` is dropped in favour of the record timestamp.
impl Serialize for MetricRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(TIMESTAMP_FIELD, &self.timestamp.as_millis())?;
        if !self.fields.contains_key(TYPE_FIELD) {
            map.serialize_entry(TYPE_FIELD, self.mode.as_str())?;
        }
        for (name, value) in &self.fields {
            if name == TIMESTAMP_FIELD {
                continue;
            }
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
