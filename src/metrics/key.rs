//! Series key derivation
//!
//! A series key identifies one tracked value across cycles:
//!
//! - single-row / two-columns: the column (or name-cell) text itself
//! - multiple-rows: `<key values...><column name>`, where the key values
//!   are the raw cells of every column ending with the key marker, in
//!   column order
//!
//! Examples with marker `__DELTAKEY`:
//! - row `{user__DELTAKEY: "app", host__DELTAKEY: "db1", Queries__DELTA: "9"}`
//!   gives row key `appdb1` and series key `appdb1Queries__DELTA`

/// Derives row identity from designated key columns
#[derive(Debug, Clone)]
pub struct RowKeyDeriver {
    key_suffix: String,
}

impl RowKeyDeriver {
    pub fn new(key_suffix: impl Into<String>) -> Self {
        let key_suffix = key_suffix.into();
        debug_assert!(!key_suffix.is_empty(), "key suffix cannot be empty");
        RowKeyDeriver { key_suffix }
    }

    pub fn key_suffix(&self) -> &str {
        &self.key_suffix
    }

    pub fn is_key_column(&self, column: &str) -> bool {
        column.ends_with(&self.key_suffix)
    }

    /// Concatenate the values of all key columns, in column order.
    ///
    /// Returns `None` when no column carries the key marker.
    pub fn derive<S: AsRef<str>>(&self, columns: &[S], values: &[S]) -> Option<String> {
        let mut key = String::new();
        let mut found = false;
        for (column, value) in columns.iter().zip(values) {
            if self.is_key_column(column.as_ref()) {
                key.push_str(value.as_ref());
                found = true;
            }
        }
        found.then_some(key)
    }

    /// Series key for `column` within a row identified by `row_key`
    pub fn series_key(row_key: &str, column: &str) -> String {
        let mut key = String::with_capacity(row_key.len() + column.len());
        key.push_str(row_key);
        key.push_str(column);
        key
    }
}
