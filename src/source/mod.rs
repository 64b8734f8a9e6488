//! Query execution boundary
//!
//! The beat hands query text to a [`QueryExecutor`] verbatim and gets back
//! a [`ResultSet`] of raw text cells. Connection handling and the wire
//! protocol live behind this trait.

mod scripted;
#[cfg(feature = "mysql")]
pub mod mysql;

pub use scripted::ScriptedExecutor;

use crate::error::SourceError;
use std::future::Future;

/// Tabular query result: ordered column names and rows of raw text cells
///
/// `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        ResultSet { columns, rows }
    }

    /// Build from string slices; every cell is non-NULL.
    pub fn from_rows(columns: &[&str], rows: &[&[&str]]) -> Self {
        ResultSet {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| Some(cell.to_string())).collect())
                .collect(),
        }
    }

    pub fn empty(columns: &[&str]) -> Self {
        Self::from_rows(columns, &[])
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Runs read-only queries against the data source
///
/// One executor instance serves one polling cycle at a time.
pub trait QueryExecutor: Send {
    /// Prepare for a cycle (e.g. open a connection).
    fn connect(&mut self) -> impl Future<Output = Result<(), SourceError>> + Send {
        async { Ok(()) }
    }

    /// Run `sql` and return its full result set.
    fn query(&mut self, sql: &str) -> impl Future<Output = Result<ResultSet, SourceError>> + Send;

    /// Release cycle resources. Called even when the cycle failed.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}
