//! MySQL executor over `mysql_async`
//!
//! Queries go through the text protocol, so every cell arrives as bytes
//! and is handed to the value typer as text. `SHOW ...` statements are not
//! all preparable, which rules out the binary protocol here.

use super::{QueryExecutor, ResultSet};
use crate::config::DatabaseConfig;
use crate::error::SourceError;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Pool, Row, Value};
use tracing::{debug, warn};

pub struct MySqlExecutor {
    pool: Pool,
    conn: Option<Conn>,
    endpoint: String,
}

impl MySqlExecutor {
    pub fn new(config: &DatabaseConfig) -> Self {
        let opts = OptsBuilder::default()
            .ip_or_hostname(config.hostname.clone())
            .tcp_port(config.port)
            .user(config.username.clone())
            .pass(config.password.clone());

        MySqlExecutor {
            pool: Pool::new(opts),
            conn: None,
            endpoint: format!("{}:{}", config.hostname, config.port),
        }
    }

    /// Close all pooled connections
    pub async fn shutdown(self) {
        drop(self.conn);
        if let Err(e) = self.pool.disconnect().await {
            warn!(endpoint = %self.endpoint, error = %e, "error closing MySQL pool");
        }
    }
}

impl QueryExecutor for MySqlExecutor {
    async fn connect(&mut self) -> Result<(), SourceError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = self.pool.get_conn().await.map_err(|e| {
            SourceError::connection(format!("failed to connect to {}: {}", self.endpoint, e))
        })?;
        debug!(endpoint = %self.endpoint, "connected");
        self.conn = Some(conn);
        Ok(())
    }

    async fn query(&mut self, sql: &str) -> Result<ResultSet, SourceError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| SourceError::connection("not connected"))?;

        let mut result = conn
            .query_iter(sql)
            .await
            .map_err(|e| SourceError::query(sql, e.to_string()))?;

        // Read from the result metadata so a zero-row result keeps its columns.
        let columns: Vec<String> = result
            .columns()
            .map(|columns| columns.iter().map(|c| c.name_str().into_owned()).collect())
            .unwrap_or_default();

        let rows: Vec<Row> = result
            .collect()
            .await
            .map_err(|e| SourceError::query(sql, e.to_string()))?;

        Ok(build_result_set(
            columns,
            rows.iter()
                .map(|row| (0..row.len()).map(|i| row.as_ref(i)).collect()),
        ))
    }

    async fn disconnect(&mut self) {
        // Returns the connection to the pool.
        self.conn = None;
    }
}

/// `None` cells (already taken from the row) read as NULL.
fn build_result_set<'a>(
    columns: Vec<String>,
    rows: impl IntoIterator<Item = Vec<Option<&'a Value>>>,
) -> ResultSet {
    let rows = rows
        .into_iter()
        .map(|row| row.into_iter().map(|cell| cell.and_then(cell_text)).collect())
        .collect();
    ResultSet::new(columns, rows)
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Int(n) => Some(n.to_string()),
        Value::UInt(n) => Some(n.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        other => Some(other.as_sql(true).trim_matches('\'').to_string()),
    }
}
