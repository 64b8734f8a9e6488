//! Row-to-record assembly
//!
//! Column names carry the semantics, through two configurable suffixes:
//!
//! | Column name | Emitted as | Rate tracked |
//! |-------------|------------|--------------|
//! | `<base><key marker>` | `<base>` = raw value | no |
//! | `<base><delta marker>` | `<base>_PERSECOND` = rate | yes |
//! | anything else | unchanged = raw value | no |
//!
//! Every cell goes through [`MetricValue::infer`]. Records that end up
//! with no fields are dropped.

use super::key::RowKeyDeriver;
use super::rate::RateStateStore;
use super::record::{MetricRecord, QueryMode};
use super::value::MetricValue;
use crate::clock::Timestamp;
use crate::error::AssembleError;
use crate::source::ResultSet;

/// Appended to the base name of every rate field
pub const PER_SECOND_SUFFIX: &str = "_PERSECOND";

/// The only column kept in show-slave-delay mode
pub const SLAVE_DELAY_COLUMN: &str = "Seconds_Behind_Master";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnRole {
    /// Part of the row identity; emitted without the marker
    Key,
    /// Rate tracked; emitted as `<base>_PERSECOND`
    Delta,
    Plain,
}

#[derive(Debug, Clone)]
struct PlannedColumn {
    /// Column name as returned by the source (also the series key suffix)
    name: String,
    /// Field name in the emitted record
    field: String,
    role: ColumnRole,
}

/// Column roles for one result set, computed once and reused for every row
#[derive(Debug, Clone)]
struct ColumnPlan {
    columns: Vec<PlannedColumn>,
}

impl ColumnPlan {
    fn has_delta(&self) -> bool {
        self.columns.iter().any(|c| c.role == ColumnRole::Delta)
    }

    fn has_key(&self) -> bool {
        self.columns.iter().any(|c| c.role == ColumnRole::Key)
    }
}

/// Builds metric records from result sets
#[derive(Debug, Clone)]
pub struct EventAssembler {
    delta_suffix: String,
    keys: RowKeyDeriver,
}

impl EventAssembler {
    pub fn new(delta_suffix: impl Into<String>, delta_key_suffix: impl Into<String>) -> Self {
        let delta_suffix = delta_suffix.into();
        debug_assert!(!delta_suffix.is_empty(), "delta suffix cannot be empty");
        EventAssembler {
            delta_suffix,
            keys: RowKeyDeriver::new(delta_key_suffix),
        }
    }

    /// `<base>_PERSECOND` if `name` carries the delta marker
    pub fn rate_field_name(&self, name: &str) -> Option<String> {
        name.strip_suffix(self.delta_suffix.as_str())
            .map(|base| format!("{}{}", base, PER_SECOND_SUFFIX))
    }

    fn plan(&self, columns: &[String]) -> ColumnPlan {
        let columns = columns
            .iter()
            .map(|name| {
                // The key marker is checked first: a key column is never rate tracked.
                let (field, role) =
                    if let Some(base) = name.strip_suffix(self.keys.key_suffix()) {
                        (base.to_string(), ColumnRole::Key)
                    } else if let Some(field) = self.rate_field_name(name) {
                        (field, ColumnRole::Delta)
                    } else {
                        (name.clone(), ColumnRole::Plain)
                    };
                PlannedColumn {
                    name: name.clone(),
                    field,
                    role,
                }
            })
            .collect();
        ColumnPlan { columns }
    }

    /// First row only. Zero rows yield no record.
    pub fn single_row(
        &self,
        store: &mut RateStateStore,
        query: usize,
        result: &ResultSet,
        at: Timestamp,
    ) -> Result<Option<MetricRecord>, AssembleError> {
        let Some(row) = result.rows.first() else {
            return Ok(None);
        };
        let values = decode_row(query, 0, result.columns.len(), row)?;
        let plan = self.plan(&result.columns);
        let record = self.assemble_row(store, &plan, &values, None, QueryMode::SingleRow, at);
        Ok(non_empty(record))
    }

    /// One record per row; each row's delta columns form their own series.
    ///
    /// Fails with `MissingKeyColumn` if delta columns are present without a
    /// key column. All rows are decoded before any rate state is touched.
    pub fn multiple_rows(
        &self,
        store: &mut RateStateStore,
        query: usize,
        result: &ResultSet,
        at: Timestamp,
    ) -> Result<Vec<MetricRecord>, AssembleError> {
        let plan = self.plan(&result.columns);
        if plan.has_delta() && !plan.has_key() {
            return Err(AssembleError::MissingKeyColumn { query });
        }

        let rows = result
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| decode_row(query, i, result.columns.len(), row))
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for values in &rows {
            let row_key = if plan.has_delta() {
                Some(
                    self.keys
                        .derive(result.columns.as_slice(), values.as_slice())
                        .ok_or(AssembleError::MissingKeyColumn { query })?,
                )
            } else {
                None
            };
            let record = self.assemble_row(
                store,
                &plan,
                values,
                row_key.as_deref(),
                QueryMode::MultipleRows,
                at,
            );
            records.extend(non_empty(record));
        }
        Ok(records)
    }

    /// Rows are `(name, value)` pairs folded into a single record.
    ///
    /// A name ending with the delta marker is rate tracked under that
    /// name. Columns past the second are ignored.
    pub fn two_columns(
        &self,
        store: &mut RateStateStore,
        query: usize,
        result: &ResultSet,
        at: Timestamp,
    ) -> Result<Option<MetricRecord>, AssembleError> {
        // No rows may also mean no column metadata at all.
        if result.rows.is_empty() {
            return Ok(None);
        }
        if result.columns.len() < 2 {
            return Err(AssembleError::RowDecode {
                query,
                row: 0,
                expected: 2,
                found: result.columns.len(),
            });
        }
        let rows = result
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| decode_row(query, i, result.columns.len(), row))
            .collect::<Result<Vec<_>, _>>()?;

        let mut record = MetricRecord::new(QueryMode::TwoColumns, at);
        for values in &rows {
            let name = &values[0];
            let value = MetricValue::infer(&values[1]);
            match self.rate_field_name(name) {
                Some(field) => {
                    if let Some(rate) = store.observe(name, value, at) {
                        record.insert(field, rate);
                    }
                }
                None => record.insert(name.clone(), value),
            }
        }
        Ok(non_empty(record))
    }

    /// First row only, and only its `Seconds_Behind_Master` cell.
    pub fn slave_delay(
        &self,
        query: usize,
        result: &ResultSet,
        at: Timestamp,
    ) -> Result<Option<MetricRecord>, AssembleError> {
        let Some(row) = result.rows.first() else {
            return Ok(None);
        };
        let values = decode_row(query, 0, result.columns.len(), row)?;

        let mut record = MetricRecord::new(QueryMode::ShowSlaveDelay, at);
        if let Some(i) = result.columns.iter().position(|c| c == SLAVE_DELAY_COLUMN) {
            record.insert(SLAVE_DELAY_COLUMN, MetricValue::infer(&values[i]));
        }
        Ok(non_empty(record))
    }

    fn assemble_row(
        &self,
        store: &mut RateStateStore,
        plan: &ColumnPlan,
        values: &[String],
        row_key: Option<&str>,
        mode: QueryMode,
        at: Timestamp,
    ) -> MetricRecord {
        let mut record = MetricRecord::new(mode, at);
        for (column, raw) in plan.columns.iter().zip(values) {
            let value = MetricValue::infer(raw);
            match column.role {
                ColumnRole::Key | ColumnRole::Plain => record.insert(column.field.clone(), value),
                ColumnRole::Delta => {
                    let series = match row_key {
                        Some(row_key) => RowKeyDeriver::series_key(row_key, &column.name),
                        None => column.name.clone(),
                    };
                    if let Some(rate) = store.observe(&series, value, at) {
                        record.insert(column.field.clone(), rate);
                    }
                }
            }
        }
        record
    }
}

/// Check the cell count and read NULL as the empty string.
fn decode_row(
    query: usize,
    row: usize,
    expected: usize,
    cells: &[Option<String>],
) -> Result<Vec<String>, AssembleError> {
    if cells.len() != expected {
        return Err(AssembleError::RowDecode {
            query,
            row,
            expected,
            found: cells.len(),
        });
    }
    Ok(cells
        .iter()
        .map(|cell| cell.clone().unwrap_or_default())
        .collect())
}

fn non_empty(record: MetricRecord) -> Option<MetricRecord> {
    (!record.is_empty()).then_some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> EventAssembler {
        EventAssembler::new("_delta", "_key")
    }

    fn at(secs: u64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    #[test]
    fn test_single_row_cold_start_then_rate() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let columns = ["Threads_running", "Queries_delta"];

        let first = ResultSet::from_rows(&columns, &[&["5", "100"]]);
        let record = assembler
            .single_row(&mut store, 0, &first, at(0))
            .unwrap()
            .unwrap();
        assert_eq!(record.get("Threads_running"), Some(&MetricValue::Integer(5)));
        assert_eq!(record.get("Queries_PERSECOND"), None);
        assert_eq!(record.len(), 1);

        let second = ResultSet::from_rows(&columns, &[&["7", "150"]]);
        let record = assembler
            .single_row(&mut store, 0, &second, at(10))
            .unwrap()
            .unwrap();
        assert_eq!(record.get("Threads_running"), Some(&MetricValue::Integer(7)));
        assert_eq!(record.get("Queries_PERSECOND"), Some(&MetricValue::Integer(5)));
    }

    #[test]
    fn test_single_row_only_delta_cold_start_is_suppressed() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let result = ResultSet::from_rows(&["Queries_delta"], &[&["100"]]);
        assert_eq!(assembler.single_row(&mut store, 0, &result, at(0)).unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_single_row_strips_key_marker() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let result = ResultSet::from_rows(&["host_key", "uptime"], &[&["db1", "3600"]]);
        let record = assembler
            .single_row(&mut store, 0, &result, at(0))
            .unwrap()
            .unwrap();
        assert_eq!(record.get("host"), Some(&MetricValue::from("db1")));
        assert_eq!(record.get("uptime"), Some(&MetricValue::Integer(3600)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_single_row_ignores_extra_rows_and_empty_result() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let result = ResultSet::from_rows(&["a"], &[&["1"], &["2"]]);
        let record = assembler
            .single_row(&mut store, 0, &result, at(0))
            .unwrap()
            .unwrap();
        assert_eq!(record.get("a"), Some(&MetricValue::Integer(1)));

        let empty = ResultSet::empty(&["a"]);
        assert_eq!(assembler.single_row(&mut store, 0, &empty, at(0)).unwrap(), None);
    }

    #[test]
    fn test_null_cell_reads_as_empty_string() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let result = ResultSet::new(vec!["a".to_string()], vec![vec![None]]);
        let record = assembler
            .single_row(&mut store, 0, &result, at(0))
            .unwrap()
            .unwrap();
        assert_eq!(record.get("a"), Some(&MetricValue::from("")));
    }

    #[test]
    fn test_row_decode_mismatch() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let result = ResultSet::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Some("1".to_string())]],
        );
        let err = assembler
            .single_row(&mut store, 3, &result, at(0))
            .unwrap_err();
        assert_eq!(
            err,
            AssembleError::RowDecode {
                query: 3,
                row: 0,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_multiple_rows_isolates_series_per_row() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let columns = ["user_key", "ops_delta"];

        let first = ResultSet::from_rows(&columns, &[&["app", "100"], &["batch", "100"]]);
        let records = assembler
            .multiple_rows(&mut store, 0, &first, at(0))
            .unwrap();
        // Key fields keep the cold-start records alive.
        assert_eq!(records.len(), 2);
        assert_eq!(store.len(), 2);

        let second = ResultSet::from_rows(&columns, &[&["app", "200"], &["batch", "110"]]);
        let records = assembler
            .multiple_rows(&mut store, 0, &second, at(10))
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("user"), Some(&MetricValue::from("app")));
        assert_eq!(records[0].get("ops_PERSECOND"), Some(&MetricValue::Integer(10)));
        assert_eq!(records[1].get("user"), Some(&MetricValue::from("batch")));
        assert_eq!(records[1].get("ops_PERSECOND"), Some(&MetricValue::Integer(1)));
    }

    #[test]
    fn test_multiple_rows_row_order_does_not_matter() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let columns = ["id_key", "n_delta"];

        let first = ResultSet::from_rows(&columns, &[&["1", "0"], &["2", "0"]]);
        assembler.multiple_rows(&mut store, 0, &first, at(0)).unwrap();

        let swapped = ResultSet::from_rows(&columns, &[&["2", "50"], &["1", "10"]]);
        let records = assembler
            .multiple_rows(&mut store, 0, &swapped, at(10))
            .unwrap();
        assert_eq!(records[0].get("id"), Some(&MetricValue::Integer(2)));
        assert_eq!(records[0].get("n_PERSECOND"), Some(&MetricValue::Integer(5)));
        assert_eq!(records[1].get("n_PERSECOND"), Some(&MetricValue::Integer(1)));
    }

    #[test]
    fn test_multiple_rows_requires_key_for_delta() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let result = ResultSet::from_rows(&["name", "n_delta"], &[&["a", "1"]]);
        let err = assembler
            .multiple_rows(&mut store, 4, &result, at(0))
            .unwrap_err();
        assert_eq!(err, AssembleError::MissingKeyColumn { query: 4 });
        assert!(store.is_empty(), "no state may change on failure");
    }

    #[test]
    fn test_multiple_rows_without_delta_needs_no_key() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let result = ResultSet::from_rows(&["name", "n"], &[&["a", "1"], &["b", "2"]]);
        let records = assembler
            .multiple_rows(&mut store, 0, &result, at(0))
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_multiple_rows_decode_failure_touches_no_state() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let result = ResultSet::new(
            vec!["id_key".to_string(), "n_delta".to_string()],
            vec![
                vec![Some("1".to_string()), Some("5".to_string())],
                vec![Some("2".to_string())],
            ],
        );
        let err = assembler
            .multiple_rows(&mut store, 0, &result, at(0))
            .unwrap_err();
        assert!(matches!(err, AssembleError::RowDecode { row: 1, .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_two_columns_folds_rows() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let columns = ["Variable_name", "Value"];

        let first = ResultSet::from_rows(
            &columns,
            &[&["Uptime", "100"], &["Com_select_delta", "1000"], &["version", "8.0"]],
        );
        let record = assembler
            .two_columns(&mut store, 0, &first, at(0))
            .unwrap()
            .unwrap();
        assert_eq!(record.mode, QueryMode::TwoColumns);
        assert_eq!(record.get("Uptime"), Some(&MetricValue::Integer(100)));
        assert_eq!(record.get("version"), Some(&MetricValue::Float(8.0)));
        assert_eq!(record.get("Com_select_PERSECOND"), None);

        let second = ResultSet::from_rows(
            &columns,
            &[&["Uptime", "105"], &["Com_select_delta", "1012"]],
        );
        let record = assembler
            .two_columns(&mut store, 0, &second, at(5))
            .unwrap()
            .unwrap();
        assert_eq!(record.get("Com_select_PERSECOND"), Some(&MetricValue::Integer(2)));
    }

    #[test]
    fn test_two_columns_empty_and_narrow() {
        let assembler = assembler();
        let mut store = RateStateStore::new();
        let empty = ResultSet::empty(&["Variable_name", "Value"]);
        assert_eq!(assembler.two_columns(&mut store, 0, &empty, at(0)).unwrap(), None);

        // Zero rows from the server arrive without column names.
        let bare = ResultSet::default();
        assert_eq!(assembler.two_columns(&mut store, 0, &bare, at(0)).unwrap(), None);

        let narrow = ResultSet::from_rows(&["Variable_name"], &[&["x"]]);
        assert!(matches!(
            assembler.two_columns(&mut store, 0, &narrow, at(0)),
            Err(AssembleError::RowDecode { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_slave_delay_keeps_only_delay_column() {
        let assembler = assembler();
        let result = ResultSet::from_rows(
            &["Slave_IO_Running", "Seconds_Behind_Master", "Other_Column"],
            &[&["Yes", "3", "x"]],
        );
        let record = assembler.slave_delay(0, &result, at(0)).unwrap().unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.get(SLAVE_DELAY_COLUMN), Some(&MetricValue::Integer(3)));
    }

    #[test]
    fn test_slave_delay_without_column_or_rows() {
        let assembler = assembler();
        let no_column = ResultSet::from_rows(&["Other_Column"], &[&["x"]]);
        assert_eq!(assembler.slave_delay(0, &no_column, at(0)).unwrap(), None);

        let no_rows = ResultSet::empty(&["Seconds_Behind_Master"]);
        assert_eq!(assembler.slave_delay(0, &no_rows, at(0)).unwrap(), None);
    }

    #[test]
    fn test_rate_field_name() {
        let assembler = assembler();
        assert_eq!(
            assembler.rate_field_name("Queries_delta"),
            Some("Queries_PERSECOND".to_string())
        );
        assert_eq!(assembler.rate_field_name("Queries"), None);
        assert_eq!(
            assembler.rate_field_name("_delta"),
            Some("_PERSECOND".to_string())
        );
    }
}
