//! Row-to-metric transformation
//!
//! - **value**: classify raw cells as integer, float or string
//! - **rate**: per-series previous values and per-second rates
//! - **key**: row identity for multi-row result sets
//! - **assembler**: build records from result sets, one strategy per mode
//! - **dispatch**: route a query's result set by its mode

mod assembler;
mod dispatch;
mod key;
mod rate;
mod record;
mod value;

pub use assembler::{EventAssembler, PER_SECOND_SUFFIX, SLAVE_DELAY_COLUMN};
pub use dispatch::QueryDispatcher;
pub use key::RowKeyDeriver;
pub use rate::{round_half_up, RateState, RateStateStore};
pub use record::{MetricRecord, QueryMode, TIMESTAMP_FIELD, TYPE_FIELD};
pub use value::{parse_int, MetricValue, ValueKind};
