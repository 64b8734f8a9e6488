//! Query mode dispatch
//!
//! A query's mode is fixed when the configuration is validated; each
//! cycle its fresh result set goes to the assembler branch for that mode.

use super::assembler::EventAssembler;
use super::rate::RateStateStore;
use super::record::{MetricRecord, QueryMode};
use crate::clock::Timestamp;
use crate::config::Query;
use crate::error::AssembleError;
use crate::source::ResultSet;

#[derive(Debug, Clone)]
pub struct QueryDispatcher {
    assembler: EventAssembler,
}

impl QueryDispatcher {
    pub fn new(assembler: EventAssembler) -> Self {
        QueryDispatcher { assembler }
    }

    /// Turn one query's result set into records, in row order.
    ///
    /// On error nothing is returned for the query; records are never partial.
    pub fn dispatch(
        &self,
        store: &mut RateStateStore,
        query: &Query,
        result: &ResultSet,
        at: Timestamp,
    ) -> Result<Vec<MetricRecord>, AssembleError> {
        let assembler = &self.assembler;
        let records = match query.mode {
            QueryMode::SingleRow => assembler
                .single_row(store, query.index, result, at)?
                .into_iter()
                .collect(),
            QueryMode::MultipleRows => assembler.multiple_rows(store, query.index, result, at)?,
            QueryMode::TwoColumns => assembler
                .two_columns(store, query.index, result, at)?
                .into_iter()
                .collect(),
            QueryMode::ShowSlaveDelay => assembler
                .slave_delay(query.index, result, at)?
                .into_iter()
                .collect(),
        };
        Ok(records)
    }
}
