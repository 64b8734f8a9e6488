//! Polling loop
//!
//! One cycle runs every configured query in order, row by row, and hands
//! the finished records to the publisher. Cycles never overlap: the next
//! tick is not awaited until the current cycle has finished.
//!
//! Cancellation is only observed between cycles, so the rate state is
//! never left half-updated by a stop request.

use crate::clock::{Clock, Timestamp};
use crate::config::{BeatConfig, Query};
use crate::error::{BeatError, ConfigError};
use crate::metrics::{EventAssembler, QueryDispatcher, RateStateStore};
use crate::publish::Publisher;
use crate::source::QueryExecutor;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one successful cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    pub started_at: Timestamp,
    /// Records handed to the publisher
    pub records: usize,
    /// Queries whose result set was dropped without aborting the cycle
    pub skipped_queries: usize,
    /// Rate series evicted after the cycle
    pub evicted_series: usize,
}

pub struct Beat<E, P, C> {
    queries: Vec<Query>,
    dispatcher: QueryDispatcher,
    store: RateStateStore,
    executor: E,
    publisher: P,
    clock: C,
    period: Duration,
    state_ttl: Option<Duration>,
    stop_on_error: bool,
}

impl<E, P, C> Beat<E, P, C>
where
    E: QueryExecutor,
    P: Publisher,
    C: Clock,
{
    /// Validate `config` and build a beat. Fails before any connection is made.
    pub fn new(config: &BeatConfig, executor: E, publisher: P, clock: C) -> Result<Self, ConfigError> {
        let queries = config.validate()?;

        info!(total = queries.len(), "total # of queries to execute");
        for query in &queries {
            info!(index = query.index, mode = %query.mode, sql = %query.sql, "query");
        }

        Ok(Beat {
            queries,
            dispatcher: QueryDispatcher::new(EventAssembler::new(
                config.delta_suffix.clone(),
                config.delta_key_suffix.clone(),
            )),
            store: RateStateStore::new(),
            executor,
            publisher,
            clock,
            period: config.period,
            state_ttl: config.state_ttl,
            stop_on_error: config.stop_on_error,
        })
    }

    pub fn store(&self) -> &RateStateStore {
        &self.store
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn into_parts(self) -> (E, P) {
        (self.executor, self.publisher)
    }

    /// Poll every `period` until `shutdown` is cancelled.
    ///
    /// The first cycle starts immediately. A failed cycle stops the loop
    /// unless the beat was configured to keep going.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), BeatError> {
        info!(period_ms = self.period.as_millis() as u64, "sqlbeat is running");

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("stop requested, exiting polling loop");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.run_cycle().await {
                if self.stop_on_error {
                    error!(error = %e, "cycle failed, stopping");
                    return Err(e);
                }
                warn!(error = %e, "cycle failed, continuing with next tick");
            }
        }
    }

    /// Run every query once.
    ///
    /// A source failure or an undecodable row aborts the remaining queries.
    /// A multiple-rows query without a key column only loses its own records.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, BeatError> {
        let started = Instant::now();
        let started_at = self.clock.now();

        self.executor.connect().await?;
        let outcome = self.run_queries(started_at).await;
        self.executor.disconnect().await;

        let mut report = outcome?;
        self.publisher.flush()?;

        if let Some(ttl) = self.state_ttl {
            report.evicted_series = self.store.evict_stale(started_at, ttl);
            if report.evicted_series > 0 {
                debug!(evicted = report.evicted_series, "evicted stale rate series");
            }
        }

        debug!(
            records = report.records,
            skipped = report.skipped_queries,
            series = self.store.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle complete"
        );
        Ok(report)
    }

    async fn run_queries(&mut self, started_at: Timestamp) -> Result<CycleReport, BeatError> {
        let mut report = CycleReport {
            started_at,
            ..CycleReport::default()
        };

        for query in &self.queries {
            let result = self.executor.query(&query.sql).await.map_err(|e| {
                error!(index = query.index, error = %e, "query execution failed");
                e
            })?;

            match self
                .dispatcher
                .dispatch(&mut self.store, query, &result, started_at)
            {
                Ok(records) => {
                    debug!(index = query.index, rows = result.len(), records = records.len(), "query done");
                    for record in records {
                        self.publisher.publish(record)?;
                        report.records += 1;
                    }
                }
                Err(e) if e.is_query_scoped() => {
                    warn!(index = query.index, error = %e, "dropping query result");
                    report.skipped_queries += 1;
                }
                Err(e) => {
                    error!(index = query.index, error = %e, "failed to decode result set");
                    return Err(e.into());
                }
            }
        }

        Ok(report)
    }
}
