//! Publishing boundary
//!
//! Finished records are handed over one at a time, in query order then
//! row order. Delivery concerns (batching, retries, transport) belong to
//! the publisher implementation.

use crate::error::PublishError;
use crate::metrics::MetricRecord;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

pub trait Publisher: Send {
    fn publish(&mut self, record: MetricRecord) -> Result<(), PublishError>;

    /// Flush buffered output. Called once per cycle.
    fn flush(&mut self) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Writes each record as one line of JSON
pub struct JsonLinesPublisher<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesPublisher { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesPublisher<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> Publisher for JsonLinesPublisher<W> {
    fn publish(&mut self, record: MetricRecord) -> Result<(), PublishError> {
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PublishError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Collects records in memory; clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemoryPublisher {
    records: Arc<Mutex<Vec<MetricRecord>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything published so far
    pub fn take(&self) -> Vec<MetricRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&mut self, record: MetricRecord) -> Result<(), PublishError> {
        self.records.lock().push(record);
        Ok(())
    }
}
