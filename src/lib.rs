pub mod beat;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod publish;
pub mod source;

pub use beat::{Beat, CycleReport};
pub use clock::{Clock, SimulatedClock, SystemClock, Timestamp};
pub use config::{BeatConfig, Query};
pub use error::{AssembleError, BeatError, ConfigError, PublishError, SourceError};
pub use metrics::{MetricRecord, MetricValue, QueryMode, RateStateStore};
