//! Per-series rate tracking across polling cycles
//!
//! The store remembers the last value and observation time of every
//! series key it has seen. On each re-observation it turns the difference
//! into a per-second rate and replaces the stored baseline.
//!
//! Rates are never negative: a value that went down (counter reset) or
//! stayed flat reports `0`.

use super::value::{MetricValue, ValueKind};
use crate::clock::Timestamp;
use ahash::AHashMap;
use std::time::Duration;
use tracing::trace;

/// Last observation of one series
#[derive(Debug, Clone, PartialEq)]
pub struct RateState {
    pub value: MetricValue,
    pub observed_at: Timestamp,
}

/// Process-lifetime map from series key to its last observation
///
/// Owned by the polling loop; nothing else mutates it.
#[derive(Debug, Default)]
pub struct RateStateStore {
    states: AHashMap<String, RateState>,
}

impl RateStateStore {
    pub fn new() -> Self {
        RateStateStore {
            states: AHashMap::new(),
        }
    }

    /// Record `value` for `key` at `observed_at` and return the rate since
    /// the previous observation.
    ///
    /// Returns `None` on cold start, when no time has elapsed, and when a
    /// series switches between text and numbers. A text value that follows
    /// a previous observation is returned unchanged in place of a rate.
    /// The stored baseline is replaced in every case.
    pub fn observe(
        &mut self,
        key: &str,
        value: MetricValue,
        observed_at: Timestamp,
    ) -> Option<MetricValue> {
        let current = RateState { value, observed_at };

        let prior = match self.states.get_mut(key) {
            Some(slot) => std::mem::replace(slot, current),
            None => {
                trace!(key, "cold start");
                self.states.insert(key.to_string(), current);
                return None;
            }
        };
        let current = self.states.get(key)?;

        compute_rate(&prior, current, key)
    }

    pub fn get(&self, key: &str) -> Option<&RateState> {
        self.states.get(key)
    }

    /// Drop series not observed within `ttl` of `now`. Returns how many were removed.
    pub fn evict_stale(&mut self, now: Timestamp, ttl: Duration) -> usize {
        let before = self.states.len();
        self.states
            .retain(|_, state| now.saturating_sub(state.observed_at) <= ttl);
        before - self.states.len()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

fn compute_rate(prior: &RateState, current: &RateState, key: &str) -> Option<MetricValue> {
    if let MetricValue::String(raw) = &current.value {
        return Some(MetricValue::String(raw.clone()));
    }
    if prior.value.kind() == ValueKind::String {
        trace!(key, "series changed from text to numeric, new baseline");
        return None;
    }

    let elapsed = current.observed_at.seconds_since(prior.observed_at);
    if elapsed <= 0.0 {
        trace!(key, elapsed, "no time elapsed since previous observation");
        return None;
    }

    match (&prior.value, &current.value) {
        (MetricValue::Integer(old), MetricValue::Integer(new)) => {
            if new > old {
                let diff = (*new as i128 - *old as i128) as f64;
                Some(MetricValue::Integer(round_half_up(diff / elapsed)))
            } else {
                Some(MetricValue::Integer(0))
            }
        }
        (old, MetricValue::Integer(new)) => {
            let old = old.as_f64()?;
            let new = *new as f64;
            if new > old {
                Some(MetricValue::Integer(round_half_up((new - old) / elapsed)))
            } else {
                Some(MetricValue::Integer(0))
            }
        }
        (old, MetricValue::Float(new)) => {
            let old = old.as_f64()?;
            if *new > old {
                Some(MetricValue::Float((new - old) / elapsed))
            } else {
                Some(MetricValue::Float(0.0))
            }
        }
        (_, MetricValue::String(_)) => None,
    }
}

/// Round to an integer, sending a fractional part of `0.5` or more up.
///
/// `2.5 -> 3`, `2.49 -> 2`, `-2.5 -> -3` (the fraction of a negative
/// number is negative, so it always floors).
pub fn round_half_up(value: f64) -> i64 {
    let rounded = if value.fract() >= 0.5 {
        value.ceil()
    } else {
        value.floor()
    };
    rounded as i64
}
