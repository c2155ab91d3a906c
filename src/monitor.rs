//! The observability surface of the engine.  A `Monitor` records a level
//! time series - (timestamp, value) pairs - and `Counters` holds the named
//! domain counters (work-in-progress and the like) that scripts maintain.
//! Aggregation and plotting of these series happen outside the engine.

use std::collections::HashMap;

use serde::Serialize;

use crate::utils::errors::SimulationError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Monitor {
    series: Vec<(f64, f64)>,
}

impl Monitor {
    pub fn record(&mut self, time: f64, value: f64) {
        self.series.push((time, value));
    }

    pub fn series(&self) -> &[(f64, f64)] {
        &self.series
    }

    pub fn last(&self) -> Option<f64> {
        self.series.last().map(|(_, value)| *value)
    }

    /// The mean of the recorded level, weighted by the time each value was
    /// held, evaluated over [first timestamp, until].  Returns `None` for
    /// an empty series or a zero-length window.
    pub fn time_weighted_mean(&self, until: f64) -> Option<f64> {
        let first = self.series.first()?.0;
        if until <= first {
            return None;
        }
        let mut weighted = 0.0;
        for (index, (time, value)) in self.series.iter().enumerate() {
            let end = self
                .series
                .get(index + 1)
                .map(|(next, _)| *next)
                .unwrap_or(until)
                .min(until);
            if end > *time {
                weighted += value * (end - time);
            }
        }
        Some(weighted / (until - first))
    }

    pub fn to_json(&self) -> Result<String, SimulationError> {
        Ok(serde_json::to_string(&self.series)?)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Counter {
    name: String,
    value: i64,
    monitor: Monitor,
}

impl Counter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

/// Named counters, created on first use.  Each mutation is recorded in the
/// counter's monitor, so the full (timestamp, value) history is available
/// at the end of a run.
#[derive(Debug, Default)]
pub struct Counters {
    counters: Vec<Counter>,
    index: HashMap<String, usize>,
}

impl Counters {
    pub fn add(&mut self, name: &str, time: f64, delta: i64) -> i64 {
        let slot = match self.index.get(name) {
            Some(slot) => *slot,
            None => {
                let slot = self.counters.len();
                self.counters.push(Counter {
                    name: name.to_string(),
                    value: 0,
                    monitor: Monitor::default(),
                });
                self.index.insert(name.to_string(), slot);
                slot
            }
        };
        let counter = &mut self.counters[slot];
        counter.value += delta;
        counter.monitor.record(time, counter.value as f64);
        counter.value
    }

    pub fn value(&self, name: &str) -> i64 {
        self.index
            .get(name)
            .map(|slot| self.counters[*slot].value)
            .unwrap_or(0)
    }

    pub fn get(&self, name: &str) -> Option<&Counter> {
        self.index.get(name).map(|slot| &self.counters[*slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Counter> {
        self.counters.iter()
    }
}
