//! Cyclic timetables.  A schedule is an ordered list of (duration, value)
//! phases, replayed forever.  Resource capacity schedules carry unit counts
//! and arrival schedules carry rate parameters; both share the same
//! construction-time validation so that malformed configuration fails
//! before a simulation runs.

use serde::{Deserialize, Serialize};

use crate::utils::errors::SimulationError;

/// Values a schedule phase may carry.  Capacities (`usize`) are
/// non-negative by construction; rates (`f64`) are validated.
pub trait ScheduleValue: Copy {
    fn is_valid(&self) -> bool;
}

impl ScheduleValue for usize {
    fn is_valid(&self) -> bool {
        true
    }
}

impl ScheduleValue for f64 {
    fn is_valid(&self) -> bool {
        self.is_finite() && *self >= 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase<V> {
    pub duration: f64,
    pub value: V,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule<V: ScheduleValue> {
    phases: Vec<Phase<V>>,
}

impl<V: ScheduleValue> Schedule<V> {
    /// Validates and constructs a cyclic schedule.  An empty cycle, a
    /// non-positive or non-finite duration, or an invalid value is a
    /// configuration error, surfaced here rather than at run time.
    pub fn new(phases: Vec<(f64, V)>) -> Result<Self, SimulationError> {
        if phases.is_empty() {
            return Err(SimulationError::EmptySchedule);
        }
        let phases: Vec<Phase<V>> = phases
            .into_iter()
            .map(|(duration, value)| Phase { duration, value })
            .collect();
        if phases
            .iter()
            .any(|phase| !phase.duration.is_finite() || phase.duration <= 0.0)
        {
            return Err(SimulationError::InvalidScheduleDuration);
        }
        if phases.iter().any(|phase| !phase.value.is_valid()) {
            return Err(SimulationError::InvalidScheduleValue);
        }
        Ok(Self { phases })
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Phase lookup is cyclic; index 0 repeats after the last phase.
    pub fn phase(&self, index: usize) -> &Phase<V> {
        &self.phases[index % self.phases.len()]
    }

    pub fn cycle_duration(&self) -> f64 {
        self.phases.iter().map(|phase| phase.duration).sum()
    }
}
