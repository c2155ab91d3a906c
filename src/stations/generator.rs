//! The generator produces tokens whose inter-arrival times follow a
//! memoryless process with a rate that changes at the boundaries of a
//! cyclic schedule.  Within a phase the inter-arrival times are
//! exponential with that phase's rate; a zero-rate phase produces nothing
//! for its duration.  Sampling starts fresh in each phase - no residual
//! inter-arrival time is carried across a boundary.

use super::{Station, StationId, Wake};
use crate::input_modeling::random_variable::Continuous;
use crate::schedule::Schedule;
use crate::scheduler::Target;
use crate::simulator::Kernel;
use crate::store::StoreId;
use crate::tokens::Priority;
use crate::utils::errors::SimulationError;

pub struct Generator {
    name: String,
    output: StoreId,
    arrival_rates: Schedule<f64>,
    priority: Priority,
    state: State,
}

#[derive(Debug, Default)]
struct State {
    phase: usize,
    phase_end: f64,
    next_is_arrival: bool,
}

impl Generator {
    pub(crate) fn new(
        name: &str,
        output: StoreId,
        arrival_rates: Schedule<f64>,
        priority: Priority,
    ) -> Self {
        Self {
            name: name.to_string(),
            output,
            arrival_rates,
            priority,
            state: State::default(),
        }
    }

    fn begin_phase(&mut self, kernel: &mut Kernel, id: StationId) -> Result<(), SimulationError> {
        let now = kernel.now();
        self.state.phase_end = now + self.arrival_rates.phase(self.state.phase).duration;
        self.schedule_next(kernel, id)
    }

    /// Schedules either the next arrival within the current phase, or the
    /// phase boundary when the sampled arrival would fall past it.
    fn schedule_next(&mut self, kernel: &mut Kernel, id: StationId) -> Result<(), SimulationError> {
        let now = kernel.now();
        let rate = self.arrival_rates.phase(self.state.phase).value;
        let arrival_at = if rate > 0.0 {
            let interarrival = kernel.sample(&Continuous::Exp { lambda: rate })?;
            Some(now + interarrival)
        } else {
            None
        };
        match arrival_at {
            Some(at) if at < self.state.phase_end => {
                self.state.next_is_arrival = true;
                kernel
                    .calendar
                    .schedule(at, now, Target::Station(id), crate::scheduler::Cause::Timer);
            }
            _ => {
                self.state.next_is_arrival = false;
                kernel.calendar.schedule(
                    self.state.phase_end,
                    now,
                    Target::Station(id),
                    crate::scheduler::Cause::Timer,
                );
            }
        }
        Ok(())
    }
}

impl Station for Generator {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, kernel: &mut Kernel, id: StationId) -> Result<(), SimulationError> {
        self.state.phase = 0;
        self.begin_phase(kernel, id)
    }

    fn wake(
        &mut self,
        kernel: &mut Kernel,
        id: StationId,
        wake: Wake,
    ) -> Result<(), SimulationError> {
        match wake {
            Wake::Timer => {
                let now = kernel.now();
                if self.state.next_is_arrival && now < self.state.phase_end {
                    let token = kernel.create_token(self.priority);
                    kernel.enter(self.output, token)?;
                    self.schedule_next(kernel, id)
                } else {
                    self.state.phase = (self.state.phase + 1) % self.arrival_rates.len();
                    self.begin_phase(kernel, id)
                }
            }
            _ => Err(SimulationError::InvalidStationState),
        }
    }
}
