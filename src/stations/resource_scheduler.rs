//! The resource scheduler drives one resource's capacity through a cyclic
//! schedule - a shift roster.  At each phase boundary it applies the next
//! phase's capacity; a raise triggers the grant cascade, a cut never
//! revokes claims already granted.

use super::{Station, StationId, Wake};
use crate::resources::ResourceId;
use crate::schedule::Schedule;
use crate::scheduler::Target;
use crate::simulator::Kernel;
use crate::utils::errors::SimulationError;

pub struct ResourceScheduler {
    name: String,
    resource: ResourceId,
    capacities: Schedule<usize>,
    phase: usize,
}

impl ResourceScheduler {
    pub(crate) fn new(name: &str, resource: ResourceId, capacities: Schedule<usize>) -> Self {
        Self {
            name: name.to_string(),
            resource,
            capacities,
            phase: 0,
        }
    }

    fn apply_phase(&mut self, kernel: &mut Kernel, id: StationId) -> Result<(), SimulationError> {
        let phase = self.capacities.phase(self.phase);
        kernel.set_capacity(self.resource, phase.value)?;
        kernel.hold(Target::Station(id), phase.duration);
        Ok(())
    }
}

impl Station for ResourceScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, kernel: &mut Kernel, id: StationId) -> Result<(), SimulationError> {
        self.phase = 0;
        self.apply_phase(kernel, id)
    }

    fn wake(
        &mut self,
        kernel: &mut Kernel,
        id: StationId,
        wake: Wake,
    ) -> Result<(), SimulationError> {
        match wake {
            Wake::Timer => {
                self.phase = (self.phase + 1) % self.capacities.len();
                self.apply_phase(kernel, id)
            }
            _ => Err(SimulationError::InvalidStationState),
        }
    }
}
