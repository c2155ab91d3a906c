//! The stations module provides the vocabulary of flow-network nodes -
//! single-item processing, time-varying generation, batching, fan-in
//! collation, round-trip delivery, and capacity scheduling.  Stations are
//! explicit state machines resumed by the event calendar; the common
//! requirements are specified by the `Station` trait.

use crate::resources::ResourceRequest;
use crate::scheduler::Cause;
use crate::simulator::Kernel;
use crate::utils::errors::SimulationError;

pub mod batcher;
pub mod collator;
pub mod delivery;
pub mod generator;
pub mod process;
pub mod resource_scheduler;

pub use self::batcher::{BatchSize, Batcher};
pub use self::collator::Collator;
pub use self::delivery::DeliveryProcess;
pub use self::generator::Generator;
pub use self::process::{Action, ActivationId, Frame, Process, Script};
pub use self::resource_scheduler::ResourceScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StationId(pub usize);

/// The reason a station is being resumed by the dispatch loop.
#[derive(Debug, Clone, Copy)]
pub enum Wake {
    /// A token arrived on the station's input store
    Input,
    /// A station-level timed hold elapsed
    Timer,
    /// A station-level resource request was granted
    Granted,
    /// A token-script activation hosted by the station is resumable
    Script(ActivationId, Cause),
}

/// A multi-line resource request awaiting an atomic grant of every line.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub(crate) requests: Vec<ResourceRequest>,
}

impl PendingRequest {
    pub fn new(requests: Vec<ResourceRequest>) -> Self {
        Self { requests }
    }
}

/// Every station consumes tokens from at most one input store and reacts
/// to calendar wakeups.  Stations never call into each other; all shared
/// state is reached through the kernel.
pub trait Station {
    fn name(&self) -> &str;

    /// Called once before the first event is dispatched, to seed the
    /// calendar with the station's initial activity.
    fn init(&mut self, kernel: &mut Kernel, id: StationId) -> Result<(), SimulationError> {
        let _ = (kernel, id);
        Ok(())
    }

    fn wake(
        &mut self,
        kernel: &mut Kernel,
        id: StationId,
        wake: Wake,
    ) -> Result<(), SimulationError>;
}
