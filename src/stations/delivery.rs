//! The delivery process is a shuttle: it carries one token at a time from
//! its input to a remote output store and then travels back empty.  The
//! carrier resource is claimed before departure, at the cargo's priority,
//! and held for the full round trip.  Aggregate cargo is unbatched on
//! arrival - each member enters the output store by its own priority and
//! the shell retires.

use log::debug;

use super::{PendingRequest, Station, StationId, Wake};
use crate::resources::{ResourceId, ResourceRequest};
use crate::scheduler::Target;
use crate::simulator::Kernel;
use crate::store::StoreId;
use crate::tokens::{Location, TokenId};
use crate::utils::errors::SimulationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingCarrier,
    Outbound,
    Returning,
}

pub struct DeliveryProcess {
    name: String,
    input: StoreId,
    output: StoreId,
    carrier: ResourceId,
    out_duration: f64,
    return_duration: f64,
    state: State,
}

struct State {
    phase: Phase,
    cargo: Option<TokenId>,
    held: Vec<(ResourceId, usize)>,
    pending: Option<PendingRequest>,
}

impl DeliveryProcess {
    pub(crate) fn new(
        name: &str,
        input: StoreId,
        output: StoreId,
        carrier: ResourceId,
        out_duration: f64,
        return_duration: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            input,
            output,
            carrier,
            out_duration,
            return_duration,
            state: State {
                phase: Phase::Idle,
                cargo: None,
                held: Vec::new(),
                pending: None,
            },
        }
    }

    /// Picks up the next waiting token, if any, and requests the carrier
    /// at the cargo's priority.  A shuttle mid-trip ignores arrivals; the
    /// return leg ends with a fresh input check.
    fn pick_up(&mut self, kernel: &mut Kernel, id: StationId) -> Result<(), SimulationError> {
        if self.state.phase != Phase::Idle {
            return Ok(());
        }
        let cargo = match kernel.take(self.input, id)? {
            Some(cargo) => cargo,
            None => return Ok(()),
        };
        let priority = kernel.token(cargo)?.priority();
        self.state.cargo = Some(cargo);
        self.state.phase = Phase::AwaitingCarrier;
        self.state.pending = Some(PendingRequest::new(vec![ResourceRequest {
            resource: self.carrier,
            quantity: 1,
            priority,
        }]));
        if kernel.acquire(
            Target::Station(id),
            &mut self.state.held,
            &mut self.state.pending,
            false,
        )? {
            self.depart(kernel, id);
        }
        Ok(())
    }

    fn depart(&mut self, kernel: &mut Kernel, id: StationId) {
        debug!("station {}: departing with {:?}", self.name, self.state.cargo);
        self.state.phase = Phase::Outbound;
        kernel.hold(Target::Station(id), self.out_duration);
    }

    /// Drops the cargo at the output store.  Aggregate shells are opened:
    /// members enter by their own priorities and the shell retires.
    fn deliver(&mut self, kernel: &mut Kernel) -> Result<(), SimulationError> {
        let cargo = self
            .state
            .cargo
            .take()
            .ok_or(SimulationError::InvalidStationState)?;
        let token = kernel.token(cargo)?;
        if token.aggregate {
            let members = token.children.clone();
            for member in members {
                let priority = kernel.token(member)?.priority();
                kernel.enter_sorted(self.output, member, priority)?;
            }
            kernel.token_mut(cargo)?.location = Location::Retired;
        } else {
            kernel.enter(self.output, cargo)?;
        }
        Ok(())
    }
}

impl Station for DeliveryProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn wake(
        &mut self,
        kernel: &mut Kernel,
        id: StationId,
        wake: Wake,
    ) -> Result<(), SimulationError> {
        match wake {
            Wake::Input => self.pick_up(kernel, id),
            Wake::Granted => {
                if self.state.phase != Phase::AwaitingCarrier {
                    return Err(SimulationError::InvalidStationState);
                }
                if kernel.acquire(
                    Target::Station(id),
                    &mut self.state.held,
                    &mut self.state.pending,
                    true,
                )? {
                    self.depart(kernel, id);
                }
                Ok(())
            }
            Wake::Timer => match self.state.phase {
                Phase::Outbound => {
                    self.deliver(kernel)?;
                    self.state.phase = Phase::Returning;
                    kernel.hold(Target::Station(id), self.return_duration);
                    Ok(())
                }
                Phase::Returning => {
                    kernel.release(&mut self.state.held, Some(self.carrier))?;
                    self.state.phase = Phase::Idle;
                    kernel.wake_station(id);
                    Ok(())
                }
                _ => Err(SimulationError::InvalidStationState),
            },
            _ => Err(SimulationError::InvalidStationState),
        }
    }
}
