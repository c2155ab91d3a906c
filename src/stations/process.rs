//! The single-item processing station.  A `Process` launches one script
//! activation per token taken from its input store; each activation is an
//! explicit frame (token, program counter, held claims, pending request)
//! suspended at resource requests and timed holds and resumed by the
//! event calendar.  Scripts are the extension seam of the engine: domain
//! workflows implement `Script` and are registered through the
//! simulation's `add_process`.

use log::warn;

use super::{PendingRequest, Station, StationId, Wake};
use crate::resources::{ResourceId, ResourceRequest};
use crate::scheduler::{Cause, Target};
use crate::simulator::Kernel;
use crate::store::StoreId;
use crate::tokens::{Location, TokenId};
use crate::utils::errors::SimulationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivationId(pub usize);

/// The mutable execution state of one token moving through one script.
/// `pc` is the program counter the script is resumed at; scripts set the
/// continuation explicitly in each returned action, which is how branches
/// and conditional holds are expressed.
#[derive(Debug)]
pub struct Frame {
    pub token: TokenId,
    pub station: StationId,
    pub pc: usize,
    pub held: Vec<(ResourceId, usize)>,
    pub(crate) pending: Option<PendingRequest>,
}

/// What a script does next.  `Request` and `Hold` are the suspension
/// points; `Forward`, `ForwardSorted`, and `Park` end the activation, with
/// the script responsible for sending its token onward.
#[derive(Debug, Clone)]
pub enum Action {
    /// Suspend until every listed (resource, quantity, priority) line is
    /// granted, then resume at `next`
    Request {
        requests: Vec<ResourceRequest>,
        next: usize,
    },
    /// Suspend for `duration`, then resume at `next`
    Hold { duration: f64, next: usize },
    /// Append the token to a downstream store, FIFO
    Forward { store: StoreId },
    /// Insert the token into a downstream store by its priority
    ForwardSorted { store: StoreId },
    /// Leave the token at rest, awaiting collation of its children
    Park,
}

/// A token script.  `resume` is called with the activation frame at its
/// current program counter; everything between two suspension points runs
/// synchronously inside one call, including attribute mutation, child
/// spawning, releases, and counter updates through the kernel.
pub trait Script {
    fn resume(&self, frame: &mut Frame, kernel: &mut Kernel) -> Result<Action, SimulationError>;
}

/// The in-flight activations of all processing stations.  Slots are
/// recycled after an activation retires.
#[derive(Debug, Default)]
pub struct Activations {
    slots: Vec<Option<Frame>>,
    free: Vec<usize>,
}

impl Activations {
    pub(crate) fn create(&mut self, station: StationId, token: TokenId) -> ActivationId {
        let frame = Frame {
            token,
            station,
            pc: 0,
            held: Vec::new(),
            pending: None,
        };
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(frame);
                ActivationId(slot)
            }
            None => {
                self.slots.push(Some(frame));
                ActivationId(self.slots.len() - 1)
            }
        }
    }

    pub(crate) fn take(&mut self, id: ActivationId) -> Result<Frame, SimulationError> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(SimulationError::ActivationNotFound)
    }

    pub(crate) fn put(&mut self, id: ActivationId, frame: Frame) {
        self.slots[id.0] = Some(frame);
    }

    pub(crate) fn retire(&mut self, id: ActivationId) {
        self.free.push(id.0);
    }

    pub(crate) fn station_of(&self, id: ActivationId) -> Result<StationId, SimulationError> {
        self.slots
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .map(|frame| frame.station)
            .ok_or(SimulationError::ActivationNotFound)
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

pub struct Process {
    name: String,
    input: StoreId,
    script: Box<dyn Script>,
}

impl Process {
    pub(crate) fn new(name: &str, input: StoreId, script: Box<dyn Script>) -> Self {
        Self {
            name: name.to_string(),
            input,
            script,
        }
    }

    /// Steps an activation until its next suspension point.  Non-blocking
    /// actions continue in the same call; a blocked request or a timed
    /// hold parks the frame back in the kernel.
    fn drive(
        &self,
        kernel: &mut Kernel,
        activation: ActivationId,
        granted: bool,
    ) -> Result<(), SimulationError> {
        let mut frame = kernel.activations.take(activation)?;
        if granted
            && !kernel.acquire(
                Target::Activation(activation),
                &mut frame.held,
                &mut frame.pending,
                true,
            )?
        {
            kernel.activations.put(activation, frame);
            return Ok(());
        }
        loop {
            match self.script.resume(&mut frame, kernel)? {
                Action::Hold { duration, next } => {
                    frame.pc = next;
                    kernel.hold(Target::Activation(activation), duration);
                    kernel.activations.put(activation, frame);
                    return Ok(());
                }
                Action::Request { requests, next } => {
                    frame.pc = next;
                    frame.pending = Some(PendingRequest::new(requests));
                    if !kernel.acquire(
                        Target::Activation(activation),
                        &mut frame.held,
                        &mut frame.pending,
                        false,
                    )? {
                        kernel.activations.put(activation, frame);
                        return Ok(());
                    }
                }
                Action::Forward { store } => {
                    return self.finish(kernel, activation, frame, Some((store, false)));
                }
                Action::ForwardSorted { store } => {
                    return self.finish(kernel, activation, frame, Some((store, true)));
                }
                Action::Park => {
                    return self.finish(kernel, activation, frame, None);
                }
            }
        }
    }

    fn finish(
        &self,
        kernel: &mut Kernel,
        activation: ActivationId,
        mut frame: Frame,
        destination: Option<(StoreId, bool)>,
    ) -> Result<(), SimulationError> {
        if !frame.held.is_empty() {
            warn!(
                "station {}: script finished holding {} claim(s), releasing",
                self.name,
                frame.held.len()
            );
            kernel.release(&mut frame.held, None)?;
        }
        match destination {
            Some((store, false)) => kernel.enter(store, frame.token)?,
            Some((store, true)) => {
                let priority = kernel.token(frame.token)?.priority();
                kernel.enter_sorted(store, frame.token, priority)?;
            }
            None => kernel.token_mut(frame.token)?.location = Location::Parked,
        }
        kernel.activations.retire(activation);
        Ok(())
    }
}

impl Station for Process {
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
            Wake::Input => {
                while let Some(token) = kernel.take(self.input, id)? {
                    let activation = kernel.activations.create(id, token);
                    self.drive(kernel, activation, false)?;
                }
                Ok(())
            }
            Wake::Script(activation, Cause::Granted) => self.drive(kernel, activation, true),
            Wake::Script(activation, Cause::Timer) => self.drive(kernel, activation, false),
            _ => Err(SimulationError::InvalidStationState),
        }
    }
}
