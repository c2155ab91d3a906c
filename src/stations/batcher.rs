//! The batcher accumulates tokens from its input store until a batch-size
//! threshold is reached, then constructs one aggregate token owning the
//! collected members in arrival order and deposits it downstream.  A new
//! batch begins accumulating immediately; when the size is configured as
//! a distribution it is re-sampled at the start of each batch.

use super::{Station, StationId, Wake};
use crate::input_modeling::random_variable::Discrete;
use crate::simulator::Kernel;
use crate::store::StoreId;
use crate::tokens::{Location, TokenId};
use crate::utils::errors::SimulationError;

/// Fixed batch sizes are validated at construction; a sampled size of
/// zero surfaces as an error when the batch opens, rather than hanging.
#[derive(Debug, Clone)]
pub enum BatchSize {
    Fixed(usize),
    Sampled(Discrete),
}

pub struct Batcher {
    name: String,
    input: StoreId,
    output: StoreId,
    batch_size: BatchSize,
    state: State,
}

#[derive(Debug, Default)]
struct State {
    target: Option<usize>,
    members: Vec<TokenId>,
}

impl Batcher {
    pub(crate) fn new(
        name: &str,
        input: StoreId,
        output: StoreId,
        batch_size: BatchSize,
    ) -> Result<Self, SimulationError> {
        if let BatchSize::Fixed(0) = batch_size {
            return Err(SimulationError::InvalidBatchSize);
        }
        Ok(Self {
            name: name.to_string(),
            input,
            output,
            batch_size,
            state: State::default(),
        })
    }

    /// The threshold for the batch currently accumulating, sampled once
    /// when the batch opens.
    fn target(&mut self, kernel: &Kernel) -> Result<usize, SimulationError> {
        if let Some(target) = self.state.target {
            return Ok(target);
        }
        let target = match &self.batch_size {
            BatchSize::Fixed(size) => *size,
            BatchSize::Sampled(variable) => kernel.sample_discrete(variable)? as usize,
        };
        if target == 0 {
            return Err(SimulationError::InvalidBatchSize);
        }
        self.state.target = Some(target);
        Ok(target)
    }

    /// Builds the aggregate shell and deposits it downstream.  The shell
    /// takes the most urgent priority among its members, so a batch
    /// containing an urgent token travels with urgent priority; members
    /// keep their own priorities for unbatching.
    fn close_batch(&mut self, kernel: &mut Kernel) -> Result<(), SimulationError> {
        let members = std::mem::take(&mut self.state.members);
        self.state.target = None;
        let priority = members
            .iter()
            .map(|member| kernel.token(*member).map(|token| token.priority()))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .min()
            .ok_or(SimulationError::InvalidBatchSize)?;
        let shell = kernel.create_token(priority);
        {
            let token = kernel.token_mut(shell)?;
            token.aggregate = true;
            token.children = members.clone();
        }
        for member in members {
            kernel.token_mut(member)?.location = Location::Parked;
        }
        kernel.enter(self.output, shell)
    }
}

impl Station for Batcher {
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
                    let target = self.target(kernel)?;
                    self.state.members.push(token);
                    if self.state.members.len() == target {
                        self.close_batch(kernel)?;
                    }
                }
                Ok(())
            }
            _ => Err(SimulationError::InvalidStationState),
        }
    }
}
