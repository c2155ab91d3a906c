//! The collator reunites child tokens with their parked parent.  Children
//! arrive on the input store; once every expected child of a parent has
//! arrived (the expected count is read from a parent attribute), the
//! parent resumes downstream and the children park inside it.  Arrivals
//! that cannot belong to any parked parent are rejected eagerly, so a
//! mis-wired network fails at the first bad token instead of stalling.

use std::collections::HashMap;

use log::debug;

use super::{Station, StationId, Wake};
use crate::simulator::Kernel;
use crate::store::StoreId;
use crate::tokens::{Location, TokenId};
use crate::utils::errors::SimulationError;

pub struct Collator {
    name: String,
    input: StoreId,
    output: StoreId,
    count_key: String,
    pending: HashMap<TokenId, Vec<TokenId>>,
}

impl Collator {
    pub(crate) fn new(name: &str, input: StoreId, output: StoreId, count_key: &str) -> Self {
        Self {
            name: name.to_string(),
            input,
            output,
            count_key: count_key.to_string(),
            pending: HashMap::new(),
        }
    }

    fn collate(&mut self, kernel: &mut Kernel, child: TokenId) -> Result<(), SimulationError> {
        let parent = kernel
            .token(child)?
            .parent
            .ok_or(SimulationError::CollationMismatch)?;
        let expected = {
            let token = kernel.token(parent)?;
            if token.location() != Location::Parked {
                return Err(SimulationError::CollationMismatch);
            }
            let count = token
                .attribute(&self.count_key)
                .and_then(|value| value.as_integer())
                .ok_or(SimulationError::CollationMismatch)?;
            if count <= 0 {
                return Err(SimulationError::CollationMismatch);
            }
            count as usize
        };
        let arrived = self.pending.entry(parent).or_default();
        if arrived.contains(&child) || arrived.len() >= expected {
            return Err(SimulationError::CollationMismatch);
        }
        arrived.push(child);
        debug!(
            "station {}: {}/{} children collated for token {:?}",
            self.name,
            arrived.len(),
            expected,
            parent
        );
        if arrived.len() < expected {
            kernel.token_mut(child)?.location = Location::Parked;
            return Ok(());
        }
        let children = self.pending.remove(&parent).unwrap_or_default();
        for member in children {
            kernel.token_mut(member)?.location = Location::Parked;
        }
        kernel.enter(self.output, parent)
    }
}

impl Station for Collator {
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
                while let Some(child) = kernel.take(self.input, id)? {
                    self.collate(kernel, child)?;
                }
                Ok(())
            }
            _ => Err(SimulationError::InvalidStationState),
        }
    }
}
