//! Stores are the ordered holding areas between stations.  Any number of
//! stations may produce into a store, but at most one station consumes it;
//! a store with no consumer acts as a sink.  A consumer waiting on an
//! empty store suspends until an arrival wakes it.

use std::collections::VecDeque;

use crate::monitor::Monitor;
use crate::stations::StationId;
use crate::tokens::TokenId;
use crate::utils::errors::SimulationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(pub usize);

#[derive(Debug)]
pub struct Store {
    name: String,
    items: VecDeque<TokenId>,
    consumer: Option<StationId>,
    length_monitor: Monitor,
}

impl Store {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: VecDeque::new(),
            consumer: None,
            length_monitor: Monitor::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenId> {
        self.items.iter()
    }

    pub fn consumer(&self) -> Option<StationId> {
        self.consumer
    }

    /// The (timestamp, queue length) series for this store.
    pub fn length_series(&self) -> &Monitor {
        &self.length_monitor
    }

    /// Shared consumption is not supported; registering a second consumer
    /// is a configuration error.
    pub(crate) fn set_consumer(&mut self, station: StationId) -> Result<(), SimulationError> {
        if self.consumer.is_some() {
            return Err(SimulationError::StoreAlreadyConsumed);
        }
        self.consumer = Some(station);
        Ok(())
    }

    pub(crate) fn push_back(&mut self, token: TokenId, now: f64) {
        self.items.push_back(token);
        self.length_monitor.record(now, self.items.len() as f64);
    }

    /// Inserts at a precomputed position; the caller determines the
    /// priority-stable position from the token arena.
    pub(crate) fn insert_at(&mut self, position: usize, token: TokenId, now: f64) {
        self.items.insert(position, token);
        self.length_monitor.record(now, self.items.len() as f64);
    }

    pub(crate) fn pop_front(&mut self, now: f64) -> Option<TokenId> {
        let token = self.items.pop_front();
        if token.is_some() {
            self.length_monitor.record(now, self.items.len() as f64);
        }
        token
    }
}
