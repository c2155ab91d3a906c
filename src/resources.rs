//! Resources are named pools of interchangeable units, with waiting lists
//! kept strictly in (priority, arrival) order.  A request may span several
//! resources and is honored atomically - nothing is claimed until every
//! requested line fits at one instant - so the grant decision itself lives
//! in the kernel, which can see all pools.  This module keeps each pool's
//! claim arithmetic, queue discipline, and monitors.  Already-granted
//! claims are never revoked when capacity drops, so a pool can be
//! transiently over-committed.

use log::debug;

use crate::monitor::Monitor;
use crate::scheduler::Target;
use crate::tokens::Priority;
use crate::utils::errors::SimulationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub usize);

/// One line of a (possibly multi-resource) request issued by a station or
/// a token script.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRequest {
    pub resource: ResourceId,
    pub quantity: usize,
    pub priority: Priority,
}

#[derive(Debug)]
struct Waiter {
    who: Target,
    priority: Priority,
    seq: u64,
}

#[derive(Debug)]
pub struct Resource {
    name: String,
    capacity: usize,
    claimed: usize,
    waiting: Vec<Waiter>,
    next_seq: u64,
    claimed_monitor: Monitor,
    waiting_monitor: Monitor,
    capacity_monitor: Monitor,
}

impl Resource {
    pub(crate) fn new(name: &str, capacity: usize, now: f64) -> Self {
        let mut resource = Self {
            name: name.to_string(),
            capacity,
            claimed: 0,
            waiting: Vec::new(),
            next_seq: 0,
            claimed_monitor: Monitor::default(),
            waiting_monitor: Monitor::default(),
            capacity_monitor: Monitor::default(),
        };
        resource.claimed_monitor.record(now, 0.0);
        resource.waiting_monitor.record(now, 0.0);
        resource.capacity_monitor.record(now, capacity as f64);
        resource
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn claimed(&self) -> usize {
        self.claimed
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// The (timestamp, claimed units) series.
    pub fn claimed_series(&self) -> &Monitor {
        &self.claimed_monitor
    }

    /// The (timestamp, waiting requester count) series.  Unbounded growth
    /// here is the diagnostic for an unsatisfiable request.
    pub fn waiting_series(&self) -> &Monitor {
        &self.waiting_monitor
    }

    /// The (timestamp, capacity) series, for utilization reporting.
    pub fn capacity_series(&self) -> &Monitor {
        &self.capacity_monitor
    }

    /// Enqueues a waiter in (priority, arrival) order, inserting after any
    /// existing waiters of equal priority.
    pub(crate) fn enqueue(&mut self, who: Target, priority: Priority, now: f64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let position = self
            .waiting
            .iter()
            .position(|waiter| waiter.priority > priority)
            .unwrap_or(self.waiting.len());
        self.waiting.insert(
            position,
            Waiter {
                who,
                priority,
                seq,
            },
        );
        self.waiting_monitor.record(now, self.waiting.len() as f64);
    }

    pub(crate) fn head(&self) -> Option<Target> {
        self.waiting.first().map(|waiter| waiter.who)
    }

    pub(crate) fn is_head(&self, who: Target) -> bool {
        self.waiting.first().map_or(false, |waiter| waiter.who == who)
    }

    /// Whether `quantity` more units fit under the current capacity.
    pub(crate) fn fits(&self, quantity: usize) -> bool {
        self.claimed + quantity <= self.capacity
    }

    pub(crate) fn claim(&mut self, quantity: usize, now: f64) {
        self.claimed += quantity;
        debug!(
            "resource {}: claimed {} ({}/{} claimed)",
            self.name, quantity, self.claimed, self.capacity
        );
        self.claimed_monitor.record(now, self.claimed as f64);
    }

    pub(crate) fn remove_waiter(&mut self, who: Target, now: f64) {
        if let Some(position) = self.waiting.iter().position(|waiter| waiter.who == who) {
            let waiter = self.waiting.remove(position);
            debug!(
                "resource {}: waiter #{} dequeued ({} still waiting)",
                self.name,
                waiter.seq,
                self.waiting.len()
            );
            self.waiting_monitor.record(now, self.waiting.len() as f64);
        }
    }

    pub(crate) fn release(&mut self, quantity: usize, now: f64) {
        self.claimed = self.claimed.saturating_sub(quantity);
        debug!(
            "resource {}: released {} ({}/{} claimed)",
            self.name, quantity, self.claimed, self.capacity
        );
        self.claimed_monitor.record(now, self.claimed as f64);
    }

    /// Applies a capacity change.  Claims in excess of a lowered capacity
    /// are never revoked.
    pub(crate) fn set_capacity(&mut self, capacity: usize, now: f64) {
        if capacity == self.capacity {
            return;
        }
        debug!(
            "resource {}: capacity {} -> {}",
            self.name, self.capacity, capacity
        );
        self.capacity = capacity;
        self.capacity_monitor.record(now, capacity as f64);
    }
}

pub(crate) fn lookup(
    resources: &[Resource],
    id: ResourceId,
) -> Result<&Resource, SimulationError> {
    resources.get(id.0).ok_or(SimulationError::ResourceNotFound)
}

pub(crate) fn lookup_mut(
    resources: &mut [Resource],
    id: ResourceId,
) -> Result<&mut Resource, SimulationError> {
    resources
        .get_mut(id.0)
        .ok_or(SimulationError::ResourceNotFound)
}
