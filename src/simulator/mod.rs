//! The simulator module provides the mechanics to orchestrate stations,
//! stores, and resources via discrete event simulation.  The `Simulation`
//! owns the station registry and the `Kernel`; the kernel carries the
//! event calendar, the virtual clock, the token arena, and all shared
//! state, and exposes the primitive API (enter, request, release, hold)
//! that stations and token scripts are written against.
//!
//! Execution is strictly single-threaded and cooperative.  Every
//! same-instant resumption goes through the calendar, so the (time,
//! sequence number) tie-break fully orders execution and a fixed seed
//! reproduces a run exactly.

use std::collections::HashMap;

use log::trace;

use crate::input_modeling::dynamic_rng::DynRng;
use crate::input_modeling::random_variable::{Boolean, Continuous, Discrete, Index};
use crate::monitor::Counters;
use crate::resources::{lookup, lookup_mut, Resource, ResourceId, ResourceRequest};
use crate::schedule::Schedule;
use crate::scheduler::{Calendar, Cause, Target};
use crate::stations::process::{Activations, Script};
use crate::stations::{
    BatchSize, Batcher, Collator, DeliveryProcess, Generator, PendingRequest, Process,
    ResourceScheduler, Station, StationId, Wake,
};
use crate::store::{Store, StoreId};
use crate::tokens::{Census, Priority, Token, TokenArena, TokenId};
use crate::utils::errors::SimulationError;

pub mod services;

pub use self::services::Services;

/// The shared state of a simulation: virtual clock, event calendar, token
/// arena, stores, resources, counters, and in-flight script activations.
/// Stations and scripts receive `&mut Kernel` when resumed; the kernel
/// never calls back into stations, so the borrow is always exclusive.
#[derive(Default)]
pub struct Kernel {
    pub(crate) calendar: Calendar,
    pub(crate) services: Services,
    pub(crate) tokens: TokenArena,
    pub(crate) stores: Vec<Store>,
    pub(crate) resources: Vec<Resource>,
    pub(crate) counters: Counters,
    pub(crate) activations: Activations,
    pending_requests: HashMap<Target, Vec<ResourceRequest>>,
}

impl Kernel {
    /// The current virtual time.
    pub fn now(&self) -> f64 {
        self.services.global_time()
    }

    /// The shared random number generator handle.
    pub fn rng(&self) -> DynRng {
        self.services.global_rng()
    }

    pub fn sample(&self, variable: &Continuous) -> Result<f64, SimulationError> {
        variable.random_variate(&self.services.global_rng)
    }

    pub fn sample_discrete(&self, variable: &Discrete) -> Result<u64, SimulationError> {
        variable.random_variate(&self.services.global_rng)
    }

    pub fn sample_bool(&self, variable: &Boolean) -> Result<bool, SimulationError> {
        variable.random_variate(&self.services.global_rng)
    }

    pub fn sample_index(&self, variable: &Index) -> Result<usize, SimulationError> {
        variable.random_variate(&self.services.global_rng)
    }

    /// Creates a new top-level token.
    pub fn create_token(&mut self, priority: Priority) -> TokenId {
        let now = self.now();
        self.tokens.create(priority, now)
    }

    /// Creates a child token attached to `parent`, inheriting its
    /// priority.
    pub fn spawn_child(&mut self, parent: TokenId) -> Result<TokenId, SimulationError> {
        let now = self.now();
        self.tokens.create_child(parent, now)
    }

    pub fn token(&self, id: TokenId) -> Result<&Token, SimulationError> {
        self.tokens.get(id)
    }

    pub fn token_mut(&mut self, id: TokenId) -> Result<&mut Token, SimulationError> {
        self.tokens.get_mut(id)
    }

    /// Appends a token to a store, FIFO, and wakes the store's consumer.
    pub fn enter(&mut self, store: StoreId, token: TokenId) -> Result<(), SimulationError> {
        let now = self.now();
        let consumer = self
            .stores
            .get(store.0)
            .ok_or(SimulationError::StoreNotFound)?
            .consumer();
        self.tokens.get_mut(token)?.location = crate::tokens::Location::Queue(store);
        self.stores[store.0].push_back(token, now);
        if let Some(consumer) = consumer {
            self.calendar
                .schedule(now, now, Target::Station(consumer), Cause::Input);
        }
        Ok(())
    }

    /// Inserts a token before the first queued token of strictly greater
    /// priority value, preserving arrival order among equals, and wakes
    /// the store's consumer.
    pub fn enter_sorted(
        &mut self,
        store: StoreId,
        token: TokenId,
        priority: Priority,
    ) -> Result<(), SimulationError> {
        let now = self.now();
        let consumer = self
            .stores
            .get(store.0)
            .ok_or(SimulationError::StoreNotFound)?
            .consumer();
        let mut position = self.stores[store.0].len();
        for (index, queued) in self.stores[store.0].iter().enumerate() {
            if self.tokens.get(*queued)?.priority() > priority {
                position = index;
                break;
            }
        }
        self.tokens.get_mut(token)?.location = crate::tokens::Location::Queue(store);
        self.stores[store.0].insert_at(position, token, now);
        if let Some(consumer) = consumer {
            self.calendar
                .schedule(now, now, Target::Station(consumer), Cause::Input);
        }
        Ok(())
    }

    /// Removes and returns the first token of a store, marking it in
    /// service at `station`.  Returns `None` when the store is empty; the
    /// consumer is woken again on the next arrival.
    pub(crate) fn take(
        &mut self,
        store: StoreId,
        station: StationId,
    ) -> Result<Option<TokenId>, SimulationError> {
        let now = self.now();
        let taken = self
            .stores
            .get_mut(store.0)
            .ok_or(SimulationError::StoreNotFound)?
            .pop_front(now);
        if let Some(token) = taken {
            self.tokens.get_mut(token)?.location = crate::tokens::Location::InService(station);
        }
        Ok(taken)
    }

    /// Suspends `who` for `duration`.
    pub(crate) fn hold(&mut self, who: Target, duration: f64) {
        let now = self.now();
        self.calendar.schedule(now + duration, now, who, Cause::Timer);
    }

    /// Schedules an input check for a station at the current instant.
    pub(crate) fn wake_station(&mut self, station: StationId) {
        let now = self.now();
        self.calendar
            .schedule(now, now, Target::Station(station), Cause::Input);
    }

    /// Attempts to claim every line of a pending request as one atomic
    /// grant: nothing is claimed until all lines fit at the same instant.
    /// Returns `true` once the whole request is claimed (clearing the
    /// pending request and recording the claims in `held`); returns
    /// `false` while `who` waits in every requested pool's queue.  With
    /// `just_granted`, the grant cascade already claimed every line and
    /// only the bookkeeping remains.
    pub(crate) fn acquire(
        &mut self,
        who: Target,
        held: &mut Vec<(ResourceId, usize)>,
        pending: &mut Option<PendingRequest>,
        just_granted: bool,
    ) -> Result<bool, SimulationError> {
        {
            let request = match pending.as_ref() {
                Some(request) => request,
                None => return Ok(true),
            };
            if !just_granted && !request.requests.is_empty() {
                let now = self.now();
                self.pending_requests.insert(who, request.requests.clone());
                for line in &request.requests {
                    lookup_mut(&mut self.resources, line.resource)?
                        .enqueue(who, line.priority, now);
                }
                let seeds = request.requests.iter().map(|line| line.resource).collect();
                let granted = self.cascade(seeds)?;
                let mut granted_now = false;
                for target in granted {
                    if target == who {
                        granted_now = true;
                    } else {
                        self.calendar.schedule(now, now, target, Cause::Granted);
                    }
                }
                if !granted_now {
                    return Ok(false);
                }
            }
        }
        if let Some(request) = pending.take() {
            for line in request.requests {
                held.push((line.resource, line.quantity));
            }
        }
        Ok(true)
    }

    /// Releases claims, either for one named resource or for all held, and
    /// turns any resulting grants into `Granted` resumptions.
    pub fn release(
        &mut self,
        held: &mut Vec<(ResourceId, usize)>,
        which: Option<ResourceId>,
    ) -> Result<(), SimulationError> {
        let now = self.now();
        let mut kept = Vec::new();
        let mut touched = Vec::new();
        for (resource, quantity) in held.drain(..) {
            let matches = which.map_or(true, |target| target == resource);
            if matches {
                lookup_mut(&mut self.resources, resource)?.release(quantity, now);
                touched.push(resource);
            } else {
                kept.push((resource, quantity));
            }
        }
        *held = kept;
        let granted = self.cascade(touched)?;
        for target in granted {
            self.calendar.schedule(now, now, target, Cause::Granted);
        }
        Ok(())
    }

    /// Applies a capacity change; a raise may grant waiting requests.
    pub fn set_capacity(
        &mut self,
        resource: ResourceId,
        capacity: usize,
    ) -> Result<(), SimulationError> {
        let now = self.now();
        lookup_mut(&mut self.resources, resource)?.set_capacity(capacity, now);
        let granted = self.cascade(vec![resource])?;
        for target in granted {
            self.calendar.schedule(now, now, target, Cause::Granted);
        }
        Ok(())
    }

    /// The grant cascade.  Grants are strictly head-first per pool, and a
    /// multi-line request is granted only when its owner heads the queue
    /// of every requested pool and every line fits; the cascade stops at
    /// the first head that cannot be served, even if a later waiter would
    /// fit.  Granting a request frees queue heads on its other pools, so
    /// those pools re-enter the worklist.
    fn cascade(&mut self, mut worklist: Vec<ResourceId>) -> Result<Vec<Target>, SimulationError> {
        let now = self.now();
        let mut granted = Vec::new();
        while let Some(resource) = worklist.pop() {
            loop {
                let head = match lookup(&self.resources, resource)?.head() {
                    Some(head) => head,
                    None => break,
                };
                let lines = self
                    .pending_requests
                    .get(&head)
                    .ok_or(SimulationError::InvalidStationState)?
                    .clone();
                let servable = {
                    let mut servable = true;
                    for line in &lines {
                        let pool = lookup(&self.resources, line.resource)?;
                        if !pool.is_head(head) || !pool.fits(line.quantity) {
                            servable = false;
                            break;
                        }
                    }
                    servable
                };
                if !servable {
                    break;
                }
                for line in &lines {
                    let pool = lookup_mut(&mut self.resources, line.resource)?;
                    pool.claim(line.quantity, now);
                    pool.remove_waiter(head, now);
                    if line.resource != resource {
                        worklist.push(line.resource);
                    }
                }
                self.pending_requests.remove(&head);
                granted.push(head);
            }
        }
        Ok(granted)
    }

    /// Adds `delta` to a named counter, creating it on first use, and
    /// returns the new value.
    pub fn counter_add(&mut self, name: &str, delta: i64) -> i64 {
        let now = self.now();
        self.counters.add(name, now, delta)
    }

    pub fn counter_value(&self, name: &str) -> i64 {
        self.counters.value(name)
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn resource(&self, id: ResourceId) -> Result<&Resource, SimulationError> {
        lookup(&self.resources, id)
    }

    pub fn store(&self, id: StoreId) -> Result<&Store, SimulationError> {
        self.stores.get(id.0).ok_or(SimulationError::StoreNotFound)
    }

    pub fn tokens(&self) -> &TokenArena {
        &self.tokens
    }

    /// A census of token locations, for conservation checks.
    pub fn census(&self) -> Census {
        self.tokens.census()
    }
}

/// The `Simulation` is the core of flowsim, and includes everything needed
/// to run a process network - the kernel and the registry of stations.
/// Stations, stores, and resources are created once through the
/// registration API and referenced by typed ids thereafter.
#[derive(Default)]
pub struct Simulation {
    kernel: Kernel,
    stations: Vec<Option<Box<dyn Station>>>,
    next_init: usize,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a simulation whose random number stream is seeded, for
    /// reproducible runs.
    pub fn with_seed(seed: u128) -> Self {
        Self {
            kernel: Kernel {
                services: Services::with_seed(seed),
                ..Kernel::default()
            },
            stations: Vec::new(),
            next_init: 0,
        }
    }

    pub fn add_resource(&mut self, name: &str, capacity: usize) -> ResourceId {
        let now = self.kernel.now();
        let id = ResourceId(self.kernel.resources.len());
        self.kernel.resources.push(Resource::new(name, capacity, now));
        id
    }

    pub fn add_store(&mut self, name: &str) -> StoreId {
        let id = StoreId(self.kernel.stores.len());
        self.kernel.stores.push(Store::new(name));
        id
    }

    /// Registers a single-item processing station driven by a caller
    /// supplied script.
    pub fn add_process(
        &mut self,
        name: &str,
        input: StoreId,
        script: Box<dyn Script>,
    ) -> Result<StationId, SimulationError> {
        let station = Box::new(Process::new(name, input, script));
        self.add_station(station, Some(input))
    }

    /// Registers a generator producing tokens whose inter-arrival times
    /// follow an exponential process with the rate given by the cyclic
    /// schedule.
    pub fn add_generator(
        &mut self,
        name: &str,
        output: StoreId,
        arrival_rates: Schedule<f64>,
        priority: Priority,
    ) -> Result<StationId, SimulationError> {
        let station = Box::new(Generator::new(name, output, arrival_rates, priority));
        self.add_station(station, None)
    }

    pub fn add_batcher(
        &mut self,
        name: &str,
        input: StoreId,
        output: StoreId,
        batch_size: BatchSize,
    ) -> Result<StationId, SimulationError> {
        let station = Box::new(Batcher::new(name, input, output, batch_size)?);
        self.add_station(station, Some(input))
    }

    /// Registers a fan-in collator.  `count_key` names the parent
    /// attribute holding the expected child count, read at collation time.
    pub fn add_collator(
        &mut self,
        name: &str,
        input: StoreId,
        output: StoreId,
        count_key: &str,
    ) -> Result<StationId, SimulationError> {
        let station = Box::new(Collator::new(name, input, output, count_key));
        self.add_station(station, Some(input))
    }

    /// Registers a round-trip delivery station.  The carrier resource is
    /// held for the full outbound plus return duration.
    pub fn add_delivery(
        &mut self,
        name: &str,
        input: StoreId,
        output: StoreId,
        carrier: ResourceId,
        out_duration: f64,
        return_duration: f64,
    ) -> Result<StationId, SimulationError> {
        let station = Box::new(DeliveryProcess::new(
            name,
            input,
            output,
            carrier,
            out_duration,
            return_duration,
        ));
        self.add_station(station, Some(input))
    }

    /// Registers a capacity scheduler bound to one resource.
    pub fn add_resource_scheduler(
        &mut self,
        name: &str,
        resource: ResourceId,
        capacities: Schedule<usize>,
    ) -> Result<StationId, SimulationError> {
        let station = Box::new(ResourceScheduler::new(name, resource, capacities));
        self.add_station(station, None)
    }

    fn add_station(
        &mut self,
        station: Box<dyn Station>,
        input: Option<StoreId>,
    ) -> Result<StationId, SimulationError> {
        let id = StationId(self.stations.len());
        if let Some(input) = input {
            self.kernel
                .stores
                .get_mut(input.0)
                .ok_or(SimulationError::StoreNotFound)?
                .set_consumer(id)?;
        }
        self.stations.push(Some(station));
        Ok(id)
    }

    /// Creates a token and places it directly into a store, waking the
    /// store's consumer.  Mostly useful for seeding a network with work
    /// before the first `run_until`.
    pub fn inject(
        &mut self,
        store: StoreId,
        priority: Priority,
    ) -> Result<TokenId, SimulationError> {
        let token = self.kernel.create_token(priority);
        self.kernel.enter(store, token)?;
        Ok(token)
    }

    /// Runs the simulation until the calendar is empty or the next event
    /// is due after `until`.  The virtual clock is monotonically
    /// non-decreasing and finishes at `until` when it is finite.
    pub fn run_until(&mut self, until: f64) -> Result<(), SimulationError> {
        while self.next_init < self.stations.len() {
            let index = self.next_init;
            self.next_init += 1;
            let mut station = self.stations[index]
                .take()
                .ok_or(SimulationError::InvalidStationState)?;
            let outcome = station.init(&mut self.kernel, StationId(index));
            self.stations[index] = Some(station);
            outcome?;
        }
        while let Some(event) = self.kernel.calendar.pop_before(until) {
            self.kernel.services.set_global_time(event.time);
            let (station_id, wake) = match event.target {
                Target::Station(station_id) => {
                    let wake = match event.cause {
                        Cause::Input => Wake::Input,
                        Cause::Timer => Wake::Timer,
                        Cause::Granted => Wake::Granted,
                    };
                    (station_id, wake)
                }
                Target::Activation(activation) => {
                    let station_id = self.kernel.activations.station_of(activation)?;
                    (station_id, Wake::Script(activation, event.cause))
                }
            };
            let mut station = self.stations[station_id.0]
                .take()
                .ok_or(SimulationError::InvalidStationState)?;
            trace!(
                "t={:.4}: waking station {} ({:?})",
                event.time,
                station.name(),
                event.cause
            );
            let outcome = station.wake(&mut self.kernel, station_id, wake);
            self.stations[station_id.0] = Some(station);
            outcome?;
        }
        if until.is_finite() && until > self.kernel.services.global_time() {
            self.kernel.services.set_global_time(until);
        }
        Ok(())
    }

    pub fn global_time(&self) -> f64 {
        self.kernel.now()
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut Kernel {
        &mut self.kernel
    }

    pub fn resource(&self, id: ResourceId) -> Result<&Resource, SimulationError> {
        self.kernel.resource(id)
    }

    pub fn store(&self, id: StoreId) -> Result<&Store, SimulationError> {
        self.kernel.store(id)
    }

    pub fn counters(&self) -> &Counters {
        self.kernel.counters()
    }

    pub fn census(&self) -> Census {
        self.kernel.census()
    }

    pub fn tokens(&self) -> &TokenArena {
        self.kernel.tokens()
    }
}
