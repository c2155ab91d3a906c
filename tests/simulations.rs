use flowsim::input_modeling::random_variable::{Continuous, Discrete};
use flowsim::resources::{ResourceId, ResourceRequest};
use flowsim::schedule::Schedule;
use flowsim::simulator::{Kernel, Simulation};
use flowsim::stations::{Action, BatchSize, Frame, Script};
use flowsim::store::StoreId;
use flowsim::tokens::{AttributeValue, Census, TokenId, ROUTINE, URGENT};
use flowsim::utils::errors::SimulationError;

fn delay_of(frame: &Frame, kernel: &Kernel) -> Result<f64, SimulationError> {
    Ok(kernel
        .token(frame.token)?
        .attribute("delay")
        .and_then(AttributeValue::as_real)
        .unwrap_or(0.0))
}

/// Holds for the token's "delay" attribute, then forwards.
struct DelayThenForward {
    output: StoreId,
}

impl Script for DelayThenForward {
    fn resume(&self, frame: &mut Frame, kernel: &mut Kernel) -> Result<Action, SimulationError> {
        match frame.pc {
            0 => Ok(Action::Hold {
                duration: delay_of(frame, kernel)?,
                next: 1,
            }),
            _ => Ok(Action::Forward { store: self.output }),
        }
    }
}

/// Claims one unit at the token's priority, records the grant instant in
/// the "granted_at" attribute, serves for a fixed time, and releases.
struct ClaimAndServe {
    resource: ResourceId,
    service: f64,
    output: StoreId,
}

impl Script for ClaimAndServe {
    fn resume(&self, frame: &mut Frame, kernel: &mut Kernel) -> Result<Action, SimulationError> {
        match frame.pc {
            0 => {
                let priority = kernel.token(frame.token)?.priority();
                Ok(Action::Request {
                    requests: vec![ResourceRequest {
                        resource: self.resource,
                        quantity: 1,
                        priority,
                    }],
                    next: 1,
                })
            }
            1 => {
                let now = kernel.now();
                kernel
                    .token_mut(frame.token)?
                    .set_attribute("granted_at", AttributeValue::Real(now));
                Ok(Action::Hold {
                    duration: self.service,
                    next: 2,
                })
            }
            _ => {
                kernel.release(&mut frame.held, None)?;
                Ok(Action::Forward { store: self.output })
            }
        }
    }
}

/// Like `ClaimAndServe`, but first waits out the token's "delay" and reads
/// its service time and claim quantity from the "service" and "units"
/// attributes.
struct DelayedClaim {
    resource: ResourceId,
    output: StoreId,
}

impl Script for DelayedClaim {
    fn resume(&self, frame: &mut Frame, kernel: &mut Kernel) -> Result<Action, SimulationError> {
        match frame.pc {
            0 => Ok(Action::Hold {
                duration: delay_of(frame, kernel)?,
                next: 1,
            }),
            1 => {
                let token = kernel.token(frame.token)?;
                let priority = token.priority();
                let quantity = token
                    .attribute("units")
                    .and_then(AttributeValue::as_integer)
                    .unwrap_or(1) as usize;
                Ok(Action::Request {
                    requests: vec![ResourceRequest {
                        resource: self.resource,
                        quantity,
                        priority,
                    }],
                    next: 2,
                })
            }
            2 => {
                let now = kernel.now();
                let service = kernel
                    .token(frame.token)?
                    .attribute("service")
                    .and_then(AttributeValue::as_real)
                    .unwrap_or(1.0);
                kernel
                    .token_mut(frame.token)?
                    .set_attribute("granted_at", AttributeValue::Real(now));
                Ok(Action::Hold {
                    duration: service,
                    next: 3,
                })
            }
            _ => {
                kernel.release(&mut frame.held, None)?;
                Ok(Action::Forward { store: self.output })
            }
        }
    }
}

/// Spawns two delayed children into a feeder store, records the expected
/// block count on the parent, and parks it to await collation.
struct SpawnBlocks {
    feeder: StoreId,
}

impl Script for SpawnBlocks {
    fn resume(&self, frame: &mut Frame, kernel: &mut Kernel) -> Result<Action, SimulationError> {
        let first = kernel.spawn_child(frame.token)?;
        let second = kernel.spawn_child(frame.token)?;
        kernel
            .token_mut(frame.token)?
            .set_attribute("blocks", AttributeValue::Integer(2));
        kernel
            .token_mut(first)?
            .set_attribute("delay", AttributeValue::Real(5.0));
        kernel
            .token_mut(second)?
            .set_attribute("delay", AttributeValue::Real(9.0));
        kernel.enter(self.feeder, first)?;
        kernel.enter(self.feeder, second)?;
        Ok(Action::Park)
    }
}

/// Claims one unit of each of two pools in a single request, at the
/// token's priority, then serves and releases.
struct TwoLineClaim {
    first: ResourceId,
    second: ResourceId,
    service: f64,
    output: StoreId,
}

impl Script for TwoLineClaim {
    fn resume(&self, frame: &mut Frame, kernel: &mut Kernel) -> Result<Action, SimulationError> {
        match frame.pc {
            0 => Ok(Action::Hold {
                duration: delay_of(frame, kernel)?,
                next: 1,
            }),
            1 => {
                let priority = kernel.token(frame.token)?.priority();
                Ok(Action::Request {
                    requests: vec![
                        ResourceRequest {
                            resource: self.first,
                            quantity: 1,
                            priority,
                        },
                        ResourceRequest {
                            resource: self.second,
                            quantity: 1,
                            priority,
                        },
                    ],
                    next: 2,
                })
            }
            2 => {
                let now = kernel.now();
                kernel
                    .token_mut(frame.token)?
                    .set_attribute("granted_at", AttributeValue::Real(now));
                Ok(Action::Hold {
                    duration: self.service,
                    next: 3,
                })
            }
            _ => {
                kernel.release(&mut frame.held, None)?;
                Ok(Action::Forward { store: self.output })
            }
        }
    }
}

/// Spawns one child but records a negative count - corrupt bookkeeping.
struct SpawnMiscounted {
    blocks: StoreId,
}

impl Script for SpawnMiscounted {
    fn resume(&self, frame: &mut Frame, kernel: &mut Kernel) -> Result<Action, SimulationError> {
        let child = kernel.spawn_child(frame.token)?;
        kernel
            .token_mut(frame.token)?
            .set_attribute("blocks", AttributeValue::Integer(-1));
        kernel.enter(self.blocks, child)?;
        Ok(Action::Park)
    }
}

/// Spawns one child but records a count of two, then forwards the child
/// twice - a miscounted fan-in.
struct SpawnDuplicate {
    blocks: StoreId,
}

impl Script for SpawnDuplicate {
    fn resume(&self, frame: &mut Frame, kernel: &mut Kernel) -> Result<Action, SimulationError> {
        let child = kernel.spawn_child(frame.token)?;
        kernel
            .token_mut(frame.token)?
            .set_attribute("blocks", AttributeValue::Integer(2));
        kernel.enter(self.blocks, child)?;
        kernel.enter(self.blocks, child)?;
        Ok(Action::Park)
    }
}

/// Samples a processing time, tracking work in progress in a counter.
struct StochasticService {
    output: StoreId,
}

impl Script for StochasticService {
    fn resume(&self, frame: &mut Frame, kernel: &mut Kernel) -> Result<Action, SimulationError> {
        match frame.pc {
            0 => {
                kernel.counter_add("wip", 1);
                let duration = kernel.sample(&Continuous::Pert {
                    min: 0.5,
                    max: 2.0,
                    mode: 1.0,
                })?;
                Ok(Action::Hold { duration, next: 1 })
            }
            _ => {
                kernel.counter_add("wip", -1);
                Ok(Action::Forward { store: self.output })
            }
        }
    }
}

fn census_total(census: Census) -> usize {
    census.creating + census.queued + census.in_service + census.parked + census.retired
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn granted_at(simulation: &Simulation, token: TokenId) -> Option<f64> {
    simulation
        .tokens()
        .get(token)
        .unwrap()
        .attribute("granted_at")
        .and_then(AttributeValue::as_real)
}

#[test]
fn scheduled_capacity_serves_both_requesters_at_once() {
    init_logging();
    let mut simulation = Simulation::new();
    let bench = simulation.add_resource("bench", 0);
    let arrivals = simulation.add_store("arrivals");
    let done = simulation.add_store("done");
    simulation
        .add_resource_scheduler("shift", bench, Schedule::new(vec![(1.0, 2), (1.0, 0)]).unwrap())
        .unwrap();
    simulation
        .add_process(
            "cutup",
            arrivals,
            Box::new(ClaimAndServe {
                resource: bench,
                service: 5.0,
                output: done,
            }),
        )
        .unwrap();
    let routine = simulation.inject(arrivals, 0).unwrap();
    let preferred = simulation.inject(arrivals, -1).unwrap();

    simulation.run_until(0.5).unwrap();
    for token in [routine, preferred] {
        let granted_at = simulation
            .tokens()
            .get(token)
            .unwrap()
            .attribute("granted_at")
            .and_then(AttributeValue::as_real)
            .unwrap();
        assert!(granted_at.abs() < f64::EPSILON);
    }
    assert_eq!(simulation.resource(bench).unwrap().claimed(), 2);

    // Off-shift: capacity drops to zero, but claims are not revoked.
    simulation.run_until(3.0).unwrap();
    assert_eq!(simulation.resource(bench).unwrap().capacity(), 0);
    assert_eq!(simulation.resource(bench).unwrap().claimed(), 2);

    simulation.run_until(6.0).unwrap();
    assert_eq!(simulation.resource(bench).unwrap().claimed(), 0);
    assert_eq!(simulation.store(done).unwrap().len(), 2);
}

#[test]
fn batcher_emits_on_the_closing_arrival() {
    let mut simulation = Simulation::new();
    let staging = simulation.add_store("staging");
    let batch_in = simulation.add_store("batch-in");
    let batched = simulation.add_store("batched");
    simulation
        .add_process("feeder", staging, Box::new(DelayThenForward { output: batch_in }))
        .unwrap();
    simulation
        .add_batcher("loader", batch_in, batched, BatchSize::Fixed(3))
        .unwrap();
    let mut members = Vec::new();
    for delay in [0.0, 1.0, 2.0] {
        let token = simulation.inject(staging, ROUTINE).unwrap();
        simulation
            .kernel_mut()
            .token_mut(token)
            .unwrap()
            .set_attribute("delay", AttributeValue::Real(delay));
        members.push(token);
    }

    simulation.run_until(10.0).unwrap();
    let output = simulation.store(batched).unwrap();
    assert_eq!(output.len(), 1);
    let shell = *output.iter().next().unwrap();
    let shell = simulation.tokens().get(shell).unwrap();
    assert!(shell.aggregate);
    assert_eq!(shell.children, members);
    // Closed the instant the third member arrived.
    assert!((shell.created_at - 2.0).abs() < f64::EPSILON);
}

#[test]
fn collator_releases_the_parent_exactly_once() {
    let mut simulation = Simulation::new();
    let prep = simulation.add_store("prep");
    let feeder = simulation.add_store("feeder");
    let blocks = simulation.add_store("blocks");
    let collated = simulation.add_store("collated");
    simulation
        .add_process("grossing", prep, Box::new(SpawnBlocks { feeder }))
        .unwrap();
    simulation
        .add_process("processing", feeder, Box::new(DelayThenForward { output: blocks }))
        .unwrap();
    simulation
        .add_collator("assembly", blocks, collated, "blocks")
        .unwrap();
    let parent = simulation.inject(prep, ROUTINE).unwrap();

    simulation.run_until(7.0).unwrap();
    assert!(simulation.store(collated).unwrap().is_empty());

    simulation.run_until(20.0).unwrap();
    let output = simulation.store(collated).unwrap();
    assert_eq!(output.len(), 1);
    assert_eq!(*output.iter().next().unwrap(), parent);
    // Deposited at the second child's arrival instant.
    assert!((output.length_series().series()[0].0 - 9.0).abs() < f64::EPSILON);
    assert_eq!(simulation.census().parked, 2);
}

#[test]
fn urgent_request_overtakes_an_earlier_routine_request() {
    let mut simulation = Simulation::new();
    let scanner = simulation.add_resource("scanner", 1);
    let arrivals = simulation.add_store("arrivals");
    let done = simulation.add_store("done");
    simulation
        .add_process(
            "scanning",
            arrivals,
            Box::new(DelayedClaim {
                resource: scanner,
                output: done,
            }),
        )
        .unwrap();
    let mut seed = |priority, delay: f64, service: f64| {
        let token = simulation.inject(arrivals, priority).unwrap();
        let entry = simulation.kernel_mut().token_mut(token).unwrap();
        entry.set_attribute("delay", AttributeValue::Real(delay));
        entry.set_attribute("service", AttributeValue::Real(service));
        token
    };
    let holder = seed(ROUTINE, 0.0, 10.0);
    let routine = seed(ROUTINE, 1.0, 1.0);
    let urgent = seed(URGENT, 8.0, 100.0);

    simulation.run_until(50.0).unwrap();
    assert_eq!(granted_at(&simulation, holder), Some(0.0));
    assert_eq!(granted_at(&simulation, urgent), Some(10.0));
    // The routine request is still queued behind the long urgent service.
    assert_eq!(granted_at(&simulation, routine), None);
    assert_eq!(simulation.resource(scanner).unwrap().waiting_count(), 1);
}

#[test]
fn opposed_two_line_requests_are_granted_atomically() {
    let mut simulation = Simulation::new();
    let stainer = simulation.add_resource("stainer", 1);
    let scanner = simulation.add_resource("scanner", 1);
    let forward_in = simulation.add_store("forward-in");
    let reverse_in = simulation.add_store("reverse-in");
    let done = simulation.add_store("done");
    simulation
        .add_process(
            "forward",
            forward_in,
            Box::new(TwoLineClaim {
                first: stainer,
                second: scanner,
                service: 5.0,
                output: done,
            }),
        )
        .unwrap();
    simulation
        .add_process(
            "reverse",
            reverse_in,
            Box::new(TwoLineClaim {
                first: scanner,
                second: stainer,
                service: 5.0,
                output: done,
            }),
        )
        .unwrap();
    let mut seed = |store, delay: f64| {
        let token = simulation.inject(store, ROUTINE).unwrap();
        simulation
            .kernel_mut()
            .token_mut(token)
            .unwrap()
            .set_attribute("delay", AttributeValue::Real(delay));
        token
    };
    let holder = seed(forward_in, 0.0);
    let forward = seed(forward_in, 1.0);
    let reverse = seed(reverse_in, 2.0);

    // Both later requests wait in both pools, claiming nothing.
    simulation.run_until(3.0).unwrap();
    assert_eq!(simulation.resource(stainer).unwrap().claimed(), 1);
    assert_eq!(simulation.resource(scanner).unwrap().claimed(), 1);
    assert_eq!(simulation.resource(stainer).unwrap().waiting_count(), 2);
    assert_eq!(simulation.resource(scanner).unwrap().waiting_count(), 2);

    // The opposite line orders never cross-lock; everyone completes.
    simulation.run_until(30.0).unwrap();
    assert_eq!(simulation.store(done).unwrap().len(), 3);
    assert_eq!(granted_at(&simulation, holder), Some(0.0));
    assert_eq!(granted_at(&simulation, forward), Some(5.0));
    assert_eq!(granted_at(&simulation, reverse), Some(10.0));
    assert_eq!(simulation.resource(stainer).unwrap().claimed(), 0);
    assert_eq!(simulation.resource(scanner).unwrap().claimed(), 0);
    assert_eq!(simulation.resource(stainer).unwrap().waiting_count(), 0);
    assert_eq!(simulation.resource(scanner).unwrap().waiting_count(), 0);
}

#[test]
fn a_blocked_head_blocks_smaller_later_requests() {
    let mut simulation = Simulation::new();
    let embedder = simulation.add_resource("embedder", 2);
    let arrivals = simulation.add_store("arrivals");
    let done = simulation.add_store("done");
    simulation
        .add_resource_scheduler(
            "shift",
            embedder,
            Schedule::new(vec![(3.0, 2), (97.0, 3)]).unwrap(),
        )
        .unwrap();
    simulation
        .add_process(
            "embedding",
            arrivals,
            Box::new(DelayedClaim {
                resource: embedder,
                output: done,
            }),
        )
        .unwrap();
    let mut seed = |priority, delay: f64, units: i64| {
        let token = simulation.inject(arrivals, priority).unwrap();
        let entry = simulation.kernel_mut().token_mut(token).unwrap();
        entry.set_attribute("delay", AttributeValue::Real(delay));
        entry.set_attribute("service", AttributeValue::Real(5.0));
        entry.set_attribute("units", AttributeValue::Integer(units));
        token
    };
    let holder = seed(ROUTINE, 0.0, 2);
    let wide = seed(-1, 1.0, 2);
    let narrow = seed(ROUTINE, 2.0, 1);

    // Capacity rises to 3 at t=3: the narrow request now fits, but the
    // wide head of the queue does not, and it is not overtaken.
    simulation.run_until(4.0).unwrap();
    assert_eq!(simulation.resource(embedder).unwrap().claimed(), 2);
    assert_eq!(simulation.resource(embedder).unwrap().waiting_count(), 2);
    assert_eq!(granted_at(&simulation, narrow), None);

    simulation.run_until(20.0).unwrap();
    assert_eq!(granted_at(&simulation, holder), Some(0.0));
    assert_eq!(granted_at(&simulation, wide), Some(5.0));
    assert_eq!(granted_at(&simulation, narrow), Some(5.0));
    assert_eq!(simulation.store(done).unwrap().len(), 3);
}

#[test]
fn delivery_holds_the_carrier_for_the_full_round_trip() {
    let mut simulation = Simulation::new();
    let courier = simulation.add_resource("courier", 1);
    let batch_in = simulation.add_store("batch-in");
    let dispatch = simulation.add_store("dispatch");
    let lab = simulation.add_store("lab");
    simulation
        .add_batcher("loader", batch_in, dispatch, BatchSize::Fixed(3))
        .unwrap();
    simulation
        .add_delivery("van", dispatch, lab, courier, 5.0, 5.0)
        .unwrap();
    for _ in 0..3 {
        simulation.inject(batch_in, ROUTINE).unwrap();
    }

    // Mid-trip: cargo already delivered, carrier still out.
    simulation.run_until(7.0).unwrap();
    assert_eq!(simulation.store(lab).unwrap().len(), 3);
    assert_eq!(simulation.resource(courier).unwrap().claimed(), 1);

    simulation.run_until(12.0).unwrap();
    assert_eq!(simulation.resource(courier).unwrap().claimed(), 0);
    // Claimed from grant through grant + out + return, without a gap.
    let series = simulation.resource(courier).unwrap().claimed_series().series();
    assert!(series.contains(&(0.0, 1.0)));
    assert!(series.contains(&(10.0, 0.0)));
    // The aggregate shell retired when it was unbatched.
    assert_eq!(simulation.census().retired, 1);
}

#[test]
fn tokens_are_conserved_across_a_generated_run() {
    init_logging();
    let mut simulation = Simulation::with_seed(271_828);
    let arrivals = simulation.add_store("arrivals");
    let done = simulation.add_store("done");
    simulation
        .add_generator(
            "reception",
            arrivals,
            Schedule::new(vec![(8.0, 1.5), (16.0, 0.0)]).unwrap(),
            ROUTINE,
        )
        .unwrap();
    simulation
        .add_process("histology", arrivals, Box::new(StochasticService { output: done }))
        .unwrap();

    simulation.run_until(100.0).unwrap();
    let census = simulation.census();
    assert!(simulation.tokens().len() > 0);
    assert_eq!(census.creating, 0);
    assert_eq!(census_total(census), simulation.tokens().len());
    // Everything not in service has drained into a store.
    let stored = simulation.store(arrivals).unwrap().len() + simulation.store(done).unwrap().len();
    assert_eq!(census.queued, stored);
    assert_eq!(
        simulation.counters().value("wip"),
        census.in_service as i64
    );
}

#[test]
fn seeded_runs_replay_identically() {
    let build_and_run = || {
        let mut simulation = Simulation::with_seed(42);
        let arrivals = simulation.add_store("arrivals");
        let done = simulation.add_store("done");
        simulation
            .add_generator(
                "reception",
                arrivals,
                Schedule::new(vec![(8.0, 1.5), (16.0, 0.2)]).unwrap(),
                ROUTINE,
            )
            .unwrap();
        simulation
            .add_process("histology", arrivals, Box::new(StochasticService { output: done }))
            .unwrap();
        simulation.run_until(200.0).unwrap();
        let lengths = simulation.store(done).unwrap().length_series().series().to_vec();
        (simulation.tokens().len(), lengths)
    };
    let (first_count, first_series) = build_and_run();
    let (second_count, second_series) = build_and_run();
    assert_eq!(first_count, second_count);
    assert_eq!(first_series, second_series);
}

#[test]
fn misconfigured_networks_fail_at_construction() {
    let mut simulation = Simulation::new();
    let input = simulation.add_store("input");
    let output = simulation.add_store("output");
    assert!(matches!(
        simulation.add_batcher("loader", input, output, BatchSize::Fixed(0)),
        Err(SimulationError::InvalidBatchSize)
    ));
    assert!(matches!(
        Schedule::<usize>::new(Vec::new()),
        Err(SimulationError::EmptySchedule)
    ));
    simulation
        .add_process("first", input, Box::new(DelayThenForward { output }))
        .unwrap();
    assert!(matches!(
        simulation.add_process("second", input, Box::new(DelayThenForward { output })),
        Err(SimulationError::StoreAlreadyConsumed)
    ));
}

#[test]
fn sampled_batch_size_of_zero_is_an_error() {
    let mut simulation = Simulation::new();
    let input = simulation.add_store("input");
    let output = simulation.add_store("output");
    simulation
        .add_batcher(
            "loader",
            input,
            output,
            BatchSize::Sampled(Discrete::Point { value: 0 }),
        )
        .unwrap();
    simulation.inject(input, ROUTINE).unwrap();
    assert!(matches!(
        simulation.run_until(1.0),
        Err(SimulationError::InvalidBatchSize)
    ));
}

#[test]
fn sorted_insertion_orders_by_priority_then_arrival() {
    let mut simulation = Simulation::new();
    let queue = simulation.add_store("queue");
    let kernel = simulation.kernel_mut();
    let mut enter = |priority| {
        let token = kernel.create_token(priority);
        kernel.enter_sorted(queue, token, priority).unwrap();
        token
    };
    let first_routine = enter(ROUTINE);
    let first_urgent = enter(URGENT);
    let second_routine = enter(ROUTINE);
    let preferred = enter(-1);
    let second_urgent = enter(URGENT);
    let order: Vec<TokenId> = simulation.store(queue).unwrap().iter().copied().collect();
    // Ahead of strictly greater values only; arrival order among equals.
    assert_eq!(
        order,
        vec![
            first_urgent,
            second_urgent,
            preferred,
            first_routine,
            second_routine
        ]
    );
}

#[test]
fn negative_recorded_counts_are_rejected_by_the_collator() {
    let mut simulation = Simulation::new();
    let prep = simulation.add_store("prep");
    let blocks = simulation.add_store("blocks");
    let collated = simulation.add_store("collated");
    simulation
        .add_process("grossing", prep, Box::new(SpawnMiscounted { blocks }))
        .unwrap();
    simulation
        .add_collator("assembly", blocks, collated, "blocks")
        .unwrap();
    simulation.inject(prep, ROUTINE).unwrap();
    assert!(matches!(
        simulation.run_until(1.0),
        Err(SimulationError::CollationMismatch)
    ));
}

#[test]
fn duplicate_children_are_rejected_by_the_collator() {
    let mut simulation = Simulation::new();
    let prep = simulation.add_store("prep");
    let blocks = simulation.add_store("blocks");
    let collated = simulation.add_store("collated");
    simulation
        .add_process("grossing", prep, Box::new(SpawnDuplicate { blocks }))
        .unwrap();
    simulation
        .add_collator("assembly", blocks, collated, "blocks")
        .unwrap();
    simulation.inject(prep, ROUTINE).unwrap();
    assert!(matches!(
        simulation.run_until(1.0),
        Err(SimulationError::CollationMismatch)
    ));
}

#[test]
fn orphan_arrivals_are_rejected_by_the_collator() {
    let mut simulation = Simulation::new();
    let blocks = simulation.add_store("blocks");
    let collated = simulation.add_store("collated");
    simulation
        .add_collator("assembly", blocks, collated, "blocks")
        .unwrap();
    simulation.inject(blocks, ROUTINE).unwrap();
    assert!(matches!(
        simulation.run_until(1.0),
        Err(SimulationError::CollationMismatch)
    ));
}
