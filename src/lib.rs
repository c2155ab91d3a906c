//! # Overview
//! Flowsim provides a discrete event simulation substrate for priority
//! laden flow networks - laboratory pipelines, job shops, logistics loops.
//!
//! This repository contains:
//!
//! * Random variable framework, for easy specification of stochastic
//! station behaviors.
//! * A virtual clock and deterministic event calendar, so seeded runs
//! replay exactly.
//! * Tokens with priorities, attributes, and parent/child structure,
//! flowing through FIFO or priority-sorted stores.
//! * Resources with priority-ordered contention and time-varying capacity.
//! * Pre-built stations - processes driven by token scripts, time-varying
//! generators, batchers, collators, round-trip deliveries, and capacity
//! schedulers.
//!
//! Flowsim is strictly single-threaded and cooperative; it does not
//! require nightly Rust.
pub mod input_modeling;
pub mod monitor;
pub mod resources;
pub mod schedule;
pub mod scheduler;
pub mod simulator;
pub mod stations;
pub mod store;
pub mod tokens;
pub mod utils;
