//! The event calendar maintains the time-ordered queue of pending
//! continuations.  Entries are ordered by (time, sequence number); the
//! sequence number breaks ties in insertion order, which makes replay
//! deterministic for a fixed random number stream.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::stations::process::ActivationId;
use crate::stations::StationId;

/// What a scheduled event resumes: a station's own state machine, or one
/// token-script activation hosted by a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Station(StationId),
    Activation(ActivationId),
}

/// Why the target is being resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// A token arrived on the target's input store
    Input,
    /// A timed hold elapsed
    Timer,
    /// A pending resource request was granted
    Granted,
}

#[derive(Debug, Clone, Copy)]
pub struct FiredEvent {
    pub time: f64,
    pub target: Target,
    pub cause: Cause,
}

#[derive(Debug)]
struct Entry {
    time: f64,
    seq: u64,
    target: Target,
    cause: Cause,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

#[derive(Debug, Default)]
pub struct Calendar {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

impl Calendar {
    /// Enqueues a continuation to run at virtual time `at`.  A time in the
    /// past is clamped to `now`; the tie-break rule still guarantees it
    /// runs after continuations already due at the current instant.
    pub fn schedule(&mut self, at: f64, now: f64, target: Target, cause: Cause) {
        let time = if at < now { now } else { at };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            time,
            seq,
            target,
            cause,
        }));
    }

    /// Pops the earliest-due event, if it is due at or before `limit`.
    pub fn pop_before(&mut self, limit: f64) -> Option<FiredEvent> {
        let due = matches!(self.heap.peek(), Some(Reverse(entry)) if entry.time <= limit);
        if !due {
            return None;
        }
        self.heap.pop().map(|Reverse(entry)| FiredEvent {
            time: entry.time,
            target: entry.target,
            cause: entry.cause,
        })
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
