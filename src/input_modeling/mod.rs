//! The input modeling module provides a foundation for configurable station
//! behaviors, whether that is deterministic or stochastic.  The module
//! includes a set of random variable distributions for use in stations and
//! scripts, and a structure around shared random number generation.

pub mod dynamic_rng;
pub mod random_variable;

pub use dynamic_rng::{seeded_rng, some_dyn_rng, DynRng};
pub use random_variable::Boolean as BooleanRandomVariable;
pub use random_variable::Continuous as ContinuousRandomVariable;
pub use random_variable::Discrete as DiscreteRandomVariable;
pub use random_variable::Index as IndexRandomVariable;
