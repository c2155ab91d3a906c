//! Random variables underpin both stochastic and deterministic station
//! behaviors, in that deterministic operation is simply a random variable
//! with a single value of probability 1.  Common distributions, with their
//! common parameterizations, are wrapped in enums `Continuous`, `Boolean`,
//! `Discrete`, and `Index`.

use rand::distributions::Distribution;
use serde::{Deserialize, Serialize};
// Continuous distributions
use rand_distr::{Beta, Exp, Normal, Triangular, Uniform};
// Discrete distributions
use rand_distr::{Bernoulli, Poisson, WeightedIndex};

use super::dynamic_rng::DynRng;
use crate::utils::errors::SimulationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Continuous {
    Exp {
        lambda: f64,
    },
    Normal {
        mean: f64,
        std_dev: f64,
    },
    /// PERT distribution, realized through the Beta distribution with
    /// shape 4: alpha = 1 + 4(mode - min)/(max - min) and
    /// beta = 1 + 4(max - mode)/(max - min)
    Pert {
        min: f64,
        max: f64,
        mode: f64,
    },
    /// A single point, for deterministic durations
    Point {
        value: f64,
    },
    Triangular {
        min: f64,
        max: f64,
        mode: f64,
    },
    Uniform {
        min: f64,
        max: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Boolean {
    Bernoulli { p: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Discrete {
    Poisson {
        lambda: f64,
    },
    /// A single point, for deterministic counts
    Point {
        value: u64,
    },
    /// Range is inclusive of min, exclusive of max: [min, max)
    Uniform {
        min: u64,
        max: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Index {
    /// Range is inclusive of min, exclusive of max: [min, max)
    Uniform {
        min: usize,
        max: usize,
    },
    WeightedIndex {
        weights: Vec<u64>,
    },
}

impl Continuous {
    /// The generation of random variates drives stochastic behaviors during
    /// simulation execution.  This function requires the random number
    /// generator of the simulation, and produces a f64 random variate.
    pub fn random_variate(&self, rng: &DynRng) -> Result<f64, SimulationError> {
        let mut rng = rng.borrow_mut();
        match self {
            Continuous::Exp { lambda } => Ok(Exp::new(*lambda)?.sample(&mut *rng)),
            Continuous::Normal { mean, std_dev } => {
                Ok(Normal::new(*mean, *std_dev)?.sample(&mut *rng))
            }
            Continuous::Pert { min, max, mode } => {
                let range = max - min;
                let alpha = 1.0 + 4.0 * (mode - min) / range;
                let beta = 1.0 + 4.0 * (max - mode) / range;
                Ok(min + Beta::new(alpha, beta)?.sample(&mut *rng) * range)
            }
            Continuous::Point { value } => Ok(*value),
            Continuous::Triangular { min, max, mode } => {
                Ok(Triangular::new(*min, *max, *mode)?.sample(&mut *rng))
            }
            Continuous::Uniform { min, max } => Ok(Uniform::new(*min, *max).sample(&mut *rng)),
        }
    }
}

impl Boolean {
    /// The generation of random variates drives stochastic behaviors during
    /// simulation execution.  This function requires the random number
    /// generator of the simulation, and produces a boolean random variate.
    pub fn random_variate(&self, rng: &DynRng) -> Result<bool, SimulationError> {
        let mut rng = rng.borrow_mut();
        match self {
            Boolean::Bernoulli { p } => Ok(Bernoulli::new(*p)?.sample(&mut *rng)),
        }
    }
}

impl Discrete {
    /// The generation of random variates drives stochastic behaviors during
    /// simulation execution.  This function requires the random number
    /// generator of the simulation, and produces a u64 random variate.
    pub fn random_variate(&self, rng: &DynRng) -> Result<u64, SimulationError> {
        let mut rng = rng.borrow_mut();
        match self {
            Discrete::Poisson { lambda } => Ok(Poisson::new(*lambda)?.sample(&mut *rng) as u64),
            Discrete::Point { value } => Ok(*value),
            Discrete::Uniform { min, max } => Ok(Uniform::new(*min, *max).sample(&mut *rng)),
        }
    }
}

impl Index {
    /// The generation of random variates drives stochastic behaviors during
    /// simulation execution.  This function requires the random number
    /// generator of the simulation, and produces a usize random variate.
    pub fn random_variate(&self, rng: &DynRng) -> Result<usize, SimulationError> {
        let mut rng = rng.borrow_mut();
        match self {
            Index::Uniform { min, max } => Ok(Uniform::new(*min, *max).sample(&mut *rng)),
            Index::WeightedIndex { weights } => {
                Ok(WeightedIndex::new(weights.clone())?.sample(&mut *rng))
            }
        }
    }
}
