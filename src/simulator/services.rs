use crate::input_modeling::dynamic_rng::{default_rng, seeded_rng, DynRng};

/// The simulator provides a uniform random number generator and simulation
/// clock to stations and scripts during the execution of a simulation.
/// All stochastic draws go through the single shared generator, in a fixed
/// order relative to event processing, so a fixed seed reproduces a run
/// exactly.
#[derive(Debug, Clone)]
pub struct Services {
    pub(crate) global_rng: DynRng,
    pub(crate) global_time: f64,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            global_rng: default_rng(),
            global_time: 0.0,
        }
    }
}

impl Services {
    pub fn with_seed(seed: u128) -> Self {
        Self {
            global_rng: seeded_rng(seed),
            global_time: 0.0,
        }
    }

    pub fn global_rng(&self) -> DynRng {
        self.global_rng.clone()
    }

    pub fn global_time(&self) -> f64 {
        self.global_time
    }

    pub fn set_global_time(&mut self, time: f64) {
        self.global_time = time;
    }
}
