use std::{cell::RefCell, rc::Rc};

use rand::RngCore;

pub trait SimulationRng: std::fmt::Debug + RngCore {}
impl<T: std::fmt::Debug + RngCore> SimulationRng for T {}
pub type DynRng = Rc<RefCell<dyn SimulationRng>>;

pub(crate) fn default_rng() -> DynRng {
    Rc::new(RefCell::new(rand_pcg::Pcg64Mcg::new(42)))
}

/// Constructs a shared random number generator handle from a fixed seed.
/// Two simulations built from the same seed consume identical streams.
pub fn seeded_rng(seed: u128) -> DynRng {
    Rc::new(RefCell::new(rand_pcg::Pcg64Mcg::new(seed)))
}

pub fn some_dyn_rng<Rng: SimulationRng + 'static>(rng: Rng) -> Option<DynRng> {
    Some(Rc::new(RefCell::new(rng)))
}
