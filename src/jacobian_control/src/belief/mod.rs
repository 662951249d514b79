//! Belief representation: noise model and particle sets.

pub mod noise;
pub mod state;

pub use noise::NoiseModel;
pub use state::{BeliefState, Particle};
