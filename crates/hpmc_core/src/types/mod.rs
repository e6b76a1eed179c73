//! Core value types: simulation box, particle store and errors.

mod error;
mod particles;
mod sim_box;

pub use error::CoreError;
pub use particles::ParticleData;
pub use sim_box::SimBox;
