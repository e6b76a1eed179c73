//! Keyed random number generation.
//!
//! Every random quantity in a sweep is drawn from a [`KeyedRng`] built from
//! a [`Stream`] and an id tuple such as `(timestep, select, particle)`.
//! Results are therefore independent of device partitioning, execution
//! order and reruns.

mod keyed;

pub use keyed::{mix_key, velocity_words, KeyedRng, Stream};

#[cfg(test)]
mod tests;
