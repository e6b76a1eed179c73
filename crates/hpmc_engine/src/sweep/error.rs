//! Error types for the update engine.
//!
//! This module defines structured error types for configuration validation
//! and fatal runtime conditions of a sweep. Scratch-space growth is not an
//! error: the convergence loop handles it internally.

use hpmc_core::types::CoreError;
use thiserror::Error;

use crate::comm::CommError;
use crate::schedule::ScheduleError;

/// Configuration error for the update engine.
///
/// These errors occur during construction when invalid parameters are provided.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// Number of substeps per sweep must be at least one.
    #[error("Invalid nselect {0}: must be at least 1")]
    InvalidSubstepCount(u32),
    /// Number of execution units must be at least one.
    #[error("Invalid device count {0}: must be at least 1")]
    InvalidDeviceCount(usize),
    /// A type index exceeds the registered type count.
    #[error("Unknown particle type {type_id} (n_types = {n_types})")]
    UnknownType {
        /// Offending type index.
        type_id: u32,
        /// Registered type count.
        n_types: usize,
    },
    /// Invalid parameter value with name and description.
    #[error("Invalid parameter '{name}': {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Description of the invalid value.
        value: String,
    },
}

impl ConfigError {
    /// Creates an `InvalidParameter` error.
    pub fn invalid(name: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            value: value.into(),
        }
    }
}

/// Fatal sweep error.
///
/// Every variant aborts the sweep before any accepted move is committed.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum HpmcError {
    /// The box is too small for the move sizes and shapes in use.
    #[error(
        "Simulation box too small: nearest plane distance {distance:.4} along axis {axis} \
         must exceed {required:.4}"
    )]
    BoxTooSmall {
        /// Axis index.
        axis: usize,
        /// Nearest-plane distance along the axis.
        distance: f64,
        /// Twice the nominal interaction width.
        required: f64,
    },

    /// The neighbour structure cannot see far enough for the moves in use.
    #[error(
        "Neighbour cell width {width:.4} along axis {axis} is below the nominal \
         interaction width {required:.4}"
    )]
    NeighbourRangeTooSmall {
        /// Axis index.
        axis: usize,
        /// Cell width along the axis.
        width: f64,
        /// Nominal interaction width.
        required: f64,
    },

    /// The neighbour structure was built for a different particle count.
    #[error("Neighbour source covers {actual} particles, system has {expected}")]
    NeighbourCountMismatch {
        /// Particles in the system.
        expected: usize,
        /// Particles covered by the neighbour source.
        actual: usize,
    },

    /// The convergence loop exceeded its iteration bound.
    #[error(
        "Convergence loop exceeded {iterations} iterations (timestep {timestep}, substep {substep})"
    )]
    NonConvergence {
        /// Timestep of the sweep.
        timestep: u64,
        /// Substep within the sweep.
        substep: u32,
        /// Iterations performed.
        iterations: usize,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid particle data or geometry.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Distributed communication failure.
    #[error(transparent)]
    Communication(#[from] CommError),

    /// Task graph construction failure.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}
