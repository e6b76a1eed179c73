//! Multi-device scheduling.
//!
//! This module provides:
//! - [`DevicePartition`]: contiguous split of particles over execution units
//! - [`PlacedBuffer`]: per-particle storage with declared device residency
//! - [`TaskGraph`]: `(device, stage)` nodes with must-complete-before edges

mod graph;
mod partition;
mod placement;

pub use graph::{NodeId, NodeKey, Stage, TaskGraph};
pub use partition::DevicePartition;
pub use placement::PlacedBuffer;

use thiserror::Error;

/// Errors raised while building or running a task graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The dependency edges contain a cycle.
    #[error("Task graph contains a cycle ({remaining} nodes never became ready)")]
    Cycle {
        /// Nodes left unscheduled.
        remaining: usize,
    },

    /// An edge refers to a node that does not exist.
    #[error("Unknown task graph node {0}")]
    UnknownNode(usize),
}
