//! Distributed-memory reductions over named sub-groups.
//!
//! The engine needs two collectives when work is split across ranks:
//! sum-reduction of free-energy accumulators and counters, and
//! max-reduction of the scratch high-water mark. Any failure is fatal.

mod thread_group;

pub use thread_group::{ThreadCommunicator, ThreadGroup};

use thiserror::Error;

/// Fatal communication failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommError {
    /// A peer failed while holding shared reduction state.
    #[error("Communicator '{group}' poisoned by a failed peer")]
    Poisoned {
        /// Name of the sub-group.
        group: String,
    },

    /// Ranks contributed buffers of different lengths.
    #[error("Communicator '{group}' length mismatch: rank {rank} sent {actual}, expected {expected}")]
    LengthMismatch {
        /// Name of the sub-group.
        group: String,
        /// Offending rank.
        rank: usize,
        /// Length contributed by rank 0.
        expected: usize,
        /// Length contributed by the offending rank.
        actual: usize,
    },
}

/// Collective operations over a fixed group of ranks.
///
/// Every rank must issue the same sequence of calls with equally sized
/// buffers; each call acts as a rendezvous barrier.
pub trait Communicator: Send + Sync {
    /// Name of the sub-group, for diagnostics.
    fn name(&self) -> &str;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Rank of the caller within the group.
    fn rank(&self) -> usize;

    /// Element-wise sum across ranks, in place.
    fn all_reduce_sum_i32(&self, buffer: &mut [i32]) -> Result<(), CommError>;

    /// Element-wise sum across ranks, in place.
    fn all_reduce_sum_u64(&self, buffer: &mut [u64]) -> Result<(), CommError>;

    /// Maximum across ranks.
    fn all_reduce_max_usize(&self, value: usize) -> Result<usize, CommError>;
}

/// Single-rank communicator: every reduction is the identity.
#[derive(Clone, Debug)]
pub struct LocalCommunicator {
    name: String,
}

impl LocalCommunicator {
    /// Creates a single-rank group called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Communicator for LocalCommunicator {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        1
    }

    fn rank(&self) -> usize {
        0
    }

    fn all_reduce_sum_i32(&self, _buffer: &mut [i32]) -> Result<(), CommError> {
        Ok(())
    }

    fn all_reduce_sum_u64(&self, _buffer: &mut [u64]) -> Result<(), CommError> {
        Ok(())
    }

    fn all_reduce_max_usize(&self, value: usize) -> Result<usize, CommError> {
        Ok(value)
    }
}
