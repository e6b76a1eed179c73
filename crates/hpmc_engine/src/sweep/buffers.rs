//! Per-particle working buffers of the engine.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use rayon::prelude::*;

use super::trial::TrialState;
use crate::schedule::{DevicePartition, PlacedBuffer};

/// Trial, reject and depletant buffers, grown with the particle count and
/// the active pair layout.
#[derive(Debug)]
pub(crate) struct SweepBuffers {
    pub trials: PlacedBuffer<TrialState>,
    pub reject_by_cell: PlacedBuffer<bool>,
    reject: [PlacedBuffer<AtomicBool>; 2],
    current: usize,
    pub counts: PlacedBuffer<AtomicU32>,
    pub trial_counts: PlacedBuffer<AtomicU32>,
    pub delta: PlacedBuffer<AtomicI32>,
    pub delta_phase2: PlacedBuffer<AtomicI32>,
}

impl Default for SweepBuffers {
    fn default() -> Self {
        Self {
            trials: PlacedBuffer::new("trial", 1),
            reject_by_cell: PlacedBuffer::new("reject_by_cell", 1),
            reject: [
                PlacedBuffer::new("reject_a", 1),
                PlacedBuffer::new("reject_b", 1),
            ],
            current: 0,
            counts: PlacedBuffer::new("depletant_counts", 0),
            trial_counts: PlacedBuffer::new("depletant_trial_counts", 0),
            delta: PlacedBuffer::new("depletant_delta", 0),
            delta_phase2: PlacedBuffer::new("depletant_delta_phase2", 0),
        }
    }
}

impl SweepBuffers {
    /// Addresses `n` particles. Returns `true` if any allocation grew.
    pub fn ensure_particles(&mut self, n: usize) -> bool {
        let mut grew = self.trials.ensure_particles(n, TrialState::default);
        grew |= self.reject_by_cell.ensure_particles(n, || false);
        for r in &mut self.reject {
            grew |= r.ensure_particles(n, || AtomicBool::new(false));
        }
        grew |= self.counts.ensure_particles(n, || AtomicU32::new(0));
        grew |= self.trial_counts.ensure_particles(n, || AtomicU32::new(0));
        grew |= self.delta.ensure_particles(n, || AtomicI32::new(0));
        grew |= self.delta_phase2.ensure_particles(n, || AtomicI32::new(0));
        grew
    }

    /// Lays out the depletant buffers for `n_active` pairs with at most
    /// `max_ntrial` trials. Returns `true` if any stride changed or any
    /// allocation grew, i.e. when placement must be re-advised.
    pub fn set_pair_layout(&mut self, n_active: usize, max_ntrial: usize) -> bool {
        let mut grew = self.counts.set_stride(n_active, || AtomicU32::new(0));
        grew |= self
            .trial_counts
            .set_stride(n_active * max_ntrial * 2, || AtomicU32::new(0));
        grew |= self.delta.set_stride(n_active, || AtomicI32::new(0));
        grew |= self.delta_phase2.set_stride(n_active, || AtomicI32::new(0));
        grew
    }

    /// Re-issues residency advice for every buffer.
    pub fn advise(&mut self, partition: &DevicePartition) {
        self.trials.advise(partition);
        self.reject_by_cell.advise(partition);
        for r in &mut self.reject {
            r.advise(partition);
        }
        self.counts.advise(partition);
        self.trial_counts.advise(partition);
        self.delta.advise(partition);
        self.delta_phase2.advise(partition);
    }

    /// Current (`reject`) and outgoing (`reject_out`) flags.
    pub fn reject_pair(&self) -> (&[AtomicBool], &[AtomicBool]) {
        (
            self.reject[self.current].as_slice(),
            self.reject[self.current ^ 1].as_slice(),
        )
    }

    /// Flags the last completed iteration produced.
    pub fn reject(&self) -> &[AtomicBool] {
        self.reject[self.current].as_slice()
    }

    /// Makes the outgoing flags current.
    pub fn swap_reject(&mut self) {
        self.current ^= 1;
    }

    /// Seeds the current flags from the reject-by-cell flags.
    pub fn init_reject(&mut self) {
        let by_cell = self.reject_by_cell.as_slice();
        self.reject[self.current]
            .as_slice()
            .par_iter()
            .zip(by_cell.par_iter())
            .for_each(|(r, &b)| r.store(b, Ordering::Relaxed));
    }

    /// Zeroes the free-energy accumulators.
    pub fn reset_accumulators(&self) {
        for buffer in [&self.delta, &self.delta_phase2] {
            buffer
                .as_slice()
                .par_iter()
                .for_each(|d| d.store(0, Ordering::Relaxed));
        }
    }

    /// Copies the accumulators out for a cross-rank reduction.
    pub fn delta_values(&self) -> Vec<i32> {
        self.delta
            .as_slice()
            .par_iter()
            .map(|d| d.load(Ordering::Relaxed))
            .collect()
    }

    /// Stores reduced accumulator values.
    pub fn store_delta(&self, values: &[i32]) {
        self.delta
            .as_slice()
            .par_iter()
            .zip(values.par_iter())
            .for_each(|(d, &v)| d.store(v, Ordering::Relaxed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_exchanges_roles() {
        let mut buffers = SweepBuffers::default();
        buffers.ensure_particles(3);
        {
            let (_, out) = buffers.reject_pair();
            out[1].store(true, Ordering::Relaxed);
        }
        buffers.swap_reject();
        let (current, _) = buffers.reject_pair();
        assert!(current[1].load(Ordering::Relaxed));
        assert!(!current[0].load(Ordering::Relaxed));
    }

    #[test]
    fn test_pair_layout_sizes() {
        let mut buffers = SweepBuffers::default();
        buffers.ensure_particles(4);
        assert!(buffers.set_pair_layout(2, 3));
        assert_eq!(buffers.counts.as_slice().len(), 8);
        assert_eq!(buffers.trial_counts.as_slice().len(), 48);
        assert_eq!(buffers.delta.as_slice().len(), 8);
        assert!(buffers.set_pair_layout(1, 1));
        assert_eq!(buffers.delta.as_slice().len(), 4);
        assert!(!buffers.set_pair_layout(1, 1));
    }

    #[test]
    fn test_shrunk_layout_is_readvised() {
        let mut buffers = SweepBuffers::default();
        buffers.ensure_particles(4);
        let partition = DevicePartition::new(4, 2);
        buffers.set_pair_layout(2, 1);
        buffers.advise(&partition);
        assert_eq!(buffers.delta.placement(), &[0..4, 4..8]);

        assert!(buffers.set_pair_layout(1, 1));
        buffers.advise(&partition);
        assert_eq!(buffers.delta.placement(), &[0..2, 2..4]);
        assert_eq!(buffers.trial_counts.placement(), &[0..4, 4..8]);
    }

    #[test]
    fn test_accumulator_round_trip_through_reduction() {
        let mut buffers = SweepBuffers::default();
        buffers.ensure_particles(2);
        buffers.set_pair_layout(1, 0);
        buffers.delta.as_slice()[1].store(-3, Ordering::Relaxed);
        let mut values = buffers.delta_values();
        values[0] += 2;
        buffers.store_delta(&values);
        assert_eq!(buffers.delta_values(), vec![2, -3]);
        buffers.reset_accumulators();
        assert_eq!(buffers.delta_values(), vec![0, 0]);
    }
}
