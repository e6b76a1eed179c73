//! Per-substep convergence loop.
//!
//! ```text
//! Propose ──> Resolve ──(flips)──> Resolve
//!                │  └──(overflow: grow scratch, rerun)──┘
//!                └──(no flips, no overflow)──> Converged ──> Commit
//! ```
//!
//! One Resolve iteration runs two task graphs separated by host-side
//! reductions:
//!
//! 1. narrow phase and depletant insertion for every device and pair;
//! 2. max-reduce of the scratch request, then sum-reduce of the
//!    free-energy accumulators;
//! 3. acceptance for every device, raising the condition flag on flips.

use std::sync::atomic::{AtomicBool, Ordering};

use hpmc_core::neighbours::NeighbourSource;
use hpmc_core::shapes::Shape;
use hpmc_core::types::ParticleData;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::acceptance::{accept_device, commit};
use super::context::StageContext;
use super::depletants::{draw_counts, insert_phase1, insert_phase2, merge_phase2, InsertionContext};
use super::error::HpmcError;
use super::integrator::Integrator;
use super::narrow_phase::resolve_device;
use super::trial::ProposalContext;
use crate::schedule::{NodeKey, Stage, TaskGraph};

/// State of the convergence loop of one substep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    /// Trial moves are drawn.
    Propose,
    /// Rejections are resolved iteratively.
    Resolve,
    /// No decision changed in the last iteration.
    Converged,
}

/// Outcome of one substep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubstepReport {
    /// Substep index within the sweep.
    pub substep: u32,
    /// Completed resolve iterations, overflow reruns excluded.
    pub iterations: usize,
    /// Iterations rerun after a scratch overflow.
    pub overflow_reruns: usize,
    /// Scratch length per group when the loop converged.
    pub final_scratch_len: usize,
    /// Accepted moves.
    pub accepted: u64,
    /// Rejected moves.
    pub rejected: u64,
    /// Whether the reversed update order was active.
    pub reversed_order: bool,
    /// State the loop finished in.
    pub final_state: LoopState,
}

impl SubstepReport {
    /// Report of a substep over an empty system.
    pub fn empty(substep: u32) -> Self {
        Self {
            substep,
            iterations: 0,
            overflow_reruns: 0,
            final_scratch_len: 0,
            accepted: 0,
            rejected: 0,
            reversed_order: false,
            final_state: LoopState::Converged,
        }
    }
}

/// Outcome of one sweep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Timestep the sweep ran at.
    pub timestep: u64,
    /// One entry per substep, in order.
    pub substeps: Vec<SubstepReport>,
}

impl SweepReport {
    /// Resolve iterations over all substeps.
    pub fn total_iterations(&self) -> usize {
        self.substeps.iter().map(|s| s.iterations).sum()
    }

    /// Overflow reruns over all substeps.
    pub fn overflow_reruns(&self) -> usize {
        self.substeps.iter().map(|s| s.overflow_reruns).sum()
    }

    /// Accepted moves over all substeps.
    pub fn accepted(&self) -> u64 {
        self.substeps.iter().map(|s| s.accepted).sum()
    }

    /// Rejected moves over all substeps.
    pub fn rejected(&self) -> u64 {
        self.substeps.iter().map(|s| s.rejected).sum()
    }
}

/// Result of one resolve iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum IterationOutcome {
    /// Some group needed more scratch; nothing was kept.
    Overflow,
    /// At least one reject flag flipped.
    Changed,
    /// No reject flag changed.
    Stable,
}

impl<S: Shape> Integrator<S> {
    pub(super) fn run_substep(
        &mut self,
        timestep: u64,
        substep: u32,
        particles: &mut ParticleData,
        neighbours: &dyn NeighbourSource,
    ) -> Result<SubstepReport, HpmcError> {
        let select = self.config.rank_offset() * u64::from(self.config.nselect()) + u64::from(substep);
        let max_iterations = self.config.max_iterations(particles.len());
        let mut iterations = 0;
        let mut overflow_reruns = 0;
        let mut state = LoopState::Propose;

        while state != LoopState::Converged {
            state = match state {
                LoopState::Propose => {
                    self.order.shuffle(timestep, select);
                    self.propose(timestep, select, particles, neighbours)?;
                    self.buffers.init_reject();
                    LoopState::Resolve
                }
                LoopState::Resolve => {
                    if iterations >= max_iterations {
                        return Err(HpmcError::NonConvergence {
                            timestep,
                            substep,
                            iterations,
                        });
                    }
                    match self.run_iteration(timestep, select, particles, neighbours)? {
                        IterationOutcome::Overflow => {
                            overflow_reruns += 1;
                            LoopState::Resolve
                        }
                        IterationOutcome::Changed => {
                            iterations += 1;
                            LoopState::Resolve
                        }
                        IterationOutcome::Stable => {
                            iterations += 1;
                            LoopState::Converged
                        }
                    }
                }
                LoopState::Converged => LoopState::Converged,
            };
        }

        let (accepted, rejected) = commit(
            particles,
            self.buffers.trials.as_slice(),
            self.buffers.reject(),
            &self.partition,
            &self.sweep_counters,
        );
        let report = SubstepReport {
            substep,
            iterations,
            overflow_reruns,
            final_scratch_len: self.scratch.max_len(),
            accepted,
            rejected,
            reversed_order: self.order.is_reversed(),
            final_state: state,
        };
        debug!(
            substep,
            iterations,
            overflow_reruns,
            accepted,
            rejected,
            "substep converged"
        );
        Ok(report)
    }

    fn propose(
        &mut self,
        timestep: u64,
        select: u64,
        particles: &ParticleData,
        neighbours: &dyn NeighbourSource,
    ) -> Result<(), HpmcError> {
        let ctx = ProposalContext {
            seed: self.config.seed(),
            timestep,
            select,
            move_ratio: self.config.move_ratio(),
            resample_velocity: self.depletants.any_auxiliary(),
            shapes: &self.shapes,
            type_params: &self.type_params,
            particles,
            neighbours,
        };
        let ctx = &ctx;
        let partition = &self.partition;
        let trials = self.buffers.trials.device_slices_mut();
        let by_cell = self.buffers.reject_by_cell.device_slices_mut();

        let mut graph = TaskGraph::new();
        for (device, (trials, by_cell)) in trials.into_iter().zip(by_cell).enumerate() {
            let start = partition.range(device).start;
            graph.add_node(
                NodeKey {
                    device,
                    stage: Stage::Propose,
                },
                move || ctx.propose_range(start, trials, by_cell),
            );
        }
        graph.execute()?;
        Ok(())
    }

    pub(super) fn run_iteration(
        &mut self,
        timestep: u64,
        select: u64,
        particles: &ParticleData,
        neighbours: &dyn NeighbourSource,
    ) -> Result<IterationOutcome, HpmcError> {
        self.staging.reset();
        self.buffers.reset_accumulators();

        self.resolve(timestep, select, particles, neighbours)?;

        let mut requested = self.scratch.requested_len();
        for comm in [&self.trial_comm, &self.particle_comm].into_iter().flatten() {
            requested = comm.all_reduce_max_usize(requested)?;
        }
        if requested > self.scratch.max_len() {
            let old = self.scratch.max_len();
            let new = self.scratch.grow_to(requested);
            debug!("increasing scratch list size per group {} -> {}", old, new);
            return Ok(IterationOutcome::Overflow);
        }

        if self.depletants.is_active() && (self.trial_comm.is_some() || self.particle_comm.is_some()) {
            let mut values = self.buffers.delta_values();
            for comm in [&self.trial_comm, &self.particle_comm].into_iter().flatten() {
                comm.all_reduce_sum_i32(&mut values)?;
            }
            self.buffers.store_delta(&values);
        }

        let changed = self.accept(timestep, select, particles, neighbours)?;
        self.staging.fold_into(&self.sweep_counters);
        self.buffers.swap_reject();
        Ok(if changed {
            IterationOutcome::Changed
        } else {
            IterationOutcome::Stable
        })
    }

    fn stage_context<'a>(
        &'a self,
        timestep: u64,
        select: u64,
        particles: &'a ParticleData,
        neighbours: &'a dyn NeighbourSource,
    ) -> StageContext<'a, S> {
        let (reject, reject_out) = self.buffers.reject_pair();
        StageContext {
            seed: self.config.seed(),
            timestep,
            select,
            shapes: &self.shapes,
            particles,
            neighbours,
            trials: self.buffers.trials.as_slice(),
            reject,
            reject_out,
            order: &self.order,
            partition: &self.partition,
            counters: &self.staging,
        }
    }

    /// Narrow phase and depletant insertion for every device.
    fn resolve(
        &self,
        timestep: u64,
        select: u64,
        particles: &ParticleData,
        neighbours: &dyn NeighbourSource,
    ) -> Result<(), HpmcError> {
        let stage = self.stage_context(timestep, select, particles, neighbours);
        let insertion = InsertionContext {
            stage: &stage,
            table: &self.depletants,
            counts: self.buffers.counts.as_slice(),
            trial_counts: self.buffers.trial_counts.as_slice(),
            delta: self.buffers.delta.as_slice(),
            delta_phase2: self.buffers.delta_phase2.as_slice(),
            scratch: &self.scratch,
            split: self.work_split(),
            max_diameter: self.max_diameter(),
            max_translation: self.max_translation(),
        };
        let (stage, insertion) = (&stage, &insertion);
        let key = |device, kind| NodeKey { device, stage: kind };

        let mut graph = TaskGraph::new();
        for device in 0..self.partition.n_devices() {
            graph.add_node(key(device, Stage::Narrow), move || resolve_device(stage, device));
            for (a, pair) in self.depletants.active().iter().enumerate() {
                let count = graph.add_node(key(device, Stage::DepletantCount(a)), move || {
                    draw_counts(insertion, device, a)
                });
                let phase1 = graph.add_node(key(device, Stage::DepletantPhase1(a)), move || {
                    insert_phase1(insertion, device, a)
                });
                graph.add_edge(count, phase1)?;
                if pair.is_auxiliary() {
                    let phase2 = graph.add_node(key(device, Stage::DepletantPhase2(a)), move || {
                        insert_phase2(insertion, device, a)
                    });
                    let merge = graph.add_node(key(device, Stage::DepletantMerge(a)), move || {
                        merge_phase2(insertion, device, a)
                    });
                    graph.add_edge(count, phase2)?;
                    graph.add_edge(phase1, merge)?;
                    graph.add_edge(phase2, merge)?;
                }
            }
        }
        let waves = graph.execute()?;
        trace!(waves = waves.len(), "resolve graph executed");
        Ok(())
    }

    /// Acceptance for every device. Returns whether any flag flipped.
    fn accept(
        &self,
        timestep: u64,
        select: u64,
        particles: &ParticleData,
        neighbours: &dyn NeighbourSource,
    ) -> Result<bool, HpmcError> {
        let stage = self.stage_context(timestep, select, particles, neighbours);
        let condition = AtomicBool::new(false);
        let (stage, condition) = (&stage, &condition);
        let table = &self.depletants;
        let delta = self.buffers.delta.as_slice();

        let mut graph = TaskGraph::new();
        for device in 0..self.partition.n_devices() {
            graph.add_node(
                NodeKey {
                    device,
                    stage: Stage::Accept,
                },
                move || accept_device(stage, table, delta, condition, device),
            );
        }
        graph.execute()?;
        let changed = condition.load(Ordering::Acquire);
        trace!(changed, "acceptance executed");
        Ok(changed)
    }
}
