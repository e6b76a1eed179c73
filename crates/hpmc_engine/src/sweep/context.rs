//! Read-only view of one convergence iteration shared by all stages.

use std::sync::atomic::{AtomicBool, Ordering};

use glam::{DQuat, DVec3};
use hpmc_core::neighbours::NeighbourSource;
use hpmc_core::shapes::Shape;
use hpmc_core::types::{ParticleData, SimBox};

use super::counters::DeviceCounters;
use super::trial::TrialState;
use super::update_order::UpdateOrder;
use crate::schedule::DevicePartition;

/// Position and orientation of a particle in one configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Pose {
    pub position: DVec3,
    pub orientation: DQuat,
}

/// Everything a stage reads during one iteration.
///
/// `reject` is the state the iteration was started from; stages write
/// only `reject_out`, the counters and their own accumulators.
pub(crate) struct StageContext<'a, S: Shape> {
    pub seed: u64,
    pub timestep: u64,
    pub select: u64,
    pub shapes: &'a [S],
    pub particles: &'a ParticleData,
    pub neighbours: &'a dyn NeighbourSource,
    pub trials: &'a [TrialState],
    pub reject: &'a [AtomicBool],
    pub reject_out: &'a [AtomicBool],
    pub order: &'a UpdateOrder,
    pub partition: &'a DevicePartition,
    pub counters: &'a DeviceCounters,
}

impl<S: Shape> StageContext<'_, S> {
    #[inline]
    pub fn sim_box(&self) -> &SimBox {
        self.particles.sim_box()
    }

    #[inline]
    pub fn dimensions(&self) -> u32 {
        self.sim_box().dimensions()
    }

    #[inline]
    pub fn shape_of(&self, i: usize) -> &S {
        &self.shapes[self.particles.types()[i] as usize]
    }

    #[inline]
    pub fn is_rejected(&self, i: usize) -> bool {
        self.reject[i].load(Ordering::Relaxed)
    }

    /// Whether `i` proposes a real move that is still accepted.
    #[inline]
    pub fn is_live_move(&self, i: usize) -> bool {
        self.trials[i].is_move() && !self.is_rejected(i)
    }

    #[inline]
    pub fn old_pose(&self, i: usize) -> Pose {
        Pose {
            position: self.particles.positions()[i],
            orientation: self.particles.orientations()[i],
        }
    }

    #[inline]
    pub fn trial_pose(&self, i: usize) -> Pose {
        let t = &self.trials[i];
        Pose {
            position: t.position,
            orientation: t.orientation,
        }
    }

    /// Old pose for side 0, trial pose for side 1.
    #[inline]
    pub fn side_pose(&self, i: usize, side: usize) -> Pose {
        if side == 0 {
            self.old_pose(i)
        } else {
            self.trial_pose(i)
        }
    }

    /// Pose `i` occupies given the current reject flags.
    #[inline]
    pub fn current_pose(&self, i: usize) -> Pose {
        if self.is_live_move(i) {
            self.trial_pose(i)
        } else {
            self.old_pose(i)
        }
    }

    /// Minimum-image vector from `from` to `to`.
    #[inline]
    pub fn separation(&self, from: DVec3, to: DVec3) -> DVec3 {
        self.sim_box().min_image(to - from)
    }
}
