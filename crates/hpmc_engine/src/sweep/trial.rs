//! Trial move proposal.
//!
//! Each particle draws its trial configuration from the key
//! `(TrialMove, seed, timestep, select, particle)`, so proposals do not
//! depend on how particles are split over devices.

use glam::{DQuat, DVec3};
use hpmc_core::neighbours::NeighbourSource;
use hpmc_core::shapes::Shape;
use hpmc_core::types::ParticleData;
use rayon::prelude::*;

use super::config::TypeParams;
use crate::rng::{KeyedRng, Stream};

/// Kind of trial move drawn for a particle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MoveKind {
    /// No move: the selected kind has zero size for this type.
    #[default]
    None,
    /// Displacement of the centre.
    Translate,
    /// Rotation about the centre.
    Rotate,
}

/// Proposed configuration of one particle for one substep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrialState {
    /// Trial position, wrapped into the box.
    pub position: DVec3,
    /// Trial orientation.
    pub orientation: DQuat,
    /// Trial auxiliary velocity.
    pub velocity: DVec3,
    /// Move kind that produced the trial.
    pub kind: MoveKind,
}

impl Default for TrialState {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
            velocity: DVec3::ZERO,
            kind: MoveKind::None,
        }
    }
}

impl TrialState {
    /// Whether the trial differs from the old configuration.
    #[inline]
    pub fn is_move(&self) -> bool {
        self.kind != MoveKind::None
    }
}

/// Inputs shared by every proposal of one substep.
pub(crate) struct ProposalContext<'a, S: Shape> {
    pub seed: u64,
    pub timestep: u64,
    pub select: u64,
    pub move_ratio: f64,
    pub resample_velocity: bool,
    pub shapes: &'a [S],
    pub type_params: &'a [TypeParams],
    pub particles: &'a ParticleData,
    pub neighbours: &'a dyn NeighbourSource,
}

impl<S: Shape> ProposalContext<'_, S> {
    /// Draws the trial of particle `i` and whether it left its cell.
    pub fn propose(&self, i: usize) -> (TrialState, bool) {
        let p = self.particles;
        let sim_box = p.sim_box();
        let dims = sim_box.dimensions();
        let type_id = p.types()[i] as usize;
        let params = self.type_params[type_id];
        let old_position = p.positions()[i];
        let old_orientation = p.orientations()[i];

        let mut rng = KeyedRng::new(
            Stream::TrialMove,
            self.seed,
            &[self.timestep, self.select, i as u64],
        );
        let translate = rng.gen_uniform() < self.move_ratio;

        let mut trial = TrialState {
            position: old_position,
            orientation: old_orientation,
            velocity: p.velocities()[i],
            kind: MoveKind::None,
        };
        if translate {
            if params.translation > 0.0 {
                let step = rng.gen_in_ball(params.translation, dims);
                trial.position = sim_box.wrap(old_position + step);
                trial.kind = MoveKind::Translate;
            }
        } else if params.rotation > 0.0 && self.shapes[type_id].is_orientable() {
            let axis = if dims == 2 {
                DVec3::Z
            } else {
                rng.gen_unit_vector(3)
            };
            let angle = (2.0 * rng.gen_uniform() - 1.0) * params.rotation;
            trial.orientation = (DQuat::from_axis_angle(axis, angle) * old_orientation).normalize();
            trial.kind = MoveKind::Rotate;
        }

        if self.resample_velocity {
            let mut v = DVec3::new(rng.gen_normal(), rng.gen_normal(), rng.gen_normal());
            if dims == 2 {
                v.z = 0.0;
            }
            trial.velocity = v;
        }

        let left_cell = trial.kind == MoveKind::Translate
            && self.neighbours.cell_of(trial.position) != self.neighbours.cell_of(old_position);
        (trial, left_cell)
    }

    /// Fills the trials of the particles `start..start + trials.len()`.
    pub fn propose_range(&self, start: usize, trials: &mut [TrialState], reject_by_cell: &mut [bool]) {
        trials
            .par_iter_mut()
            .zip(reject_by_cell.par_iter_mut())
            .enumerate()
            .for_each(|(k, (trial, by_cell))| {
                let (t, left) = self.propose(start + k);
                *trial = t;
                *by_cell = left;
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpmc_core::neighbours::{AllNeighbours, CellList};
    use hpmc_core::shapes::{Cuboid, Sphere};
    use hpmc_core::types::SimBox;

    fn single<S: Shape>(shape: S) -> (ParticleData, Vec<S>) {
        let mut particles = ParticleData::new(SimBox::cubic(10.0), 1);
        particles.push(DVec3::ZERO, DQuat::IDENTITY, 0).unwrap();
        (particles, vec![shape])
    }

    fn context<'a, S: Shape>(
        particles: &'a ParticleData,
        shapes: &'a [S],
        params: &'a [TypeParams],
        neighbours: &'a dyn NeighbourSource,
        move_ratio: f64,
    ) -> ProposalContext<'a, S> {
        ProposalContext {
            seed: 5,
            timestep: 0,
            select: 0,
            move_ratio,
            resample_velocity: false,
            shapes,
            type_params: params,
            particles,
            neighbours,
        }
    }

    #[test]
    fn test_translation_within_move_size() {
        let (particles, shapes) = single(Sphere::new(1.0));
        let params = [TypeParams::new(0.2, 0.0)];
        let all = AllNeighbours::new(1);
        let mut ctx = context(&particles, &shapes, &params, &all, 1.0);
        for step in 0..200 {
            ctx.timestep = step;
            let (trial, left) = ctx.propose(0);
            assert_eq!(trial.kind, MoveKind::Translate);
            assert!(trial.position.length() <= 0.2 + 1e-12);
            assert!(!left);
        }
    }

    #[test]
    fn test_zero_size_is_explicit_no_op() {
        let (particles, shapes) = single(Sphere::new(1.0));
        let params = [TypeParams::new(0.0, 0.0)];
        let all = AllNeighbours::new(1);
        let ctx = context(&particles, &shapes, &params, &all, 0.5);
        let (trial, _) = ctx.propose(0);
        assert_eq!(trial.kind, MoveKind::None);
        assert_eq!(trial.position, DVec3::ZERO);
    }

    #[test]
    fn test_spheres_never_rotate() {
        let (particles, shapes) = single(Sphere::new(1.0));
        let params = [TypeParams::new(0.0, 0.5)];
        let all = AllNeighbours::new(1);
        let ctx = context(&particles, &shapes, &params, &all, 0.0);
        assert_eq!(ctx.propose(0).0.kind, MoveKind::None);
    }

    #[test]
    fn test_cuboid_rotation_bounded() {
        let (particles, shapes) = single(Cuboid::from_edges(DVec3::ONE));
        let params = [TypeParams::new(0.0, 0.3)];
        let all = AllNeighbours::new(1);
        let mut ctx = context(&particles, &shapes, &params, &all, 0.0);
        for step in 0..100 {
            ctx.timestep = step;
            let (trial, _) = ctx.propose(0);
            assert_eq!(trial.kind, MoveKind::Rotate);
            let angle = trial.orientation.angle_between(DQuat::IDENTITY);
            assert!(angle <= 0.3 + 1e-6, "angle {}", angle);
        }
    }

    #[test]
    fn test_resampled_velocity_is_keyed() {
        let (particles, shapes) = single(Sphere::new(1.0));
        let params = [TypeParams::new(0.1, 0.0)];
        let all = AllNeighbours::new(1);
        let mut ctx = context(&particles, &shapes, &params, &all, 1.0);
        ctx.resample_velocity = true;
        let (a, _) = ctx.propose(0);
        let (b, _) = ctx.propose(0);
        assert_eq!(a, b);
        assert_ne!(a.velocity, DVec3::ZERO);
    }

    #[test]
    fn test_reject_by_cell_flag() {
        let mut particles = ParticleData::new(SimBox::cubic(10.0), 1);
        // Just inside a cell boundary at x = 0 (ten cells of width 1 from -5).
        particles
            .push(DVec3::new(0.001, 0.5, 0.5), DQuat::IDENTITY, 0)
            .unwrap();
        let shapes = [Sphere::new(0.5)];
        let params = [TypeParams::new(0.5, 0.0)];
        let cells = CellList::build(particles.sim_box(), particles.positions(), 1.0).unwrap();
        let mut ctx = context(&particles, &shapes, &params, &cells, 1.0);
        let mut any_left = false;
        for step in 0..200 {
            ctx.timestep = step;
            let (trial, left) = ctx.propose(0);
            let crossed = cells.cell_of(trial.position) != cells.cell_of(particles.positions()[0]);
            assert_eq!(left, crossed);
            any_left |= left;
        }
        assert!(any_left);
    }

    #[test]
    fn test_propose_range_matches_single_proposals() {
        let mut particles = ParticleData::new(SimBox::cubic(10.0), 1);
        for k in 0..6 {
            particles
                .push(DVec3::new(k as f64 - 3.0, 0.0, 0.0), DQuat::IDENTITY, 0)
                .unwrap();
        }
        let shapes = [Sphere::new(0.5)];
        let params = [TypeParams::new(0.1, 0.0)];
        let all = AllNeighbours::new(6);
        let ctx = context(&particles, &shapes, &params, &all, 1.0);
        let mut trials = vec![TrialState::default(); 4];
        let mut by_cell = vec![false; 4];
        ctx.propose_range(2, &mut trials, &mut by_cell);
        for (k, trial) in trials.iter().enumerate() {
            assert_eq!(*trial, ctx.propose(2 + k).0);
        }
    }
}
