//! Implicit depletant free-energy estimator.
//!
//! For every type pair with nonzero fugacity, depletants (a co-located
//! pair of the two shapes) are inserted at random into the insertion
//! region of a moving particle. Each depletant that overlaps exactly one
//! of the particle's two configurations and nothing else contributes a
//! signed unit to the particle's free-energy accumulator.
//!
//! # Modes
//!
//! - **Simple** (`ntrial == 0`): Poisson counts keyed by
//!   `(timestep, select, particle, pair)`; insertion around the trial
//!   configuration for positive fugacity and around the old one for
//!   negative fugacity; any nonzero accumulator rejects the move.
//! - **Auxiliary** (`ntrial > 0`): counts per `(particle, trial, side)`
//!   keyed by the auxiliary velocity of that side instead of the timestep.
//!   Phase 1 inserts around the particle itself; phase 2 re-inserts around
//!   each accepted moving neighbour to correct for that neighbour's move.
//!   The merged accumulator feeds a Metropolis-Hastings test.
//!
//! # Architecture
//!
//! ```text
//! count(d, k) ──┬──> phase1(d, k) ──┐
//!               └──> phase2(d, k) ──┴──> merge(d, k)
//! ```

use std::ops::Range;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use glam::{DQuat, DVec3};
use hpmc_core::shapes::{Obb, Shape};
use rayon::prelude::*;

use super::config::DepletantParams;
use super::context::{Pose, StageContext};
use crate::pool::ScratchPool;
use crate::rng::{velocity_words, KeyedRng, Stream};

/// Index of the unordered type pair `(a, b)`.
///
/// Indices of existing pairs stay fixed when more types are registered.
///
/// # Examples
///
/// ```rust
/// use hpmc_engine::sweep::{pair_index, pair_types};
///
/// assert_eq!(pair_index(0, 0), 0);
/// assert_eq!(pair_index(1, 0), pair_index(0, 1));
/// assert_eq!(pair_types(pair_index(2, 1)), (1, 2));
/// ```
#[inline]
pub fn pair_index(a: u32, b: u32) -> usize {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let (lo, hi) = (lo as usize, hi as usize);
    hi * (hi + 1) / 2 + lo
}

/// Inverse of [`pair_index`], returning `(lo, hi)`.
pub fn pair_types(index: usize) -> (u32, u32) {
    let mut hi = 0usize;
    while (hi + 1) * (hi + 2) / 2 <= index {
        hi += 1;
    }
    let lo = index - hi * (hi + 1) / 2;
    (lo as u32, hi as u32)
}

/// Number of unordered pairs over `n_types` types.
#[inline]
pub fn n_pairs(n_types: usize) -> usize {
    n_types * (n_types + 1) / 2
}

/// Interaction range of a depletant made of shapes `a` and `b`.
#[inline]
pub fn depletant_range<S: Shape>(a: &S, b: &S) -> f64 {
    a.circumsphere_diameter().max(b.circumsphere_diameter())
}

/// Region around a particle of shape `shape` in which depletants of the
/// given range are inserted.
#[inline]
pub fn insertion_region<S: Shape>(shape: &S, position: DVec3, orientation: DQuat, range: f64) -> Obb {
    shape.obb(position, orientation).extended(0.5 * range)
}

/// Mean number of depletants inserted per particle of shape `shape`.
///
/// `|fugacity|` times the volume (area in 2D) of the insertion region.
///
/// # Examples
///
/// ```rust
/// use hpmc_core::shapes::Sphere;
/// use hpmc_engine::sweep::insertion_mean;
///
/// let sphere = Sphere::new(1.0);
/// let lambda = insertion_mean(&sphere, &sphere, &sphere, 0.5, 3);
/// assert!((lambda - 4.0).abs() < 1e-12);
/// ```
pub fn insertion_mean<S: Shape>(shape: &S, dep_a: &S, dep_b: &S, fugacity: f64, dimensions: u32) -> f64 {
    let range = depletant_range(dep_a, dep_b);
    fugacity.abs() * insertion_region(shape, DVec3::ZERO, DQuat::IDENTITY, range).volume(dimensions)
}

/// A type pair taking part in the current sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ActivePair {
    pub slot: usize,
    pub types: (u32, u32),
    pub fugacity: f64,
    pub ntrial: u32,
    pub range: f64,
    pub orientable: bool,
}

impl ActivePair {
    #[inline]
    pub fn is_auxiliary(&self) -> bool {
        self.ntrial > 0
    }

    #[inline]
    pub fn sign(&self) -> f64 {
        self.fugacity.signum()
    }
}

/// Per-pair parameters, insertion means and the list of active pairs.
#[derive(Clone, Debug)]
pub(crate) struct DepletantTable {
    n_types: usize,
    params: Vec<DepletantParams>,
    lambda: Vec<f64>,
    active: Vec<ActivePair>,
    computed_for: Option<u32>,
}

impl DepletantTable {
    pub fn new(n_types: usize) -> Self {
        Self {
            n_types,
            params: vec![DepletantParams::default(); n_pairs(n_types)],
            lambda: Vec::new(),
            active: Vec::new(),
            computed_for: None,
        }
    }

    /// Registers more types, keeping existing pair parameters.
    pub fn resize_types(&mut self, n_types: usize) {
        if n_types <= self.n_types {
            return;
        }
        self.n_types = n_types;
        self.params.resize(n_pairs(n_types), DepletantParams::default());
        self.invalidate();
    }

    pub fn set(&mut self, a: u32, b: u32, params: DepletantParams) {
        self.params[pair_index(a, b)] = params;
        self.invalidate();
    }

    pub fn params(&self, a: u32, b: u32) -> Option<DepletantParams> {
        self.params.get(pair_index(a, b)).copied()
    }

    /// Forces insertion means to be recomputed before the next sweep.
    pub fn invalidate(&mut self) {
        self.computed_for = None;
    }

    /// Recomputes active pairs and insertion means if stale.
    pub fn ensure_lambda<S: Shape>(&mut self, shapes: &[S], dimensions: u32) {
        if self.computed_for == Some(dimensions) {
            return;
        }
        let n_slots = self.params.len();
        self.lambda = vec![0.0; self.n_types * n_slots];
        self.active.clear();
        for (slot, params) in self.params.iter().enumerate() {
            if !params.is_active() {
                continue;
            }
            let (a, b) = pair_types(slot);
            let (shape_a, shape_b) = (&shapes[a as usize], &shapes[b as usize]);
            for (k, shape) in shapes.iter().enumerate().take(self.n_types) {
                self.lambda[k * n_slots + slot] =
                    insertion_mean(shape, shape_a, shape_b, params.fugacity, dimensions);
            }
            self.active.push(ActivePair {
                slot,
                types: (a, b),
                fugacity: params.fugacity,
                ntrial: params.ntrial,
                range: depletant_range(shape_a, shape_b),
                orientable: shape_a.is_orientable() || shape_b.is_orientable(),
            });
        }
        self.computed_for = Some(dimensions);
    }

    #[inline]
    pub fn lambda(&self, type_id: u32, slot: usize) -> f64 {
        self.lambda[type_id as usize * self.params.len() + slot]
    }

    #[inline]
    pub fn active(&self) -> &[ActivePair] {
        &self.active
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn any_auxiliary(&self) -> bool {
        self.active.iter().any(ActivePair::is_auxiliary)
    }

    pub fn max_ntrial(&self) -> usize {
        self.active.iter().map(|p| p.ntrial as usize).max().unwrap_or(0)
    }
}

/// Share of the insertion work owned by this rank.
#[derive(Clone, Debug)]
pub(crate) struct WorkSplit {
    pub trial_rank: usize,
    pub trial_size: usize,
    pub particles: Range<usize>,
}

impl WorkSplit {
    #[inline]
    fn owns_trial(&self, t: u32) -> bool {
        t as usize % self.trial_size == self.trial_rank
    }

    #[inline]
    fn owns_simple(&self) -> bool {
        self.trial_rank == 0
    }
}

/// Buffers and parameters used by the insertion stages.
pub(crate) struct InsertionContext<'a, S: Shape> {
    pub stage: &'a StageContext<'a, S>,
    pub table: &'a DepletantTable,
    pub counts: &'a [AtomicU32],
    pub trial_counts: &'a [AtomicU32],
    pub delta: &'a [AtomicI32],
    pub delta_phase2: &'a [AtomicI32],
    pub scratch: &'a ScratchPool,
    pub split: WorkSplit,
    pub max_diameter: f64,
    pub max_translation: f64,
}

impl<S: Shape> InsertionContext<'_, S> {
    #[inline]
    fn n_active(&self) -> usize {
        self.table.active().len()
    }

    #[inline]
    fn count_index(&self, i: usize, a: usize) -> usize {
        i * self.n_active() + a
    }

    #[inline]
    fn trial_count_index(&self, i: usize, a: usize, t: u32, side: usize) -> usize {
        ((i * self.n_active() + a) * self.table.max_ntrial() + t as usize) * 2 + side
    }

    /// Whether this rank inserts depletants for particle `i`.
    #[inline]
    fn is_eligible(&self, i: usize) -> bool {
        self.split.particles.contains(&i) && self.stage.is_live_move(i)
    }

    fn device_particles(&self, device: usize) -> &[usize] {
        self.stage
            .order
            .device_order(self.stage.partition.range(device))
    }

    /// Neighbours of `center_particle` that can reach the region around `center`.
    fn candidates<'b>(
        &'b self,
        center_particle: usize,
        center: DVec3,
        region: &Obb,
        pair: &ActivePair,
        exclude: Option<usize>,
    ) -> impl Iterator<Item = usize> + 'b {
        let stage: &'b StageContext<'b, S> = self.stage;
        let reach = region.circumradius(stage.dimensions())
            + 0.5 * pair.range
            + 0.5 * self.max_diameter
            + self.max_translation;
        let reach_sq = reach * reach;
        stage
            .neighbours
            .neighbours_of(center_particle)
            .iter()
            .copied()
            .filter(move |&j| Some(j) != exclude)
            .filter(move |&j| {
                stage
                    .separation(center, stage.old_pose(j).position)
                    .length_squared()
                    <= reach_sq
            })
    }

    /// Whether a depletant at `dep` overlaps `shape` placed at `pose`.
    #[inline]
    fn depletant_overlaps(&self, pair: &ActivePair, dep: Pose, shape: &S, pose: Pose) -> bool {
        let stage = self.stage;
        let r = stage.separation(dep.position, pose.position);
        let (a, b) = pair.types;
        let shape_a = &stage.shapes[a as usize];
        if shape_a.overlaps_checked(dep.orientation, shape, pose.orientation, r) {
            return true;
        }
        b != a
            && stage.shapes[b as usize].overlaps_checked(dep.orientation, shape, pose.orientation, r)
    }

    fn sample_depletant(&self, rng: &mut KeyedRng, region: &Obb, pair: &ActivePair) -> Pose {
        let dims = self.stage.dimensions();
        let position = self.stage.sim_box().wrap(region.point_at(rng.gen_unit_cube(), dims));
        let orientation = if pair.orientable {
            rng.gen_orientation(dims)
        } else {
            DQuat::IDENTITY
        };
        Pose {
            position,
            orientation,
        }
    }

    fn aux_velocity(&self, i: usize, side: usize) -> DVec3 {
        if side == 0 {
            self.stage.particles.velocities()[i]
        } else {
            self.stage.trials[i].velocity
        }
    }
}

/// Draws the depletant counts of every particle owned by `device`.
pub(crate) fn draw_counts<S: Shape>(ctx: &InsertionContext<'_, S>, device: usize, a: usize) {
    let pair = ctx.table.active()[a];
    let stage = ctx.stage;
    ctx.device_particles(device).par_iter().for_each(|&i| {
        let eligible = ctx.is_eligible(i);
        let type_i = stage.particles.types()[i];
        let lambda = ctx.table.lambda(type_i, pair.slot);
        if !pair.is_auxiliary() {
            let n = if eligible && ctx.split.owns_simple() {
                KeyedRng::new(
                    Stream::DepletantCount,
                    stage.seed,
                    &[stage.timestep, stage.select, i as u64, pair.slot as u64],
                )
                .gen_poisson(lambda)
            } else {
                0
            };
            ctx.counts[ctx.count_index(i, a)].store(n, Ordering::Relaxed);
            return;
        }
        for t in 0..pair.ntrial {
            for side in 0..2 {
                let n = if eligible && ctx.split.owns_trial(t) {
                    let [vx, vy, vz] = velocity_words(ctx.aux_velocity(i, side));
                    KeyedRng::new(
                        Stream::DepletantCountTrial,
                        stage.seed,
                        &[i as u64, pair.slot as u64, t as u64, side as u64, vx, vy, vz],
                    )
                    .gen_poisson(lambda)
                } else {
                    0
                };
                ctx.trial_counts[ctx.trial_count_index(i, a, t, side)].store(n, Ordering::Relaxed);
            }
        }
    });
}

/// Inserts depletants around each particle owned by `device` (phase 1).
pub(crate) fn insert_phase1<S: Shape>(ctx: &InsertionContext<'_, S>, device: usize, a: usize) {
    let pair = ctx.table.active()[a];
    ctx.device_particles(device).par_iter().for_each(|&i| {
        if !ctx.is_eligible(i) {
            return;
        }
        if pair.is_auxiliary() {
            phase1_auxiliary(ctx, device, a, &pair, i);
        } else if ctx.split.owns_simple() {
            phase1_simple(ctx, device, a, &pair, i);
        }
    });
}

fn phase1_simple<S: Shape>(
    ctx: &InsertionContext<'_, S>,
    device: usize,
    a: usize,
    pair: &ActivePair,
    i: usize,
) {
    let stage = ctx.stage;
    let n = ctx.counts[ctx.count_index(i, a)].load(Ordering::Relaxed);
    if n == 0 {
        return;
    }
    let positive = pair.fugacity > 0.0;
    let (center, other) = if positive {
        (stage.trial_pose(i), stage.old_pose(i))
    } else {
        (stage.old_pose(i), stage.trial_pose(i))
    };
    let shape_i = stage.shape_of(i);
    let region = insertion_region(shape_i, center.position, center.orientation, pair.range);
    let candidates = ctx.candidates(i, center.position, &region, pair, None);

    let free = ctx.scratch.gather(candidates, |neighbours| {
        let mut free = 0u64;
        for k in 0..n {
            let mut rng = KeyedRng::new(
                Stream::DepletantInsert,
                stage.seed,
                &[stage.timestep, stage.select, i as u64, pair.slot as u64, k as u64],
            );
            let dep = ctx.sample_depletant(&mut rng, &region, pair);
            if !ctx.depletant_overlaps(pair, dep, shape_i, center)
                || ctx.depletant_overlaps(pair, dep, shape_i, other)
            {
                continue;
            }
            let blocked = neighbours
                .iter()
                .any(|&j| ctx.depletant_overlaps(pair, dep, stage.shape_of(j), stage.current_pose(j)));
            if !blocked {
                free += 1;
            }
        }
        free
    });

    // None: scratch overflow, the iteration is rerun.
    if let Some(free) = free {
        let signed = if positive { -(free as i32) } else { free as i32 };
        if signed != 0 {
            ctx.delta[ctx.count_index(i, a)].fetch_add(signed, Ordering::Relaxed);
        }
        stage
            .counters
            .record_insertions(device, pair.slot, u64::from(n), free);
    }
}

fn phase1_auxiliary<S: Shape>(
    ctx: &InsertionContext<'_, S>,
    device: usize,
    a: usize,
    pair: &ActivePair,
    i: usize,
) {
    let stage = ctx.stage;
    let shape_i = stage.shape_of(i);
    let mut sum = 0i32;
    for t in (0..pair.ntrial).filter(|&t| ctx.split.owns_trial(t)) {
        for side in 0..2 {
            let n = ctx.trial_counts[ctx.trial_count_index(i, a, t, side)].load(Ordering::Relaxed);
            if n == 0 {
                continue;
            }
            let center = stage.side_pose(i, side);
            let other = stage.side_pose(i, 1 - side);
            let [vx, vy, vz] = velocity_words(ctx.aux_velocity(i, side));
            let region = insertion_region(shape_i, center.position, center.orientation, pair.range);
            let candidates = ctx.candidates(i, center.position, &region, pair, None);

            let free = ctx.scratch.gather(candidates, |neighbours| {
                let mut free = 0u64;
                for k in 0..n {
                    let mut rng = KeyedRng::new(
                        Stream::DepletantInsert,
                        stage.seed,
                        &[
                            i as u64,
                            pair.slot as u64,
                            t as u64,
                            side as u64,
                            k as u64,
                            vx,
                            vy,
                            vz,
                        ],
                    );
                    let dep = ctx.sample_depletant(&mut rng, &region, pair);
                    if !ctx.depletant_overlaps(pair, dep, shape_i, center)
                        || ctx.depletant_overlaps(pair, dep, shape_i, other)
                    {
                        continue;
                    }
                    let blocked = neighbours.iter().any(|&j| {
                        ctx.depletant_overlaps(pair, dep, stage.shape_of(j), stage.old_pose(j))
                    });
                    if !blocked {
                        free += 1;
                    }
                }
                free
            });
            let Some(free) = free else {
                return;
            };
            sum += if side == 0 { free as i32 } else { -(free as i32) };
            stage
                .counters
                .record_insertions(device, pair.slot, u64::from(n), free);
        }
    }
    if sum != 0 {
        ctx.delta[ctx.count_index(i, a)].fetch_add(sum, Ordering::Relaxed);
    }
}

/// Re-inserts depletants around the accepted moving neighbours of each
/// particle owned by `device` (phase 2).
pub(crate) fn insert_phase2<S: Shape>(ctx: &InsertionContext<'_, S>, device: usize, a: usize) {
    let pair = ctx.table.active()[a];
    ctx.device_particles(device).par_iter().for_each(|&i| {
        if ctx.is_eligible(i) {
            phase2_particle(ctx, device, a, &pair, i);
        }
    });
}

fn phase2_particle<S: Shape>(
    ctx: &InsertionContext<'_, S>,
    device: usize,
    a: usize,
    pair: &ActivePair,
    i: usize,
) {
    let stage = ctx.stage;
    let shape_i = stage.shape_of(i);
    let (old_i, new_i) = (stage.old_pose(i), stage.trial_pose(i));
    let mut sum = 0i32;

    for &j in stage.neighbours.neighbours_of(i) {
        if !stage.is_live_move(j) {
            continue;
        }
        let shape_j = stage.shape_of(j);
        let lambda = ctx.table.lambda(stage.particles.types()[j], pair.slot);
        for t in (0..pair.ntrial).filter(|&t| ctx.split.owns_trial(t)) {
            for side in 0..2 {
                let [vx, vy, vz] = velocity_words(ctx.aux_velocity(j, side));
                let words = [
                    i as u64,
                    j as u64,
                    pair.slot as u64,
                    t as u64,
                    side as u64,
                    vx,
                    vy,
                    vz,
                ];
                let n = KeyedRng::new(Stream::DepletantNeighbourCount, stage.seed, &words)
                    .gen_poisson(lambda);
                if n == 0 {
                    continue;
                }
                let center = stage.side_pose(j, side);
                let other = stage.side_pose(j, 1 - side);
                let region =
                    insertion_region(shape_j, center.position, center.orientation, pair.range);
                let candidates = ctx.candidates(j, center.position, &region, pair, Some(i));

                let result = ctx.scratch.gather(candidates, |third| {
                    let mut contribution = 0i32;
                    let mut free = 0u64;
                    for k in 0..n {
                        let mut key = [0u64; 9];
                        key[..8].copy_from_slice(&words);
                        key[8] = u64::from(k);
                        let mut rng =
                            KeyedRng::new(Stream::DepletantNeighbourInsert, stage.seed, &key);
                        let dep = ctx.sample_depletant(&mut rng, &region, pair);
                        if !ctx.depletant_overlaps(pair, dep, shape_j, center)
                            || ctx.depletant_overlaps(pair, dep, shape_j, other)
                        {
                            continue;
                        }
                        let weight = match (
                            ctx.depletant_overlaps(pair, dep, shape_i, old_i),
                            ctx.depletant_overlaps(pair, dep, shape_i, new_i),
                        ) {
                            (true, false) => 1,
                            (false, true) => -1,
                            _ => continue,
                        };
                        let blocked = third.iter().any(|&m| {
                            ctx.depletant_overlaps(pair, dep, stage.shape_of(m), stage.old_pose(m))
                        });
                        if blocked {
                            continue;
                        }
                        free += 1;
                        contribution += if side == 0 { weight } else { -weight };
                    }
                    (contribution, free)
                });
                let Some((contribution, free)) = result else {
                    return;
                };
                sum += contribution;
                stage
                    .counters
                    .record_insertions(device, pair.slot, u64::from(n), free);
            }
        }
    }
    if sum != 0 {
        ctx.delta_phase2[ctx.count_index(i, a)].fetch_add(sum, Ordering::Relaxed);
    }
}

/// Adds the phase-2 accumulator into the main one and clears it.
pub(crate) fn merge_phase2<S: Shape>(ctx: &InsertionContext<'_, S>, device: usize, a: usize) {
    ctx.device_particles(device).par_iter().for_each(|&i| {
        let idx = ctx.count_index(i, a);
        let v = ctx.delta_phase2[idx].swap(0, Ordering::Relaxed);
        if v != 0 {
            ctx.delta[idx].fetch_add(v, Ordering::Relaxed);
        }
    });
}
