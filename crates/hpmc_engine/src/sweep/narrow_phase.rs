//! Narrow-phase overlap resolution.
//!
//! A moving particle is rejected if its trial configuration overlaps
//! (a) the old configuration of any neighbour, or (b) the trial
//! configuration of a neighbour whose own move is still accepted.
//! Rejections only switch on within a substep:
//! `reject_out[i] = reject[i] || overlap(i)`.

use std::sync::atomic::Ordering;

use hpmc_core::shapes::Shape;
use rayon::prelude::*;

use super::context::{Pose, StageContext};

/// Writes `reject_out` for every particle owned by `device`.
pub(crate) fn resolve_device<S: Shape>(ctx: &StageContext<'_, S>, device: usize) {
    let checks: u64 = ctx
        .order
        .device_order(ctx.partition.range(device))
        .par_iter()
        .map(|&i| {
            let rejected = ctx.is_rejected(i);
            let (overlap, checks) = if rejected { (false, 0) } else { test_particle(ctx, i) };
            ctx.reject_out[i].store(rejected || overlap, Ordering::Relaxed);
            checks
        })
        .sum();
    ctx.counters.add_overlap_checks(device, checks);
}

/// Tests the trial of `i` against its neighbours.
///
/// Returns whether an overlap was found and how many exact tests ran.
fn test_particle<S: Shape>(ctx: &StageContext<'_, S>, i: usize) -> (bool, u64) {
    if !ctx.trials[i].is_move() {
        return (false, 0);
    }
    let shape_i = ctx.shape_of(i);
    let new_i = ctx.trial_pose(i);
    let mut checks = 0;
    for &j in ctx.neighbours.neighbours_of(i) {
        let shape_j = ctx.shape_of(j);
        if pair_overlaps(ctx, shape_i, new_i, shape_j, ctx.old_pose(j), &mut checks) {
            return (true, checks);
        }
        if ctx.is_live_move(j)
            && pair_overlaps(ctx, shape_i, new_i, shape_j, ctx.trial_pose(j), &mut checks)
        {
            return (true, checks);
        }
    }
    (false, checks)
}

#[inline]
fn pair_overlaps<S: Shape>(
    ctx: &StageContext<'_, S>,
    shape_a: &S,
    a: Pose,
    shape_b: &S,
    b: Pose,
    checks: &mut u64,
) -> bool {
    let r = ctx.separation(a.position, b.position);
    let reach = 0.5 * (shape_a.circumsphere_diameter() + shape_b.circumsphere_diameter());
    if r.length_squared() > reach * reach {
        return false;
    }
    *checks += 1;
    shape_a.overlaps(a.orientation, shape_b, b.orientation, r)
}
