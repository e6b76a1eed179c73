//! Final accept/reject decision and commit of accepted trials.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use glam::{DQuat, DVec3};
use hpmc_core::shapes::Shape;
use hpmc_core::types::ParticleData;
use rayon::prelude::*;

use super::context::StageContext;
use super::counters::DeviceCounters;
use super::depletants::DepletantTable;
use super::trial::TrialState;
use crate::rng::{KeyedRng, Stream};
use crate::schedule::DevicePartition;

/// Folds the depletant free-energy test into `reject_out` for the
/// particles owned by `device`.
///
/// Sets `condition` if any flag owned by `device` differs from the state
/// the iteration started from.
pub(crate) fn accept_device<S: Shape>(
    ctx: &StageContext<'_, S>,
    table: &DepletantTable,
    delta: &[AtomicI32],
    condition: &AtomicBool,
    device: usize,
) {
    let n_active = table.active().len();
    let flipped = ctx
        .order
        .device_order(ctx.partition.range(device))
        .par_iter()
        .filter(|&&i| {
            if n_active > 0
                && !ctx.reject_out[i].load(Ordering::Relaxed)
                && ctx.trials[i].is_move()
                && !depletant_accept(ctx, table, &delta[i * n_active..(i + 1) * n_active], i)
            {
                ctx.reject_out[i].store(true, Ordering::Relaxed);
            }
            ctx.reject_out[i].load(Ordering::Relaxed) != ctx.reject[i].load(Ordering::Relaxed)
        })
        .count();
    if flipped > 0 {
        condition.store(true, Ordering::Release);
    }
}

/// Depletant acceptance test of particle `i` given its accumulators.
fn depletant_accept<S: Shape>(
    ctx: &StageContext<'_, S>,
    table: &DepletantTable,
    delta: &[AtomicI32],
    i: usize,
) -> bool {
    let mut log_acc = 0.0;
    let mut auxiliary = false;
    for (pair, d) in table.active().iter().zip(delta) {
        let d = d.load(Ordering::Relaxed);
        if pair.is_auxiliary() {
            auxiliary = true;
            log_acc += pair.sign() * f64::from(d) / f64::from(pair.ntrial);
        } else if d != 0 {
            return false;
        }
    }
    if !auxiliary {
        return true;
    }
    let u = KeyedRng::new(
        Stream::DepletantAccept,
        ctx.seed,
        &[ctx.timestep, ctx.select, i as u64],
    )
    .gen_uniform();
    u.ln() < log_acc
}

/// Writes accepted trials into the particle store.
///
/// Returns the number of accepted and rejected moves.
pub(crate) fn commit(
    particles: &mut ParticleData,
    trials: &[TrialState],
    reject: &[AtomicBool],
    partition: &DevicePartition,
    counters: &DeviceCounters,
) -> (u64, u64) {
    let (positions, orientations, velocities) = particles.state_mut();
    positions
        .par_iter_mut()
        .zip(orientations.par_iter_mut())
        .zip(velocities.par_iter_mut())
        .enumerate()
        .map(|(i, ((position, orientation), velocity))| {
            commit_particle(i, position, orientation, velocity, trials, reject, partition, counters)
        })
        .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
}

#[allow(clippy::too_many_arguments)]
#[inline]
fn commit_particle(
    i: usize,
    position: &mut DVec3,
    orientation: &mut DQuat,
    velocity: &mut DVec3,
    trials: &[TrialState],
    reject: &[AtomicBool],
    partition: &DevicePartition,
    counters: &DeviceCounters,
) -> (u64, u64) {
    let trial = &trials[i];
    if !trial.is_move() {
        return (0, 0);
    }
    let accepted = !reject[i].load(Ordering::Relaxed);
    counters.record_move(partition.device_of(i), trial.kind, accepted);
    if !accepted {
        return (0, 1);
    }
    *position = trial.position;
    *orientation = trial.orientation;
    *velocity = trial.velocity;
    (1, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::trial::MoveKind;
    use hpmc_core::types::SimBox;

    fn two_particles() -> ParticleData {
        let mut p = ParticleData::new(SimBox::cubic(10.0), 1);
        p.push(DVec3::ZERO, DQuat::IDENTITY, 0).unwrap();
        p.push(DVec3::X, DQuat::IDENTITY, 0).unwrap();
        p
    }

    #[test]
    fn test_commit_writes_only_accepted_moves() {
        let mut particles = two_particles();
        let trials = vec![
            TrialState {
                position: DVec3::new(0.1, 0.0, 0.0),
                orientation: DQuat::IDENTITY,
                velocity: DVec3::Y,
                kind: MoveKind::Translate,
            },
            TrialState {
                position: DVec3::new(1.5, 0.0, 0.0),
                orientation: DQuat::IDENTITY,
                velocity: DVec3::Y,
                kind: MoveKind::Translate,
            },
        ];
        let reject = vec![AtomicBool::new(false), AtomicBool::new(true)];
        let partition = DevicePartition::new(2, 2);
        let counters = DeviceCounters::new(2, 0);

        let (accepted, rejected) = commit(&mut particles, &trials, &reject, &partition, &counters);
        assert_eq!((accepted, rejected), (1, 1));
        assert_eq!(particles.positions()[0], DVec3::new(0.1, 0.0, 0.0));
        assert_eq!(particles.velocities()[0], DVec3::Y);
        assert_eq!(particles.positions()[1], DVec3::X);
        assert_eq!(particles.velocities()[1], DVec3::ZERO);

        let (moves, _) = counters.reduce();
        assert_eq!(moves.translate_accept, 1);
        assert_eq!(moves.translate_reject, 1);
    }

    #[test]
    fn test_commit_skips_non_moves() {
        let mut particles = two_particles();
        let trials = vec![TrialState::default(); 2];
        let reject = vec![AtomicBool::new(false), AtomicBool::new(false)];
        let partition = DevicePartition::new(2, 1);
        let counters = DeviceCounters::new(1, 0);

        assert_eq!(commit(&mut particles, &trials, &reject, &partition, &counters), (0, 0));
        assert_eq!(particles.positions()[1], DVec3::X);
        assert_eq!(counters.reduce().0.attempted(), 0);
    }
}
