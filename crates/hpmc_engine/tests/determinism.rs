//! Integration tests for reproducibility of sweeps.
//!
//! Every random draw is keyed, so the trajectory must not depend on the
//! device count, on scratch-overflow reruns, on how auxiliary trials are
//! split over ranks, or on pairs whose fugacity is zero.

use std::thread;

use glam::{DQuat, DVec3};
use hpmc_core::neighbours::AllNeighbours;
use hpmc_core::shapes::Sphere;
use hpmc_core::types::{ParticleData, SimBox};
use hpmc_engine::comm::ThreadGroup;
use hpmc_engine::sweep::{Counters, DepletantParams, Integrator, SweepConfig, SweepConfigBuilder, TypeParams};

fn cluster() -> ParticleData {
    let mut particles = ParticleData::new(SimBox::cubic(7.0), 1);
    for z in 0..3 {
        for y in 0..3 {
            for x in 0..3 {
                let p = DVec3::new(x as f64, y as f64, z as f64) * 1.15 - DVec3::splat(1.15);
                particles.push(p, DQuat::IDENTITY, 0).unwrap();
            }
        }
    }
    particles
}

fn integrator(builder: SweepConfigBuilder, depletant: Option<DepletantParams>) -> Integrator<Sphere> {
    let config = builder.seed(99).nselect(2).build().unwrap();
    let mut integrator = Integrator::new(config, vec![Sphere::new(1.0)]).unwrap();
    integrator.set_type_params(0, TypeParams::new(0.12, 0.0)).unwrap();
    if let Some(params) = depletant {
        integrator.set_depletant(0, 0, params).unwrap();
    }
    integrator
}

struct Trajectory {
    positions: Vec<DVec3>,
    counters: Counters,
    overflow_reruns: usize,
}

fn run(mut integrator: Integrator<Sphere>, sweeps: u64) -> Trajectory {
    let mut particles = cluster();
    let neighbours = AllNeighbours::new(particles.len());
    let mut overflow_reruns = 0;
    for t in 0..sweeps {
        let report = integrator.run_sweep(t, &mut particles, &neighbours).unwrap();
        overflow_reruns += report.overflow_reruns();
    }
    Trajectory {
        positions: particles.positions().to_vec(),
        counters: integrator.counters(),
        overflow_reruns,
    }
}

#[test]
fn test_device_count_does_not_change_trajectory() {
    for depletant in [None, Some(DepletantParams::new(0.2, 0)), Some(DepletantParams::new(0.2, 2))] {
        let one = run(integrator(SweepConfig::builder().n_devices(1), depletant), 5);
        let four = run(integrator(SweepConfig::builder().n_devices(4), depletant), 5);
        assert_eq!(one.positions, four.positions);
        assert_eq!(one.counters, four.counters);
    }
}

#[test]
fn test_overflow_reruns_are_idempotent() {
    for depletant in [DepletantParams::new(0.2, 0), DepletantParams::new(-0.2, 0), DepletantParams::new(0.2, 3)] {
        let small = run(
            integrator(SweepConfig::builder().initial_scratch_len(0), Some(depletant)),
            4,
        );
        let large = run(
            integrator(SweepConfig::builder().initial_scratch_len(1024), Some(depletant)),
            4,
        );
        assert!(small.overflow_reruns > 0);
        assert_eq!(large.overflow_reruns, 0);
        assert_eq!(small.positions, large.positions);
        assert_eq!(small.counters, large.counters);
    }
}

#[test]
fn test_zero_fugacity_matches_absent_pair() {
    let absent = run(integrator(SweepConfig::builder(), None), 6);
    let zero = run(
        integrator(SweepConfig::builder(), Some(DepletantParams::new(0.0, 2))),
        6,
    );
    assert_eq!(absent.positions, zero.positions);
    assert_eq!(absent.counters.moves, zero.counters.moves);
    assert!(zero.counters.implicit.is_empty());
}

#[test]
fn test_trial_split_over_ranks_matches_single_rank() {
    let depletant = Some(DepletantParams::new(0.25, 3));
    let single = run(integrator(SweepConfig::builder(), depletant), 4);

    let handles: Vec<_> = ThreadGroup::new("trial", 2)
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let mut integrator =
                    integrator(SweepConfig::builder(), depletant).with_trial_communicator(comm);
                let mut particles = cluster();
                let neighbours = AllNeighbours::new(particles.len());
                for t in 0..4 {
                    integrator.run_sweep(t, &mut particles, &neighbours).unwrap();
                }
                let implicit = integrator.reduced_implicit_counters().unwrap();
                (particles.positions().to_vec(), integrator.counters().moves, implicit)
            })
        })
        .collect();

    for handle in handles {
        let (positions, moves, implicit) = handle.join().unwrap();
        assert_eq!(positions, single.positions);
        assert_eq!(moves, single.counters.moves);
        assert_eq!(implicit, single.counters.implicit);
    }
}

#[test]
fn test_particle_split_over_ranks_matches_single_rank() {
    let depletant = Some(DepletantParams::new(0.25, 0));
    let single = run(integrator(SweepConfig::builder(), depletant), 4);

    let handles: Vec<_> = ThreadGroup::new("particle", 3)
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let mut integrator =
                    integrator(SweepConfig::builder(), depletant).with_particle_communicator(comm);
                let mut particles = cluster();
                let neighbours = AllNeighbours::new(particles.len());
                for t in 0..4 {
                    integrator.run_sweep(t, &mut particles, &neighbours).unwrap();
                }
                let implicit = integrator.reduced_implicit_counters().unwrap();
                (particles.positions().to_vec(), implicit)
            })
        })
        .collect();

    for handle in handles {
        let (positions, implicit) = handle.join().unwrap();
        assert_eq!(positions, single.positions);
        assert_eq!(implicit, single.counters.implicit);
    }
}
