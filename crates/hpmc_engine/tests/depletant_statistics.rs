//! Statistical tests of the implicit depletant estimator.

use approx::assert_relative_eq;
use glam::{DQuat, DVec3};
use hpmc_core::neighbours::AllNeighbours;
use hpmc_core::shapes::Sphere;
use hpmc_core::types::{ParticleData, SimBox};
use hpmc_engine::sweep::{insertion_mean, DepletantParams, Integrator, SweepConfig, TypeParams};

fn free_particle() -> ParticleData {
    let mut particles = ParticleData::new(SimBox::cubic(20.0), 1);
    particles.push(DVec3::ZERO, DQuat::IDENTITY, 0).unwrap();
    particles
}

fn single_particle_integrator(fugacity: f64, seed: u64) -> Integrator<Sphere> {
    let config = SweepConfig::builder()
        .seed(seed)
        .nselect(1)
        .move_ratio(1.0)
        .build()
        .unwrap();
    let mut integrator = Integrator::new(config, vec![Sphere::new(1.0)]).unwrap();
    integrator.set_type_params(0, TypeParams::new(0.1, 0.0)).unwrap();
    integrator
        .set_depletant(0, 0, DepletantParams::new(fugacity, 0))
        .unwrap();
    integrator
}

#[test]
fn test_mean_insertion_count_matches_excluded_volume() {
    let sphere = Sphere::new(1.0);
    let lambda = insertion_mean(&sphere, &sphere, &sphere, 0.5, 3);
    assert_relative_eq!(lambda, 4.0, epsilon = 1e-12);

    let sweeps = 2000;
    let mut integrator = single_particle_integrator(0.5, 17);
    let mut particles = free_particle();
    let neighbours = AllNeighbours::new(1);
    for t in 0..sweeps {
        integrator.run_sweep(t, &mut particles, &neighbours).unwrap();
    }

    let counters = integrator.implicit_counters(0, 0);
    let mean = counters.insert_count as f64 / sweeps as f64;
    assert!((mean - lambda).abs() < 0.2, "mean insertion count {}", mean);
    assert!(counters.insert_accept_count <= counters.insert_count);
    assert!(counters.insert_accept_count_sq >= counters.insert_accept_count);
}

#[test]
fn test_free_particle_acceptance_falls_with_fugacity() {
    let sweeps = 500;
    let acceptance = |fugacity: f64| {
        let mut integrator = single_particle_integrator(fugacity, 5);
        let mut particles = free_particle();
        let neighbours = AllNeighbours::new(1);
        for t in 0..sweeps {
            integrator.run_sweep(t, &mut particles, &neighbours).unwrap();
        }
        integrator
            .counters()
            .moves
            .translate_acceptance()
            .unwrap_or(0.0)
    };

    let dilute = acceptance(0.01);
    let dense = acceptance(2.0);
    assert!(dilute > 0.9, "dilute acceptance {}", dilute);
    assert!(dense < dilute, "dense {} vs dilute {}", dense, dilute);
}
