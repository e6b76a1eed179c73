//! Criterion benchmarks for hpmc_engine sweeps.
//!
//! Measures one sweep of hard spheres on a simple-cubic lattice with and
//! without implicit depletants, across system sizes and device counts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{DQuat, DVec3};
use hpmc_core::neighbours::CellList;
use hpmc_core::shapes::Sphere;
use hpmc_core::types::{ParticleData, SimBox};
use hpmc_engine::sweep::{DepletantParams, Integrator, SweepConfig, TypeParams};

/// Simple-cubic lattice of `per_axis³` spheres at the given spacing.
fn generate_lattice(per_axis: usize, spacing: f64) -> ParticleData {
    let length = per_axis as f64 * spacing;
    let mut particles = ParticleData::new(SimBox::cubic(length), 1);
    for z in 0..per_axis {
        for y in 0..per_axis {
            for x in 0..per_axis {
                let p = (DVec3::new(x as f64, y as f64, z as f64) + DVec3::splat(0.5)) * spacing
                    - DVec3::splat(0.5 * length);
                particles.push(p, DQuat::IDENTITY, 0).unwrap();
            }
        }
    }
    particles
}

fn integrator(n_devices: usize, depletant: Option<DepletantParams>) -> Integrator<Sphere> {
    let config = SweepConfig::builder()
        .seed(42)
        .nselect(1)
        .n_devices(n_devices)
        .build()
        .unwrap();
    let mut integrator = Integrator::new(config, vec![Sphere::new(1.0)]).unwrap();
    integrator.set_type_params(0, TypeParams::new(0.1, 0.0)).unwrap();
    if let Some(params) = depletant {
        integrator.set_depletant(0, 0, params).unwrap();
    }
    integrator
}

/// Benchmark hard-sphere sweeps across system sizes.
fn bench_hard_sphere_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("hard_sphere_sweep");

    for per_axis in [6, 10, 14] {
        let n = per_axis * per_axis * per_axis;
        group.bench_with_input(BenchmarkId::new("n_particles", n), &per_axis, |b, &per_axis| {
            let mut integrator = integrator(1, None);
            let mut particles = generate_lattice(per_axis, 1.25);
            let width = integrator.nominal_width(3);
            let mut t = 0;
            b.iter(|| {
                let cells =
                    CellList::build(particles.sim_box(), particles.positions(), width).unwrap();
                t += 1;
                black_box(integrator.run_sweep(t, &mut particles, &cells).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark device scaling with simple and auxiliary depletants.
fn bench_depletant_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("depletant_sweep");

    for (label, params) in [
        ("simple", DepletantParams::new(0.5, 0)),
        ("auxiliary", DepletantParams::new(0.5, 2)),
    ] {
        for n_devices in [1, 4] {
            group.bench_with_input(
                BenchmarkId::new(label, n_devices),
                &n_devices,
                |b, &n_devices| {
                    let mut integrator = integrator(n_devices, Some(params));
                    let mut particles = generate_lattice(6, 1.6);
                    let width = integrator.nominal_width(3);
                    let mut t = 0;
                    b.iter(|| {
                        let cells = CellList::build(particles.sim_box(), particles.positions(), width)
                            .unwrap();
                        t += 1;
                        black_box(integrator.run_sweep(t, &mut particles, &cells).unwrap());
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_hard_sphere_sweep, bench_depletant_sweep);
criterion_main!(benches);
