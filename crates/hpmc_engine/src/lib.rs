//! # hpmc_engine: Parallel Hard-Particle Monte Carlo Update Engine
//!
//! ## Layer 2 (Engine) Role
//!
//! hpmc_engine advances a system of hard particles by Monte Carlo sweeps:
//! - Keyed random streams, independent of partitioning and reruns (`rng`)
//! - Iterative overlap resolution and implicit depletants (`sweep`)
//! - Contiguous device partitions, placement-aware buffers and a
//!   `(device, stage)` task graph (`schedule`)
//! - Growable per-group scratch lists (`pool`)
//! - All-reduce collectives over named rank groups (`comm`)
//!
//! ## Dependencies
//!
//! - hpmc_core: shapes, particle store, neighbour sources
//! - rayon: data-parallel execution of task-graph waves and particle loops
//! - rand/rand_distr: uniform, normal and Poisson draws from keyed generators
//! - tracing: sweep spans, scratch growth and convergence diagnostics
//! - thiserror: Structured errors
//!
//! ## Usage Examples
//!
//! ```rust
//! use glam::{DQuat, DVec3};
//! use hpmc_core::neighbours::CellList;
//! use hpmc_core::shapes::Cuboid;
//! use hpmc_core::types::{ParticleData, SimBox};
//! use hpmc_engine::sweep::{Integrator, SweepConfig, TypeParams};
//!
//! let config = SweepConfig::builder().seed(1).nselect(1).build().unwrap();
//! let cube = Cuboid::from_edges(DVec3::ONE);
//! let mut integrator = Integrator::new(config, vec![cube]).unwrap();
//! integrator.set_type_params(0, TypeParams::new(0.1, 0.2)).unwrap();
//!
//! let mut particles = ParticleData::new(SimBox::cubic(12.0), 1);
//! particles.push(DVec3::ZERO, DQuat::IDENTITY, 0).unwrap();
//! particles.push(DVec3::new(3.0, 0.0, 0.0), DQuat::IDENTITY, 0).unwrap();
//!
//! let width = integrator.nominal_width(3);
//! let cells = CellList::build(particles.sim_box(), particles.positions(), width).unwrap();
//! let report = integrator.run_sweep(0, &mut particles, &cells).unwrap();
//! assert_eq!(report.accepted() + report.rejected(), 2);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod comm;
pub mod pool;
pub mod rng;
pub mod schedule;
pub mod sweep;
