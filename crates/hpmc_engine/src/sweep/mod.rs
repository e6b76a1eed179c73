//! Sweep orchestration: proposal, iterative resolution, depletants and commit.
//!
//! # Architecture
//!
//! ```text
//! Integrator::run_sweep(timestep)
//! └── for each substep
//!     ├── UpdateOrder::shuffle        (identity or reversed)
//!     ├── Propose                     (one node per device)
//!     ├── Resolve until converged
//!     │   ├── Narrow                  (one node per device)
//!     │   ├── Count -> Phase1 [-> Phase2 -> Merge]  (per device and pair)
//!     │   ├── all-reduce scratch request / accumulators
//!     │   └── Accept                  (one node per device)
//!     └── Commit
//! ```
//!
//! Reject flags only switch on within a substep, so the loop reaches its
//! fixed point in at most `n + 1` iterations. Every random draw is keyed by
//! stream and ids, so results depend neither on the device count nor on
//! scratch-overflow reruns.
//!
//! # Example
//!
//! ```rust
//! use glam::{DQuat, DVec3};
//! use hpmc_core::neighbours::CellList;
//! use hpmc_core::shapes::Sphere;
//! use hpmc_core::types::{ParticleData, SimBox};
//! use hpmc_engine::sweep::{DepletantParams, Integrator, SweepConfig, TypeParams};
//!
//! let config = SweepConfig::builder().seed(3).n_devices(2).build().unwrap();
//! let mut integrator = Integrator::new(config, vec![Sphere::new(1.0)]).unwrap();
//! integrator.set_type_params(0, TypeParams::new(0.05, 0.0)).unwrap();
//! integrator.set_depletant(0, 0, DepletantParams::new(0.1, 0)).unwrap();
//!
//! let mut particles = ParticleData::new(SimBox::cubic(12.0), 1);
//! for k in 0..4 {
//!     let x = -4.5 + 3.0 * k as f64;
//!     particles.push(DVec3::new(x, 0.0, 0.0), DQuat::IDENTITY, 0).unwrap();
//! }
//!
//! let width = integrator.nominal_width(3);
//! let cells = CellList::build(particles.sim_box(), particles.positions(), width).unwrap();
//! let report = integrator.run_sweep(0, &mut particles, &cells).unwrap();
//! assert_eq!(report.substeps.len(), 4);
//! ```

mod acceptance;
mod buffers;
mod config;
mod context;
mod convergence;
mod counters;
mod depletants;
mod error;
mod integrator;
mod narrow_phase;
mod trial;
mod update_order;

pub use config::{DepletantParams, SweepConfig, SweepConfigBuilder, TypeParams, DEFAULT_NSELECT, DEFAULT_SCRATCH_LEN};
pub use convergence::{LoopState, SubstepReport, SweepReport};
pub use counters::{ImplicitCounters, MoveCounters};
pub use depletants::{depletant_range, insertion_mean, insertion_region, n_pairs, pair_index, pair_types};
pub use error::{ConfigError, HpmcError};
pub use integrator::{Counters, Integrator, PairCounters};
pub use trial::{MoveKind, TrialState};
pub use update_order::UpdateOrder;
