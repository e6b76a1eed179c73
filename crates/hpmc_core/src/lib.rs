//! # hpmc_core: Geometry Foundation for Hard-Particle Monte Carlo
//!
//! ## Layer 1 (Foundation) Role
//!
//! hpmc_core serves as the bottom layer of the workspace, providing:
//! - Simulation box with per-axis periodicity (`types::SimBox`)
//! - Structure-of-arrays particle store (`types::ParticleData`)
//! - Shape capability trait and hard shapes (`shapes`)
//! - Neighbour sources consumed by the update engine (`neighbours`)
//! - Error types: `CoreError` (`types`)
//!
//! ## Minimal Dependencies
//!
//! Layer 1 has no dependencies on other hpmc_* crates:
//! - glam: `DVec3`/`DQuat` for positions and orientations
//! - thiserror: Structured errors
//! - serde: Serialisation of boxes, shapes and particle data
//!
//! ## Usage Examples
//!
//! ```rust
//! use glam::{DQuat, DVec3};
//! use hpmc_core::neighbours::{CellList, NeighbourSource};
//! use hpmc_core::shapes::{Shape, Sphere};
//! use hpmc_core::types::{ParticleData, SimBox};
//!
//! let mut particles = ParticleData::new(SimBox::cubic(10.0), 1);
//! particles.push(DVec3::ZERO, DQuat::IDENTITY, 0).unwrap();
//! particles.push(DVec3::new(0.8, 0.0, 0.0), DQuat::IDENTITY, 0).unwrap();
//!
//! let cells = CellList::build(particles.sim_box(), particles.positions(), 2.0).unwrap();
//! assert_eq!(cells.neighbours_of(0), &[1]);
//!
//! let sphere = Sphere::new(1.0);
//! let r = particles.positions()[1] - particles.positions()[0];
//! assert!(sphere.overlaps(DQuat::IDENTITY, &sphere, DQuat::IDENTITY, r));
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod neighbours;
pub mod shapes;
pub mod types;
