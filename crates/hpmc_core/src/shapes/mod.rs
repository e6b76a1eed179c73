//! Shape capability interface and concrete hard shapes.
//!
//! The update engine is generic over a single [`Shape`] family: every
//! particle type carries one value of that family with its own parameters.
//!
//! # Contract
//!
//! - `overlaps` is pure, deterministic and symmetric under exchanging the
//!   two shapes and negating the separation.
//! - A non-finite separation never reports an overlap.
//! - `obb` bounds the shape; `circumsphere_diameter` bounds every
//!   orientation of it.

mod cuboid;
mod obb;
mod sphere;

pub use cuboid::Cuboid;
pub use obb::Obb;
pub use sphere::Sphere;

use glam::{DQuat, DVec3};

/// Geometric capabilities required by the update engine.
pub trait Shape: Clone + Send + Sync + std::fmt::Debug {
    /// Diameter of the smallest sphere centred on the particle that
    /// contains the shape in every orientation.
    fn circumsphere_diameter(&self) -> f64;

    /// Whether rotations change the shape's footprint.
    fn is_orientable(&self) -> bool;

    /// Oriented bounding box of the shape placed at `position`.
    fn obb(&self, position: DVec3, orientation: DQuat) -> Obb;

    /// Exact overlap test of `self` against `other`, where `r_ab` points
    /// from the centre of `self` to the centre of `other`.
    fn overlaps(&self, orientation: DQuat, other: &Self, other_orientation: DQuat, r_ab: DVec3) -> bool;

    /// Circumsphere pre-check followed by the exact test.
    #[inline]
    fn overlaps_checked(
        &self,
        orientation: DQuat,
        other: &Self,
        other_orientation: DQuat,
        r_ab: DVec3,
    ) -> bool {
        let reach = 0.5 * (self.circumsphere_diameter() + other.circumsphere_diameter());
        r_ab.length_squared() <= reach * reach
            && self.overlaps(orientation, other, other_orientation, r_ab)
    }
}
