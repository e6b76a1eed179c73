//! Hard spheres (discs in 2D).

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use super::{Obb, Shape};

/// Hard sphere of a given diameter.
///
/// Orientation never affects the overlap test.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Sphere diameter.
    pub diameter: f64,
}

impl Sphere {
    /// Creates a sphere of the given diameter.
    pub fn new(diameter: f64) -> Self {
        Self { diameter }
    }
}

impl Shape for Sphere {
    #[inline]
    fn circumsphere_diameter(&self) -> f64 {
        self.diameter
    }

    #[inline]
    fn is_orientable(&self) -> bool {
        false
    }

    fn obb(&self, position: DVec3, _orientation: DQuat) -> Obb {
        Obb::new(
            position,
            DQuat::IDENTITY,
            DVec3::splat(0.5 * self.diameter),
        )
    }

    fn overlaps(&self, _orientation: DQuat, other: &Self, _other_orientation: DQuat, r_ab: DVec3) -> bool {
        if !r_ab.is_finite() {
            return false;
        }
        let contact = 0.5 * (self.diameter + other.diameter);
        r_ab.length_squared() < contact * contact
    }
}
