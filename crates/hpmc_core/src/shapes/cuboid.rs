//! Hard cuboids (rectangles in 2D) tested with the separating axis theorem.

use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use super::{Obb, Shape};

/// Axes whose squared length falls below this are treated as degenerate.
const DEGENERATE_AXIS_EPS: f64 = 1e-12;

/// Hard cuboid given by its half-extents along the body axes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    /// Half-extents along the body x, y and z axes.
    pub half_extents: DVec3,
}

impl Cuboid {
    /// Creates a cuboid from full edge lengths.
    pub fn from_edges(edges: DVec3) -> Self {
        Self {
            half_extents: 0.5 * edges,
        }
    }

    /// Projected radius of the cuboid onto `axis`.
    #[inline]
    fn projected_radius(&self, frame: &DMat3, axis: DVec3) -> f64 {
        self.half_extents.x * frame.x_axis.dot(axis).abs()
            + self.half_extents.y * frame.y_axis.dot(axis).abs()
            + self.half_extents.z * frame.z_axis.dot(axis).abs()
    }
}

impl Shape for Cuboid {
    fn circumsphere_diameter(&self) -> f64 {
        2.0 * self.half_extents.length()
    }

    #[inline]
    fn is_orientable(&self) -> bool {
        true
    }

    fn obb(&self, position: DVec3, orientation: DQuat) -> Obb {
        Obb::new(position, orientation, self.half_extents)
    }

    fn overlaps(&self, orientation: DQuat, other: &Self, other_orientation: DQuat, r_ab: DVec3) -> bool {
        if !r_ab.is_finite() {
            return false;
        }
        let fa = DMat3::from_quat(orientation);
        let fb = DMat3::from_quat(other_orientation);
        let a_axes = [fa.x_axis, fa.y_axis, fa.z_axis];
        let b_axes = [fb.x_axis, fb.y_axis, fb.z_axis];

        let separated = |axis: DVec3| -> bool {
            if axis.length_squared() < DEGENERATE_AXIS_EPS {
                return false;
            }
            let distance = r_ab.dot(axis).abs();
            distance >= self.projected_radius(&fa, axis) + other.projected_radius(&fb, axis)
        };

        if a_axes.iter().chain(b_axes.iter()).any(|&axis| separated(axis)) {
            return false;
        }
        for a in a_axes {
            for b in b_axes {
                if separated(a.cross(b)) {
                    return false;
                }
            }
        }
        true
    }
}
