//! Oriented bounding boxes used as depletant insertion regions.

use glam::{DQuat, DVec3};

/// Oriented bounding box described by its centre, rotation and half-lengths.
///
/// # Examples
///
/// ```rust
/// use glam::{DQuat, DVec3};
/// use hpmc_core::shapes::Obb;
///
/// let obb = Obb::new(DVec3::ZERO, DQuat::IDENTITY, DVec3::splat(0.5));
/// assert!((obb.volume(3) - 1.0).abs() < 1e-12);
/// assert!((obb.extended(0.5).volume(3) - 8.0).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obb {
    /// Centre of the box.
    pub center: DVec3,
    /// Rotation from the body frame to the lab frame.
    pub rotation: DQuat,
    /// Half-lengths along the body axes.
    pub half_lengths: DVec3,
}

impl Obb {
    /// Creates a new oriented bounding box.
    pub fn new(center: DVec3, rotation: DQuat, half_lengths: DVec3) -> Self {
        Self {
            center,
            rotation,
            half_lengths,
        }
    }

    /// Volume of the box, or its area for `dimensions == 2`.
    pub fn volume(&self, dimensions: u32) -> f64 {
        let h = self.half_lengths;
        if dimensions == 2 {
            4.0 * h.x * h.y
        } else {
            8.0 * h.x * h.y * h.z
        }
    }

    /// Returns a copy grown by `by` along every body axis.
    pub fn extended(&self, by: f64) -> Self {
        Self {
            half_lengths: self.half_lengths + DVec3::splat(by),
            ..*self
        }
    }

    /// Radius of the smallest sphere (disc in 2D) around the centre that
    /// contains the box.
    pub fn circumradius(&self, dimensions: u32) -> f64 {
        let h = self.half_lengths;
        if dimensions == 2 {
            h.x.hypot(h.y)
        } else {
            h.length()
        }
    }

    /// Maps a point of the unit cube onto the box.
    ///
    /// Each component of `unit` is expected in `[0, 1)`. Uniform `unit`
    /// samples give uniform points in the box; in 2D the point stays in the
    /// plane of the centre.
    pub fn point_at(&self, unit: DVec3, dimensions: u32) -> DVec3 {
        let mut local = (unit * 2.0 - DVec3::ONE) * self.half_lengths;
        if dimensions == 2 {
            local.z = 0.0;
        }
        self.center + self.rotation * local
    }
}
