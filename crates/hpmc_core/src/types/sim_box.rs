//! Orthorhombic simulation box with per-axis periodicity.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::error::CoreError;

/// Orthorhombic simulation box centred on the origin.
///
/// Positions inside the box lie in `[-L/2, L/2)` along every axis. Each
/// axis may be periodic or closed. Two-dimensional boxes ignore the z axis:
/// it is never periodic and positions keep `z = 0`.
///
/// # Examples
///
/// ```rust
/// use glam::DVec3;
/// use hpmc_core::types::SimBox;
///
/// let sim_box = SimBox::cubic(10.0);
/// let wrapped = sim_box.wrap(DVec3::new(6.0, 0.0, -5.5));
/// assert!((wrapped.x + 4.0).abs() < 1e-12);
/// assert!((wrapped.z - 4.5).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimBox {
    lengths: DVec3,
    periodic: [bool; 3],
    dimensions: u32,
}

impl SimBox {
    /// Creates a box with explicit lengths, periodicity and dimensionality.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidBox` if `dimensions` is not 2 or 3, or if
    /// any used length is not positive and finite.
    pub fn new(lengths: DVec3, periodic: [bool; 3], dimensions: u32) -> Result<Self, CoreError> {
        if dimensions != 2 && dimensions != 3 {
            return Err(CoreError::invalid_box(format!(
                "dimensions must be 2 or 3, got {}",
                dimensions
            )));
        }
        for axis in 0..dimensions as usize {
            let l = lengths[axis];
            if !(l.is_finite() && l > 0.0) {
                return Err(CoreError::invalid_box(format!(
                    "length along axis {} must be positive, got {}",
                    axis, l
                )));
            }
        }
        let mut periodic = periodic;
        let mut lengths = lengths;
        if dimensions == 2 {
            periodic[2] = false;
            lengths.z = 1.0;
        }
        Ok(Self {
            lengths,
            periodic,
            dimensions,
        })
    }

    /// Fully periodic cube of edge `length`.
    pub fn cubic(length: f64) -> Self {
        Self {
            lengths: DVec3::splat(length),
            periodic: [true; 3],
            dimensions: 3,
        }
    }

    /// Periodic two-dimensional square of edge `length`.
    pub fn square(length: f64) -> Self {
        Self {
            lengths: DVec3::new(length, length, 1.0),
            periodic: [true, true, false],
            dimensions: 2,
        }
    }

    /// Box edge lengths.
    #[inline]
    pub fn lengths(&self) -> DVec3 {
        self.lengths
    }

    /// Per-axis periodicity flags.
    #[inline]
    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    /// Spatial dimensionality (2 or 3).
    #[inline]
    pub fn dimensions(&self) -> u32 {
        self.dimensions
    }

    /// Box volume (area in 2D).
    pub fn volume(&self) -> f64 {
        if self.dimensions == 2 {
            self.lengths.x * self.lengths.y
        } else {
            self.lengths.x * self.lengths.y * self.lengths.z
        }
    }

    /// Distance between opposite faces along each axis.
    ///
    /// For an orthorhombic box this is simply the edge length.
    #[inline]
    pub fn nearest_plane_distance(&self) -> DVec3 {
        self.lengths
    }

    /// Applies the minimum-image convention to a separation vector.
    pub fn min_image(&self, delta: DVec3) -> DVec3 {
        let mut out = delta;
        for axis in 0..3 {
            if self.periodic[axis] {
                let l = self.lengths[axis];
                out[axis] -= l * (out[axis] / l).round();
            }
        }
        out
    }

    /// Wraps a position back into the box along periodic axes.
    pub fn wrap(&self, position: DVec3) -> DVec3 {
        let mut out = position;
        for axis in 0..3 {
            if self.periodic[axis] {
                let l = self.lengths[axis];
                out[axis] -= l * ((out[axis] + 0.5 * l) / l).floor();
            }
        }
        out
    }

    /// Fractional coordinate in `[0, 1]` along each axis, clamped for
    /// closed axes.
    pub fn fractional(&self, position: DVec3) -> DVec3 {
        let mut f = position / self.lengths + DVec3::splat(0.5);
        for axis in 0..3 {
            if self.periodic[axis] {
                f[axis] -= f[axis].floor();
            } else {
                f[axis] = f[axis].clamp(0.0, 1.0);
            }
        }
        f
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_rejects_bad_dimensions() {
        let result = SimBox::new(DVec3::splat(5.0), [true; 3], 4);
        assert!(matches!(result, Err(CoreError::InvalidBox { .. })));
    }

    #[test]
    fn test_new_rejects_non_positive_length() {
        let result = SimBox::new(DVec3::new(5.0, 0.0, 5.0), [true; 3], 3);
        assert!(result.is_err());
    }

    #[test]
    fn test_two_dimensional_box_is_flat() {
        let sim_box = SimBox::new(DVec3::new(4.0, 6.0, 0.0), [true; 3], 2).unwrap();
        assert!(!sim_box.periodic()[2]);
        assert_relative_eq!(sim_box.volume(), 24.0);
    }

    #[test]
    fn test_min_image() {
        let sim_box = SimBox::cubic(10.0);
        let d = sim_box.min_image(DVec3::new(9.0, -6.0, 4.0));
        assert_relative_eq!(d.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(d.y, 4.0, epsilon = 1e-12);
        assert_relative_eq!(d.z, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_min_image_respects_closed_axes() {
        let sim_box = SimBox::new(DVec3::splat(10.0), [true, false, true], 3).unwrap();
        let d = sim_box.min_image(DVec3::new(0.0, 9.0, 0.0));
        assert_relative_eq!(d.y, 9.0);
    }

    #[test]
    fn test_wrap_into_half_open_interval() {
        let sim_box = SimBox::cubic(2.0);
        let p = sim_box.wrap(DVec3::new(1.0, -1.0, 3.5));
        assert_relative_eq!(p.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, -1.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_fractional_coordinates() {
        let sim_box = SimBox::cubic(4.0);
        let f = sim_box.fractional(DVec3::new(0.0, 1.0, -2.0));
        assert_relative_eq!(f.x, 0.5);
        assert_relative_eq!(f.y, 0.75);
        assert_relative_eq!(f.z, 0.0);
    }
}
