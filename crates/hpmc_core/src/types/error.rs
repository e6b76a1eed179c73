//! Error types for the geometry layer.
//!
//! This module provides:
//! - `CoreError`: Errors from box construction, particle storage and
//!   neighbour-structure construction

use thiserror::Error;

/// Categorised geometry-layer errors.
///
/// # Variants
/// - `InvalidBox`: Box lengths or dimensionality are unusable
/// - `TypeOutOfRange`: A particle type index exceeds the type count
/// - `LengthMismatch`: Parallel per-particle arrays disagree in length
/// - `InvalidCellWidth`: Cell-list width is not a positive finite number
///
/// # Examples
/// ```
/// use hpmc_core::types::CoreError;
///
/// let err = CoreError::TypeOutOfRange { type_id: 3, n_types: 2 };
/// assert_eq!(format!("{}", err), "Particle type 3 out of range (n_types = 2)");
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Box lengths or dimensionality are unusable.
    #[error("Invalid box: {reason}")]
    InvalidBox {
        /// Why the box was rejected.
        reason: String,
    },

    /// A particle type index exceeds the number of registered types.
    #[error("Particle type {type_id} out of range (n_types = {n_types})")]
    TypeOutOfRange {
        /// Offending type index.
        type_id: u32,
        /// Number of registered types.
        n_types: usize,
    },

    /// Parallel per-particle arrays disagree in length.
    #[error("Length mismatch for '{name}': expected {expected}, got {actual}")]
    LengthMismatch {
        /// Name of the array.
        name: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Cell-list width is not a positive finite number.
    #[error("Invalid cell width {0}: must be positive and finite")]
    InvalidCellWidth(f64),
}

impl CoreError {
    /// Creates an `InvalidBox` error.
    pub fn invalid_box(reason: impl Into<String>) -> Self {
        Self::InvalidBox {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_box_display() {
        let err = CoreError::invalid_box("negative length");
        assert_eq!(err.to_string(), "Invalid box: negative length");
    }

    #[test]
    fn test_length_mismatch_display() {
        let err = CoreError::LengthMismatch {
            name: "orientations",
            expected: 4,
            actual: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("orientations"));
        assert!(msg.contains("expected 4"));
    }
}
