//! Live particle state: positions, orientations, auxiliary velocities and
//! integer types.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use super::error::CoreError;
use super::sim_box::SimBox;

/// Structure-of-arrays store for rigid particles.
///
/// The update engine reads this store at the start of a sweep and writes it
/// only when committing accepted moves.
///
/// # Examples
///
/// ```rust
/// use glam::{DQuat, DVec3};
/// use hpmc_core::types::{ParticleData, SimBox};
///
/// let mut particles = ParticleData::new(SimBox::cubic(10.0), 1);
/// particles.push(DVec3::ZERO, DQuat::IDENTITY, 0).unwrap();
/// assert_eq!(particles.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleData {
    sim_box: SimBox,
    n_types: usize,
    positions: Vec<DVec3>,
    orientations: Vec<DQuat>,
    velocities: Vec<DVec3>,
    types: Vec<u32>,
}

impl ParticleData {
    /// Creates an empty store for `n_types` particle types.
    pub fn new(sim_box: SimBox, n_types: usize) -> Self {
        Self {
            sim_box,
            n_types,
            positions: Vec::new(),
            orientations: Vec::new(),
            velocities: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Appends a particle at rest.
    ///
    /// The position is wrapped into the box.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::TypeOutOfRange` if `type_id >= n_types`.
    pub fn push(
        &mut self,
        position: DVec3,
        orientation: DQuat,
        type_id: u32,
    ) -> Result<usize, CoreError> {
        if type_id as usize >= self.n_types {
            return Err(CoreError::TypeOutOfRange {
                type_id,
                n_types: self.n_types,
            });
        }
        self.positions.push(self.sim_box.wrap(position));
        self.orientations.push(orientation.normalize());
        self.velocities.push(DVec3::ZERO);
        self.types.push(type_id);
        Ok(self.positions.len() - 1)
    }

    /// Number of particles.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if the store holds no particles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of registered particle types.
    #[inline]
    pub fn n_types(&self) -> usize {
        self.n_types
    }

    /// Registers additional particle types. Never removes types.
    pub fn set_n_types(&mut self, n_types: usize) {
        self.n_types = self.n_types.max(n_types);
    }

    /// The simulation box.
    #[inline]
    pub fn sim_box(&self) -> &SimBox {
        &self.sim_box
    }

    /// Particle positions.
    #[inline]
    pub fn positions(&self) -> &[DVec3] {
        &self.positions
    }

    /// Particle orientations.
    #[inline]
    pub fn orientations(&self) -> &[DQuat] {
        &self.orientations
    }

    /// Auxiliary velocities.
    #[inline]
    pub fn velocities(&self) -> &[DVec3] {
        &self.velocities
    }

    /// Particle type indices.
    #[inline]
    pub fn types(&self) -> &[u32] {
        &self.types
    }

    /// Mutable views of the state written at commit time.
    pub fn state_mut(&mut self) -> (&mut [DVec3], &mut [DQuat], &mut [DVec3]) {
        (
            &mut self.positions,
            &mut self.orientations,
            &mut self.velocities,
        )
    }

    /// Overwrites the auxiliary velocities.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::LengthMismatch` if `velocities` has the wrong length.
    pub fn set_velocities(&mut self, velocities: Vec<DVec3>) -> Result<(), CoreError> {
        if velocities.len() != self.len() {
            return Err(CoreError::LengthMismatch {
                name: "velocities",
                expected: self.len(),
                actual: velocities.len(),
            });
        }
        self.velocities = velocities;
        Ok(())
    }

    /// Checks that all per-particle arrays agree and every type is registered.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), CoreError> {
        let n = self.positions.len();
        for (name, len) in [
            ("orientations", self.orientations.len()),
            ("velocities", self.velocities.len()),
            ("types", self.types.len()),
        ] {
            if len != n {
                return Err(CoreError::LengthMismatch {
                    name,
                    expected: n,
                    actual: len,
                });
            }
        }
        if let Some(&type_id) = self.types.iter().find(|&&t| t as usize >= self.n_types) {
            return Err(CoreError::TypeOutOfRange {
                type_id,
                n_types: self.n_types,
            });
        }
        Ok(())
    }
}
