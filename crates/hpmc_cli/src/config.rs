//! Run configuration loaded from TOML.
//!
//! ```toml
//! sweeps = 100
//! devices = 4
//!
//! [sweep]
//! seed = 42
//! nselect = 4
//!
//! [shape]
//! kind = "cuboid"
//! edges = [1.0, 1.0, 0.5]
//!
//! [moves]
//! translation = 0.1
//! rotation = 0.2
//!
//! [lattice]
//! per_axis = 6
//! spacing = 1.6
//!
//! [depletant]
//! fugacity = 0.5
//! ntrial = 2
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::{DQuat, DVec3};
use hpmc_core::types::{ParticleData, SimBox};
use hpmc_engine::sweep::{DepletantParams, SweepConfig, TypeParams};
use serde::{Deserialize, Serialize};

/// Shape of every particle in the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ShapeConfig {
    /// Sphere (disc in 2D).
    Sphere {
        /// Diameter.
        diameter: f64,
    },
    /// Rectangular box.
    Cuboid {
        /// Edge lengths along the body axes.
        edges: [f64; 3],
    },
}

/// Initial simple-cubic (square in 2D) lattice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeConfig {
    /// Particles per axis.
    pub per_axis: usize,
    /// Lattice spacing; the box edge is `per_axis * spacing`.
    pub spacing: f64,
    /// Dimensionality, 2 or 3.
    #[serde(default = "default_dimensions")]
    pub dimensions: u32,
}

fn default_dimensions() -> u32 {
    3
}

fn default_sweeps() -> u64 {
    10
}

/// Complete run description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of sweeps.
    #[serde(default = "default_sweeps")]
    pub sweeps: u64,
    /// Logical execution units; defaults to the number of CPUs.
    #[serde(default)]
    pub devices: Option<usize>,
    /// Engine settings.
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Particle shape.
    pub shape: ShapeConfig,
    /// Move sizes.
    #[serde(default)]
    pub moves: TypeParams,
    /// Initial configuration.
    pub lattice: LatticeConfig,
    /// Implicit depletants of the single type pair.
    #[serde(default)]
    pub depletant: Option<DepletantParams>,
}

impl RunConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        let config: RunConfig = toml::from_str(&text)
            .with_context(|| format!("parsing configuration {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section for consistency.
    pub fn validate(&self) -> Result<()> {
        self.sweep.validate()?;
        self.moves.validate()?;
        if let Some(depletant) = &self.depletant {
            depletant.validate()?;
        }
        if self.devices == Some(0) {
            bail!("devices must be at least 1");
        }
        match &self.shape {
            ShapeConfig::Sphere { diameter } if !(diameter.is_finite() && *diameter > 0.0) => {
                bail!("sphere diameter must be positive, got {}", diameter)
            }
            ShapeConfig::Cuboid { edges } if edges.iter().any(|e| !(e.is_finite() && *e > 0.0)) => {
                bail!("cuboid edges must be positive, got {:?}", edges)
            }
            _ => {}
        }
        let lattice = &self.lattice;
        if lattice.per_axis == 0 {
            bail!("lattice.per_axis must be at least 1");
        }
        if !(lattice.spacing.is_finite() && lattice.spacing > 0.0) {
            bail!("lattice.spacing must be positive, got {}", lattice.spacing);
        }
        if !matches!(lattice.dimensions, 2 | 3) {
            bail!("lattice.dimensions must be 2 or 3, got {}", lattice.dimensions);
        }
        Ok(())
    }

    /// Engine configuration with the device count resolved.
    pub fn engine_config(&self) -> Result<SweepConfig> {
        let devices = self.devices.unwrap_or_else(num_cpus::get).max(1);
        let config = SweepConfig::builder()
            .seed(self.sweep.seed())
            .rank_offset(self.sweep.rank_offset())
            .nselect(self.sweep.nselect())
            .move_ratio(self.sweep.move_ratio())
            .initial_scratch_len(self.sweep.initial_scratch_len())
            .n_devices(devices);
        Ok(config.build()?)
    }

    /// Builds the initial lattice.
    pub fn build_particles(&self) -> Result<ParticleData> {
        let lattice = &self.lattice;
        let length = lattice.per_axis as f64 * lattice.spacing;
        let sim_box = if lattice.dimensions == 2 {
            SimBox::square(length)
        } else {
            SimBox::cubic(length)
        };
        let mut particles = ParticleData::new(sim_box, 1);
        let nz = if lattice.dimensions == 2 { 1 } else { lattice.per_axis };
        for z in 0..nz {
            for y in 0..lattice.per_axis {
                for x in 0..lattice.per_axis {
                    let mut p = (DVec3::new(x as f64, y as f64, z as f64) + DVec3::splat(0.5))
                        * lattice.spacing
                        - DVec3::splat(0.5 * length);
                    if lattice.dimensions == 2 {
                        p.z = 0.0;
                    }
                    particles.push(p, DQuat::IDENTITY, 0)?;
                }
            }
        }
        Ok(particles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    const SPHERES: &str = r#"
sweeps = 3
devices = 2

[sweep]
seed = 7
nselect = 2

[shape]
kind = "sphere"
diameter = 1.0

[moves]
translation = 0.1

[lattice]
per_axis = 4
spacing = 1.5

[depletant]
fugacity = 0.2
"#;

    #[test]
    fn test_load_sphere_config() {
        let file = write_config(SPHERES);
        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.sweeps, 3);
        assert_eq!(config.shape, ShapeConfig::Sphere { diameter: 1.0 });
        assert_eq!(config.moves, TypeParams::new(0.1, 0.0));
        assert_eq!(config.depletant, Some(DepletantParams::new(0.2, 0)));
        assert_eq!(config.lattice.dimensions, 3);

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.n_devices(), 2);
        assert_eq!(engine.nselect(), 2);
        assert_eq!(engine.seed(), 7);
    }

    #[test]
    fn test_lattice_positions_fit_the_box() {
        let config: RunConfig = toml::from_str(SPHERES).unwrap();
        let particles = config.build_particles().unwrap();
        assert_eq!(particles.len(), 64);
        assert!((particles.sim_box().lengths().x - 6.0).abs() < 1e-12);
        assert!(particles.positions().iter().all(|p| p.abs().max_element() < 3.0));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let text = SPHERES.replace("diameter = 1.0", "diameter = -1.0");
        let file = write_config(&text);
        let err = RunConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("diameter"));

        let text = SPHERES.replace("nselect = 2", "nselect = 0");
        let file = write_config(&text);
        assert!(RunConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = RunConfig::load(Path::new("/nonexistent/run.toml")).unwrap_err();
        assert!(err.to_string().contains("reading configuration"));
    }
}
