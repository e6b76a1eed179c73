//! Check command implementation
//!
//! Validates a run configuration and the geometry it implies without
//! performing any sweep.

use std::path::Path;

use anyhow::{bail, Result};
use glam::DVec3;
use hpmc_core::shapes::{Cuboid, Shape, Sphere};
use tracing::info;

use super::run::build_integrator;
use crate::config::{RunConfig, ShapeConfig};

/// Execute the check command
pub fn run(config_path: &Path) -> Result<()> {
    let config = RunConfig::load(config_path)?;
    let width = check_config(&config)?;
    info!("Configuration {} is valid", config_path.display());
    println!("Configuration OK: interaction width {:.4}", width);
    Ok(())
}

/// Checks that the box supports the configured moves and depletants.
///
/// Returns the interaction width the neighbour cells must cover.
pub fn check_config(config: &RunConfig) -> Result<f64> {
    config.validate()?;
    match &config.shape {
        ShapeConfig::Sphere { diameter } => check_shape(config, Sphere::new(*diameter)),
        ShapeConfig::Cuboid { edges } => {
            check_shape(config, Cuboid::from_edges(DVec3::from_array(*edges)))
        }
    }
}

fn check_shape<S: Shape>(config: &RunConfig, shape: S) -> Result<f64> {
    let lattice = &config.lattice;
    if lattice.spacing < shape.circumsphere_diameter() {
        info!(
            "lattice spacing {} is below the circumsphere diameter {}; overlaps are possible",
            lattice.spacing,
            shape.circumsphere_diameter()
        );
    }
    let integrator = build_integrator(config, shape)?;
    let width = integrator.nominal_width(lattice.dimensions);
    let length = lattice.per_axis as f64 * lattice.spacing;
    if length <= 2.0 * width {
        bail!(
            "box length {} must exceed twice the interaction width {:.4}",
            length,
            width
        );
    }
    Ok(width)
}
