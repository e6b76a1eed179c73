//! Run command implementation
//!
//! Builds the lattice, sweeps it and prints move and insertion statistics.

use std::path::Path;

use anyhow::{bail, Result};
use glam::DVec3;
use hpmc_core::neighbours::CellList;
use hpmc_core::shapes::{Cuboid, Shape, Sphere};
use hpmc_engine::sweep::{Counters, Integrator};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{RunConfig, ShapeConfig};

/// Aggregate outcome of a run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// Number of particles.
    pub n_particles: usize,
    /// Sweeps performed.
    pub sweeps: u64,
    /// Resolve iterations over all substeps.
    pub iterations: usize,
    /// Iterations rerun after scratch overflow.
    pub overflow_reruns: usize,
    /// Scratch length per insertion group at the end of the run.
    pub scratch_len: usize,
    /// Accumulated counters.
    pub counters: Counters,
}

/// Execute the run command
pub fn run(config_path: &Path, sweeps: Option<u64>, format: &str) -> Result<()> {
    if !matches!(format, "table" | "json") {
        bail!("Unknown output format: {}", format);
    }
    let config = RunConfig::load(config_path)?;
    let sweeps = sweeps.unwrap_or(config.sweeps);
    info!("Running {} sweeps from {}", sweeps, config_path.display());

    let summary = simulate_config(&config, sweeps)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => print_table(&summary),
    }
    Ok(())
}

/// Runs `sweeps` sweeps of the system described by `config`.
pub fn simulate_config(config: &RunConfig, sweeps: u64) -> Result<RunSummary> {
    match &config.shape {
        ShapeConfig::Sphere { diameter } => simulate(config, Sphere::new(*diameter), sweeps),
        ShapeConfig::Cuboid { edges } => {
            simulate(config, Cuboid::from_edges(DVec3::from_array(*edges)), sweeps)
        }
    }
}

/// Builds the integrator for a single-type system of `shape`.
pub fn build_integrator<S: Shape>(config: &RunConfig, shape: S) -> Result<Integrator<S>> {
    let mut integrator = Integrator::new(config.engine_config()?, vec![shape])?;
    integrator.set_type_params(0, config.moves)?;
    if let Some(depletant) = config.depletant {
        integrator.set_depletant(0, 0, depletant)?;
    }
    Ok(integrator)
}

/// Grid shift of sweep `k`: an additive recurrence on irrational steps.
fn grid_shift(k: u64) -> DVec3 {
    const STEPS: [f64; 3] = [0.618_033_988_75, 0.414_213_562_37, 0.732_050_807_57];
    let k = k as f64;
    DVec3::new((k * STEPS[0]).fract(), (k * STEPS[1]).fract(), (k * STEPS[2]).fract())
}

fn simulate<S: Shape>(config: &RunConfig, shape: S, sweeps: u64) -> Result<RunSummary> {
    let mut particles = config.build_particles()?;
    let mut integrator = build_integrator(config, shape)?;
    let width = integrator.nominal_width(particles.sim_box().dimensions());
    info!(
        "{} particles, {} devices, cell width {:.4}",
        particles.len(),
        integrator.config().n_devices(),
        width
    );

    let mut summary = RunSummary {
        n_particles: particles.len(),
        sweeps,
        iterations: 0,
        overflow_reruns: 0,
        scratch_len: integrator.scratch_len(),
        counters: Counters::default(),
    };
    for timestep in 0..sweeps {
        let cells = CellList::build_shifted(
            particles.sim_box(),
            particles.positions(),
            width,
            grid_shift(timestep),
        )?;
        let report = integrator.run_sweep(timestep, &mut particles, &cells)?;
        debug!(
            timestep,
            accepted = report.accepted(),
            rejected = report.rejected(),
            "sweep"
        );
        summary.iterations += report.total_iterations();
        summary.overflow_reruns += report.overflow_reruns();
    }
    summary.scratch_len = integrator.scratch_len();
    summary.counters = integrator.counters();
    Ok(summary)
}

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v))
}

fn print_table(summary: &RunSummary) {
    let moves = &summary.counters.moves;
    println!("\n=== HPMC Run ===");
    println!("Particles:          {}", summary.n_particles);
    println!("Sweeps:             {}", summary.sweeps);
    println!("Iterations:         {}", summary.iterations);
    println!("Overflow reruns:    {}", summary.overflow_reruns);
    println!("Scratch length:     {}", summary.scratch_len);
    println!("\n--- Moves ---");
    println!("Translate accepted: {}", ratio(moves.translate_acceptance()));
    println!("Rotate accepted:    {}", ratio(moves.rotate_acceptance()));
    println!("Overlap checks:     {}", moves.overlap_checks);
    if !summary.counters.implicit.is_empty() {
        println!("\n--- Depletants ---");
        println!("{:<10} {:>14} {:>14} {:>10}", "Pair", "Inserted", "Free", "Fraction");
        for pair in &summary.counters.implicit {
            let c = &pair.counters;
            println!(
                "{:<10} {:>14} {:>14} {:>10}",
                format!("({}, {})", pair.types.0, pair.types.1),
                c.insert_count,
                c.insert_accept_count,
                ratio(c.free_fraction())
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(text: &str) -> RunConfig {
        let config: RunConfig = toml::from_str(text).unwrap();
        config.validate().unwrap();
        config
    }

    const SPHERES: &str = r#"
sweeps = 4
devices = 2

[sweep]
seed = 3
nselect = 2
move_ratio = 1.0

[shape]
kind = "sphere"
diameter = 1.0

[moves]
translation = 0.1

[lattice]
per_axis = 3
spacing = 1.5
"#;

    #[test]
    fn test_simulate_counts_every_trial() {
        let summary = simulate_config(&config(SPHERES), 4).unwrap();
        assert_eq!(summary.n_particles, 27);
        // 4 sweeps of 2 substeps, one trial per particle each.
        assert_eq!(summary.counters.moves.attempted(), 4 * 2 * 27);
        assert!(summary.counters.implicit.is_empty());
        assert!(summary.iterations >= 8);
    }

    #[test]
    fn test_summary_serialises_to_json() {
        let summary = simulate_config(&config(SPHERES), 1).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["n_particles"], 27);
        assert_eq!(json["sweeps"], 1);
        assert!(json["counters"]["moves"]["translate_accept"].is_u64());
    }

    #[test]
    fn test_grid_shift_stays_in_unit_cube() {
        for k in 0..100 {
            let s = grid_shift(k);
            assert!(s.min_element() >= 0.0 && s.max_element() < 1.0);
        }
        assert_eq!(grid_shift(0), DVec3::ZERO);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let err = run(Path::new("run.toml"), None, "xml").unwrap_err();
        assert!(err.to_string().contains("Unknown output format"));
    }
}
