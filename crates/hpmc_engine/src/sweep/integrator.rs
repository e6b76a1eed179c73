//! Integrator facade: parameters, lifecycle hooks, sweeps and counters.

use glam::{DQuat, DVec3};
use hpmc_core::neighbours::NeighbourSource;
use hpmc_core::shapes::Shape;
use hpmc_core::types::{ParticleData, SimBox};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info_span};

use super::buffers::SweepBuffers;
use super::config::{DepletantParams, SweepConfig, TypeParams};
use super::convergence::{SubstepReport, SweepReport};
use super::counters::{DeviceCounters, ImplicitCounters, MoveCounters};
use super::depletants::{depletant_range, insertion_region, n_pairs, pair_index, pair_types, DepletantTable, WorkSplit};
use super::error::{ConfigError, HpmcError};
use super::update_order::UpdateOrder;
use crate::comm::Communicator;
use crate::pool::ScratchPool;
use crate::schedule::DevicePartition;

/// Implicit counters of one type pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairCounters {
    /// The unordered pair `(lo, hi)`.
    pub types: (u32, u32),
    /// Insertion statistics.
    pub counters: ImplicitCounters,
}

/// Totals accumulated since construction or the last reset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Counters {
    /// Move statistics.
    pub moves: MoveCounters,
    /// Insertion statistics of every pair with nonzero fugacity.
    pub implicit: Vec<PairCounters>,
}

/// Parallel hard-particle Monte Carlo integrator for one shape family.
///
/// Each call to [`Integrator::run_sweep`] performs `nselect` substeps. A
/// substep proposes one trial move per particle, iterates overlap and
/// depletant resolution until no accept/reject decision changes, then
/// commits the accepted moves.
///
/// # Examples
///
/// ```rust
/// use glam::{DQuat, DVec3};
/// use hpmc_core::neighbours::AllNeighbours;
/// use hpmc_core::shapes::Sphere;
/// use hpmc_core::types::{ParticleData, SimBox};
/// use hpmc_engine::sweep::{Integrator, SweepConfig, TypeParams};
///
/// let config = SweepConfig::builder().seed(7).nselect(2).build().unwrap();
/// let mut integrator = Integrator::new(config, vec![Sphere::new(1.0)]).unwrap();
/// integrator.set_type_params(0, TypeParams::new(0.1, 0.0)).unwrap();
///
/// let mut particles = ParticleData::new(SimBox::cubic(10.0), 1);
/// particles.push(DVec3::ZERO, DQuat::IDENTITY, 0).unwrap();
/// particles.push(DVec3::new(2.0, 0.0, 0.0), DQuat::IDENTITY, 0).unwrap();
///
/// let neighbours = AllNeighbours::new(particles.len());
/// let report = integrator.run_sweep(0, &mut particles, &neighbours).unwrap();
/// assert_eq!(report.substeps.len(), 2);
/// assert!(integrator.counters().moves.attempted() > 0);
/// ```
pub struct Integrator<S: Shape> {
    pub(super) config: SweepConfig,
    pub(super) shapes: Vec<S>,
    pub(super) type_params: Vec<TypeParams>,
    pub(super) depletants: DepletantTable,
    pub(super) order: UpdateOrder,
    pub(super) partition: DevicePartition,
    pub(super) buffers: SweepBuffers,
    pub(super) scratch: ScratchPool,
    /// Counters of the iteration in flight.
    pub(super) staging: DeviceCounters,
    /// Counters of the sweep in flight.
    pub(super) sweep_counters: DeviceCounters,
    totals: DeviceCounters,
    pub(super) trial_comm: Option<Box<dyn Communicator>>,
    pub(super) particle_comm: Option<Box<dyn Communicator>>,
    n_particles: usize,
}

impl<S: Shape> std::fmt::Debug for Integrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integrator")
            .field("config", &self.config)
            .field("n_types", &self.shapes.len())
            .field("n_particles", &self.n_particles)
            .field("scratch_len", &self.scratch.max_len())
            .finish_non_exhaustive()
    }
}

impl<S: Shape> Integrator<S> {
    /// Creates an integrator for `shapes.len()` particle types.
    ///
    /// Every type starts with zero move sizes and every pair with zero
    /// fugacity.
    ///
    /// # Errors
    ///
    /// Returns `HpmcError::Config` if `config` is invalid or `shapes` is empty.
    pub fn new(config: SweepConfig, shapes: Vec<S>) -> Result<Self, HpmcError> {
        config.validate()?;
        if shapes.is_empty() {
            return Err(ConfigError::invalid("shapes", "at least one particle type is required").into());
        }
        let n_types = shapes.len();
        let n_devices = config.n_devices();
        Ok(Self {
            order: UpdateOrder::new(config.seed().wrapping_add(config.rank_offset())),
            partition: DevicePartition::new(0, n_devices),
            scratch: ScratchPool::new(config.initial_scratch_len()),
            staging: DeviceCounters::new(n_devices, n_pairs(n_types)),
            sweep_counters: DeviceCounters::new(n_devices, n_pairs(n_types)),
            totals: DeviceCounters::new(n_devices, n_pairs(n_types)),
            type_params: vec![TypeParams::default(); n_types],
            depletants: DepletantTable::new(n_types),
            buffers: SweepBuffers::default(),
            trial_comm: None,
            particle_comm: None,
            n_particles: 0,
            shapes,
            config,
        })
    }

    /// Splits auxiliary trials over the ranks of `comm`.
    pub fn with_trial_communicator(mut self, comm: impl Communicator + 'static) -> Self {
        self.trial_comm = Some(Box::new(comm));
        self
    }

    /// Splits insertion work over contiguous particle ranges of the ranks of `comm`.
    pub fn with_particle_communicator(mut self, comm: impl Communicator + 'static) -> Self {
        self.particle_comm = Some(Box::new(comm));
        self
    }

    /// Sweep configuration.
    #[inline]
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Number of registered particle types.
    #[inline]
    pub fn n_types(&self) -> usize {
        self.shapes.len()
    }

    /// Shape of type `type_id`.
    pub fn shape(&self, type_id: u32) -> Option<&S> {
        self.shapes.get(type_id as usize)
    }

    /// Current per-group scratch length.
    #[inline]
    pub fn scratch_len(&self) -> usize {
        self.scratch.max_len()
    }

    fn check_type(&self, type_id: u32) -> Result<usize, ConfigError> {
        let n_types = self.n_types();
        if (type_id as usize) < n_types {
            Ok(type_id as usize)
        } else {
            Err(ConfigError::UnknownType { type_id, n_types })
        }
    }

    /// Replaces the shape of type `type_id`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownType` for an unregistered type.
    pub fn set_shape(&mut self, type_id: u32, shape: S) -> Result<(), ConfigError> {
        let t = self.check_type(type_id)?;
        self.shapes[t] = shape;
        self.depletants.invalidate();
        Ok(())
    }

    /// Sets the move sizes of type `type_id`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unregistered type or invalid sizes.
    pub fn set_type_params(&mut self, type_id: u32, params: TypeParams) -> Result<(), ConfigError> {
        let t = self.check_type(type_id)?;
        params.validate()?;
        self.type_params[t] = params;
        Ok(())
    }

    /// Move sizes of type `type_id`.
    pub fn type_params(&self, type_id: u32) -> Option<TypeParams> {
        self.type_params.get(type_id as usize).copied()
    }

    /// Sets the depletant parameters of the unordered pair `(a, b)`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unregistered type or a non-finite fugacity.
    pub fn set_depletant(&mut self, a: u32, b: u32, params: DepletantParams) -> Result<(), ConfigError> {
        self.check_type(a)?;
        self.check_type(b)?;
        params.validate()?;
        self.depletants.set(a, b, params);
        Ok(())
    }

    /// Depletant parameters of the unordered pair `(a, b)`.
    pub fn depletant(&self, a: u32, b: u32) -> Option<DepletantParams> {
        if (a.max(b) as usize) < self.n_types() {
            self.depletants.params(a, b)
        } else {
            None
        }
    }

    /// Grows the per-particle buffers to `n` particles and re-advises
    /// their placement.
    ///
    /// Buffers never shrink; their contents are rewritten every substep.
    pub fn on_particle_count_changed(&mut self, n: usize) {
        let grew = self.buffers.ensure_particles(n);
        self.partition = DevicePartition::new(n, self.config.n_devices());
        self.order.resize(n);
        self.buffers.advise(&self.partition);
        debug!(n_particles = n, grew, "particle count changed");
        self.n_particles = n;
    }

    /// Registers types up to `n_types`, giving new types `shape`, zero
    /// move sizes and zero fugacity. Existing entries are kept.
    pub fn on_type_count_changed(&mut self, n_types: usize, shape: S) {
        if n_types <= self.n_types() {
            return;
        }
        self.shapes.resize(n_types, shape);
        self.type_params.resize(n_types, TypeParams::default());
        self.depletants.resize_types(n_types);
        let n_devices = self.config.n_devices();
        for counters in [&mut self.staging, &mut self.sweep_counters, &mut self.totals] {
            counters.resize(n_devices, n_pairs(n_types));
        }
        debug!(n_types, "type count changed");
    }

    /// Largest circumsphere diameter over all types.
    pub(super) fn max_diameter(&self) -> f64 {
        self.shapes
            .iter()
            .map(Shape::circumsphere_diameter)
            .fold(0.0, f64::max)
    }

    /// Largest translation move size over all types.
    pub(super) fn max_translation(&self) -> f64 {
        self.type_params
            .iter()
            .map(|p| p.translation)
            .fold(0.0, f64::max)
    }

    /// Interaction width every neighbour structure and box axis must cover.
    ///
    /// Overlaps need `max_diameter + 2 max_translation`. Depletant
    /// insertion additionally needs the extended insertion region of the
    /// largest type plus the depletant itself.
    pub fn nominal_width(&self, dimensions: u32) -> f64 {
        let max_d = self.max_diameter();
        let max_t = self.max_translation();
        let mut width = max_d + 2.0 * max_t;
        for slot in 0..n_pairs(self.n_types()) {
            let (a, b) = pair_types(slot);
            if !self.depletants.params(a, b).is_some_and(|p| p.is_active()) {
                continue;
            }
            let range = depletant_range(&self.shapes[a as usize], &self.shapes[b as usize]);
            let region = self
                .shapes
                .iter()
                .map(|s| insertion_region(s, DVec3::ZERO, DQuat::IDENTITY, range).circumradius(dimensions))
                .fold(0.0, f64::max);
            width = width.max(region + 0.5 * range + 0.5 * max_d + 2.0 * max_t);
        }
        width
    }

    fn check_geometry(&self, sim_box: &SimBox, neighbours: &dyn NeighbourSource) -> Result<(), HpmcError> {
        let dims = sim_box.dimensions() as usize;
        let width = self.nominal_width(sim_box.dimensions());
        let distance = sim_box.nearest_plane_distance();
        let periodic = sim_box.periodic();
        for axis in 0..dims {
            if periodic[axis] && distance[axis] <= 2.0 * width {
                return Err(HpmcError::BoxTooSmall {
                    axis,
                    distance: distance[axis],
                    required: 2.0 * width,
                });
            }
        }
        let cell_width = neighbours.cell_width();
        for axis in 0..dims {
            if cell_width[axis] < width {
                return Err(HpmcError::NeighbourRangeTooSmall {
                    axis,
                    width: cell_width[axis],
                    required: width,
                });
            }
        }
        Ok(())
    }

    fn validate_inputs(&self, particles: &ParticleData, neighbours: &dyn NeighbourSource) -> Result<(), HpmcError> {
        particles.validate()?;
        if let Some(&type_id) = particles.types().iter().find(|&&t| t as usize >= self.n_types()) {
            return Err(ConfigError::UnknownType {
                type_id,
                n_types: self.n_types(),
            }
            .into());
        }
        if neighbours.n_particles() != particles.len() {
            return Err(HpmcError::NeighbourCountMismatch {
                expected: particles.len(),
                actual: neighbours.n_particles(),
            });
        }
        self.check_geometry(particles.sim_box(), neighbours)
    }

    /// Share of insertion work this rank performs.
    pub(super) fn work_split(&self) -> WorkSplit {
        let (trial_rank, trial_size) = self
            .trial_comm
            .as_ref()
            .map_or((0, 1), |c| (c.rank(), c.size().max(1)));
        let particles = match &self.particle_comm {
            Some(c) => DevicePartition::new(self.n_particles, c.size().max(1)).range(c.rank()),
            None => 0..self.n_particles,
        };
        WorkSplit {
            trial_rank,
            trial_size,
            particles,
        }
    }

    /// Runs one sweep of `nselect` substeps at `timestep`.
    ///
    /// `neighbours` must have been built from the current positions of
    /// `particles`.
    ///
    /// # Errors
    ///
    /// - `HpmcError::BoxTooSmall` / `NeighbourRangeTooSmall` if the geometry
    ///   cannot support the move sizes in use; nothing is modified.
    /// - `HpmcError::NonConvergence` if a substep exceeds its iteration bound.
    /// - `HpmcError::Communication` on a failed collective.
    ///
    /// On error, particles and counters are restored to their state before
    /// the sweep.
    pub fn run_sweep(
        &mut self,
        timestep: u64,
        particles: &mut ParticleData,
        neighbours: &dyn NeighbourSource,
    ) -> Result<SweepReport, HpmcError> {
        let span = info_span!("hpmc_sweep", timestep);
        let _enter = span.enter();

        if let Err(e) = self.validate_inputs(particles, neighbours) {
            error!(error = %e, "sweep aborted before any update");
            return Err(e);
        }

        let n = particles.len();
        let nselect = self.config.nselect();
        if n == 0 {
            return Ok(SweepReport {
                timestep,
                substeps: (0..nselect).map(SubstepReport::empty).collect(),
            });
        }

        if n != self.n_particles {
            self.on_particle_count_changed(n);
        }
        self.depletants.ensure_lambda(&self.shapes, particles.sim_box().dimensions());
        if self
            .buffers
            .set_pair_layout(self.depletants.active().len(), self.depletants.max_ntrial())
        {
            self.buffers.advise(&self.partition);
        }

        let snapshot = (nselect > 1).then(|| particles.clone());
        self.sweep_counters.reset();

        let mut substeps = Vec::with_capacity(nselect as usize);
        for substep in 0..nselect {
            match self.run_substep(timestep, substep, particles, neighbours) {
                Ok(report) => substeps.push(report),
                Err(e) => {
                    if let Some(snapshot) = snapshot {
                        *particles = snapshot;
                    }
                    self.sweep_counters.reset();
                    error!(error = %e, substep, "sweep aborted");
                    return Err(e);
                }
            }
        }

        self.sweep_counters.fold_into(&self.totals);
        let report = SweepReport { timestep, substeps };
        debug!(
            iterations = report.total_iterations(),
            overflow_reruns = report.overflow_reruns(),
            accepted = report.accepted(),
            "sweep complete"
        );
        Ok(report)
    }

    /// Totals reduced over the per-device slots of this rank.
    pub fn counters(&self) -> Counters {
        let (moves, implicit) = self.totals.reduce();
        Counters {
            moves,
            implicit: self.pair_counters(implicit),
        }
    }

    /// Implicit counters of the unordered pair `(a, b)` on this rank.
    pub fn implicit_counters(&self, a: u32, b: u32) -> ImplicitCounters {
        let (_, implicit) = self.totals.reduce();
        implicit.get(pair_index(a, b)).copied().unwrap_or_default()
    }

    /// Implicit counters summed over the trial and particle communicators.
    ///
    /// Collective: every rank must call it.
    ///
    /// # Errors
    ///
    /// Returns `HpmcError::Communication` on a failed reduction.
    pub fn reduced_implicit_counters(&self) -> Result<Vec<PairCounters>, HpmcError> {
        let (_, implicit) = self.totals.reduce();
        let mut words: Vec<u64> = implicit.iter().flat_map(|c| c.to_words()).collect();
        for comm in [&self.trial_comm, &self.particle_comm].into_iter().flatten() {
            comm.all_reduce_sum_u64(&mut words)?;
        }
        let implicit = words.chunks_exact(3).map(ImplicitCounters::from_words).collect();
        Ok(self.pair_counters(implicit))
    }

    fn pair_counters(&self, implicit: Vec<ImplicitCounters>) -> Vec<PairCounters> {
        implicit
            .into_iter()
            .enumerate()
            .filter_map(|(slot, counters)| {
                let types = pair_types(slot);
                self.depletants
                    .params(types.0, types.1)
                    .filter(DepletantParams::is_active)
                    .map(|_| PairCounters { types, counters })
            })
            .collect()
    }

    /// Zeroes the accumulated totals.
    pub fn reset_counters(&mut self) {
        self.totals.reset();
    }
}
