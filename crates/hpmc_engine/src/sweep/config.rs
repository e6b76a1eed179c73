//! Sweep configuration.
//!
//! This module provides configuration types and builders for the update
//! engine: sweep-wide settings, per-type move sizes and per-pair depletant
//! parameters.

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Default number of substeps per sweep.
pub const DEFAULT_NSELECT: u32 = 4;

/// Default initial scratch length per insertion group.
pub const DEFAULT_SCRATCH_LEN: usize = 8;

/// Sweep-wide configuration.
///
/// Use [`SweepConfigBuilder`] to construct validated instances. Values
/// deserialised from a file are validated when handed to the integrator.
///
/// # Examples
///
/// ```rust
/// use hpmc_engine::sweep::SweepConfig;
///
/// let config = SweepConfig::builder()
///     .seed(42)
///     .nselect(2)
///     .move_ratio(0.75)
///     .n_devices(4)
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(config.nselect(), 2);
/// assert_eq!(config.n_devices(), 4);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    seed: u64,
    rank_offset: u64,
    nselect: u32,
    move_ratio: f64,
    n_devices: usize,
    initial_scratch_len: usize,
    max_iterations: Option<usize>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            rank_offset: 0,
            nselect: DEFAULT_NSELECT,
            move_ratio: 0.5,
            n_devices: 1,
            initial_scratch_len: DEFAULT_SCRATCH_LEN,
            max_iterations: None,
        }
    }
}

impl SweepConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> SweepConfigBuilder {
        SweepConfigBuilder::default()
    }

    /// Global seed of every keyed stream.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Offset distinguishing independent replicas or domains.
    #[inline]
    pub fn rank_offset(&self) -> u64 {
        self.rank_offset
    }

    /// Substeps per sweep.
    #[inline]
    pub fn nselect(&self) -> u32 {
        self.nselect
    }

    /// Probability of proposing a translation rather than a rotation.
    #[inline]
    pub fn move_ratio(&self) -> f64 {
        self.move_ratio
    }

    /// Number of logical execution units.
    #[inline]
    pub fn n_devices(&self) -> usize {
        self.n_devices
    }

    /// Scratch length per insertion group before any growth.
    #[inline]
    pub fn initial_scratch_len(&self) -> usize {
        self.initial_scratch_len
    }

    /// Iteration bound of one convergence loop for `n_particles` particles.
    ///
    /// Rejections only ever switch on within a substep, so `n + 1`
    /// iterations always suffice; the default leaves some headroom.
    pub fn max_iterations(&self, n_particles: usize) -> usize {
        self.max_iterations.unwrap_or(n_particles + 16)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `nselect` is 0
    /// - `n_devices` is 0
    /// - `move_ratio` is outside [0, 1]
    /// - `max_iterations` is `Some(0)`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nselect == 0 {
            return Err(ConfigError::InvalidSubstepCount(self.nselect));
        }
        if self.n_devices == 0 {
            return Err(ConfigError::InvalidDeviceCount(self.n_devices));
        }
        if !(0.0..=1.0).contains(&self.move_ratio) {
            return Err(ConfigError::invalid(
                "move_ratio",
                format!("must lie in [0, 1], got {}", self.move_ratio),
            ));
        }
        if self.max_iterations == Some(0) {
            return Err(ConfigError::invalid("max_iterations", "must be positive"));
        }
        Ok(())
    }
}

/// Builder for [`SweepConfig`].
///
/// Provides a fluent API with validation at build time.
#[derive(Clone, Debug, Default)]
pub struct SweepConfigBuilder {
    config: SweepConfig,
}

impl SweepConfigBuilder {
    /// Sets the global seed.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Sets the rank offset mixed into every substep key.
    #[inline]
    pub fn rank_offset(mut self, rank_offset: u64) -> Self {
        self.config.rank_offset = rank_offset;
        self
    }

    /// Sets the number of substeps per sweep.
    ///
    /// # Arguments
    ///
    /// * `nselect` - Substeps per sweep, at least 1
    #[inline]
    pub fn nselect(mut self, nselect: u32) -> Self {
        self.config.nselect = nselect;
        self
    }

    /// Sets the translation probability.
    ///
    /// # Arguments
    ///
    /// * `move_ratio` - Probability in [0, 1]
    #[inline]
    pub fn move_ratio(mut self, move_ratio: f64) -> Self {
        self.config.move_ratio = move_ratio;
        self
    }

    /// Sets the number of execution units.
    #[inline]
    pub fn n_devices(mut self, n_devices: usize) -> Self {
        self.config.n_devices = n_devices;
        self
    }

    /// Sets the initial per-group scratch length.
    #[inline]
    pub fn initial_scratch_len(mut self, len: usize) -> Self {
        self.config.initial_scratch_len = len;
        self
    }

    /// Bounds the iterations of each convergence loop.
    #[inline]
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = Some(max_iterations);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build(self) -> Result<SweepConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Per-type trial move sizes.
///
/// A zero size disables that move kind for the type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeParams {
    /// Maximum translation distance.
    pub translation: f64,
    /// Maximum rotation angle in radians.
    pub rotation: f64,
}

impl TypeParams {
    /// Creates move sizes for one type.
    pub fn new(translation: f64, rotation: f64) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Validates the move sizes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidParameter` for negative or non-finite sizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, v) in [("translation", self.translation), ("rotation", self.rotation)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(ConfigError::invalid(
                    name,
                    format!("move size must be finite and non-negative, got {}", v),
                ));
            }
        }
        Ok(())
    }
}

/// Implicit depletant parameters for one unordered type pair.
///
/// A fugacity of exactly zero disables the pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DepletantParams {
    /// Depletant fugacity; the sign selects the insertion scheme.
    pub fugacity: f64,
    /// Number of auxiliary trial insertions; zero selects simple mode.
    #[serde(default)]
    pub ntrial: u32,
}

impl DepletantParams {
    /// Creates depletant parameters.
    pub fn new(fugacity: f64, ntrial: u32) -> Self {
        Self { fugacity, ntrial }
    }

    /// Whether the pair takes part in sweeps.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.fugacity != 0.0
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidParameter` for a non-finite fugacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fugacity.is_finite() {
            return Err(ConfigError::invalid(
                "fugacity",
                format!("must be finite, got {}", self.fugacity),
            ));
        }
        Ok(())
    }
}
