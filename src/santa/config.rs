//! Solver configuration.

/// Configuration for the max-min allocation solver.
///
/// # Examples
///
/// ```
/// use u_fairalloc::santa::SantaConfig;
///
/// let config = SantaConfig::default()
///     .with_precision(1e-3)
///     .with_max_configuration_size(3)
///     .with_max_augmenting_depth(3)
///     .with_seed(7);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_configuration_size, 3);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SantaConfig {
    /// Binary search stops once the threshold bracket is at most this wide.
    pub precision: f64,

    /// Probe budget. Once spent, the search only continues while no
    /// positive threshold has been confirmed and the bracket is still open.
    pub max_iterations: usize,

    /// Largest configuration (bundle) considered, in items.
    ///
    /// The effective bound for a player is the minimum of this and the
    /// player's capacity.
    pub max_configuration_size: usize,

    /// Maximum number of fat items allowed in one hyperedge.
    pub max_fat_items: usize,

    /// Cap on candidate configurations enumerated per player and threshold.
    pub max_configurations_per_player: usize,

    /// Cap on search nodes visited while enumerating one player's
    /// configurations.
    pub max_enumeration_nodes: usize,

    /// Numerical tolerance for LP slack and weight support.
    pub lp_tolerance: f64,

    /// Maximum alternating-path length for local search augmentation.
    pub max_augmenting_depth: usize,

    /// Randomized restarts of the matcher when the first pass is partial.
    pub restarts: usize,

    /// Wall-clock budget for a single threshold probe, in milliseconds.
    ///
    /// `None` disables the per-probe budget.
    pub probe_time_limit_ms: Option<u64>,

    /// Wall-clock budget for the whole solve, in milliseconds.
    ///
    /// `None` disables the global budget.
    pub time_limit_ms: Option<u64>,

    /// Thresholds evaluated per bisection round.
    ///
    /// Values above 1 only run concurrently with the `parallel` feature.
    pub parallel_probes: usize,

    /// Random seed for matcher restarts (None uses 42).
    pub seed: Option<u64>,
}

impl Default for SantaConfig {
    fn default() -> Self {
        Self {
            precision: 1e-4,
            max_iterations: 64,
            max_configuration_size: 4,
            max_fat_items: 1,
            max_configurations_per_player: 256,
            max_enumeration_nodes: 100_000,
            lp_tolerance: 1e-7,
            max_augmenting_depth: 2,
            restarts: 8,
            probe_time_limit_ms: None,
            time_limit_ms: None,
            parallel_probes: 1,
            seed: None,
        }
    }
}

impl SantaConfig {
    /// Sets the bisection precision.
    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    /// Sets the maximum number of threshold probes.
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_max_configuration_size(mut self, n: usize) -> Self {
        self.max_configuration_size = n;
        self
    }

    pub fn with_max_fat_items(mut self, n: usize) -> Self {
        self.max_fat_items = n;
        self
    }

    pub fn with_max_configurations_per_player(mut self, n: usize) -> Self {
        self.max_configurations_per_player = n;
        self
    }

    pub fn with_max_enumeration_nodes(mut self, n: usize) -> Self {
        self.max_enumeration_nodes = n;
        self
    }

    pub fn with_lp_tolerance(mut self, tol: f64) -> Self {
        self.lp_tolerance = tol;
        self
    }

    /// Sets the alternating-path length bound for augmentation.
    pub fn with_max_augmenting_depth(mut self, depth: usize) -> Self {
        self.max_augmenting_depth = depth;
        self
    }

    pub fn with_restarts(mut self, n: usize) -> Self {
        self.restarts = n;
        self
    }

    /// Sets the per-probe wall-clock budget in milliseconds.
    pub fn with_probe_time_limit_ms(mut self, ms: u64) -> Self {
        self.probe_time_limit_ms = Some(ms);
        self
    }

    /// Sets the global wall-clock budget in milliseconds.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    pub fn with_parallel_probes(mut self, n: usize) -> Self {
        self.parallel_probes = n;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.precision > 0.0 && self.precision.is_finite()) {
            return Err(format!("precision must be positive, got {}", self.precision));
        }
        if self.max_iterations == 0 {
            return Err("max_iterations must be at least 1".into());
        }
        if self.max_configuration_size == 0 {
            return Err("max_configuration_size must be at least 1".into());
        }
        if self.max_configurations_per_player == 0 {
            return Err("max_configurations_per_player must be at least 1".into());
        }
        if self.max_enumeration_nodes == 0 {
            return Err("max_enumeration_nodes must be at least 1".into());
        }
        if !(self.lp_tolerance >= 0.0 && self.lp_tolerance < 1e-2) {
            return Err(format!(
                "lp_tolerance must be in [0, 0.01), got {}",
                self.lp_tolerance
            ));
        }
        if self.parallel_probes == 0 {
            return Err("parallel_probes must be at least 1".into());
        }
        Ok(())
    }
}
