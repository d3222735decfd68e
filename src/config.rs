//! Configuration for the assembly solver and simulation.

/// Configuration for constraint assembly and sleep detection.
///
/// Passed into [`Model::new`](crate::Model::new); there is no global state.
///
/// # Builder Pattern
/// ```
/// use linkwork::SolverConfig;
///
/// let config = SolverConfig::new()
///     .with_len_tol(1e-4)
///     .with_pos_itr_max(512);
/// ```
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Length residual tolerance (model units). Default: 1e-3.
    pub len_tol: f64,
    /// Orientation residual tolerance (radians). Default: 1e-3.
    pub ang_tol: f64,
    /// Velocity residual tolerance (model units per second). Default: 1e-2.
    pub vel_tol: f64,
    /// Position assembly iteration ceiling. Reaching it without convergence
    /// marks the model invalid. Default: 256.
    pub pos_itr_max: usize,
    /// Velocity assembly iteration ceiling. Reaching it caps the sweep
    /// without invalidating the model. Default: 128.
    pub vel_itr_max: usize,
    /// Re-apply last tick's accumulated impulses at the start of each tick.
    /// Disabling forces a cold start every tick. Default: true.
    pub warm_start: bool,
    /// Minimum model time before sleep testing starts. Default: 0.5.
    pub sleep_min_time: f64,
    /// Velocity magnitude below which a node may sleep. Default: 1e-4.
    pub sleep_vel_tol: f64,
    /// Acceleration magnitude below which a node may sleep. Default: 1e-4.
    pub sleep_acc_tol: f64,
}

impl SolverConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        SolverConfig {
            len_tol: 1e-3,
            ang_tol: 1e-3,
            vel_tol: 1e-2,
            pos_itr_max: 256,
            vel_itr_max: 128,
            warm_start: true,
            sleep_min_time: 0.5,
            sleep_vel_tol: 1e-4,
            sleep_acc_tol: 1e-4,
        }
    }

    /// Set the length residual tolerance.
    pub fn with_len_tol(mut self, tol: f64) -> Self {
        self.len_tol = tol;
        self
    }

    /// Set the orientation residual tolerance.
    pub fn with_ang_tol(mut self, tol: f64) -> Self {
        self.ang_tol = tol;
        self
    }

    /// Set the velocity residual tolerance.
    pub fn with_vel_tol(mut self, tol: f64) -> Self {
        self.vel_tol = tol;
        self
    }

    /// Set the position assembly iteration ceiling.
    pub fn with_pos_itr_max(mut self, max: usize) -> Self {
        self.pos_itr_max = max.max(1);
        self
    }

    /// Set the velocity assembly iteration ceiling.
    pub fn with_vel_itr_max(mut self, max: usize) -> Self {
        self.vel_itr_max = max.max(1);
        self
    }

    /// Enable or disable warm starting.
    pub fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.warm_start = warm_start;
        self
    }

    /// Set the minimum model time before sleep testing starts.
    pub fn with_sleep_min_time(mut self, t: f64) -> Self {
        self.sleep_min_time = t;
        self
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::new()
    }
}
