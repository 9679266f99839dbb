use std::fs;
use std::path::{Path, PathBuf};

use cvm_core::{CvmError, ErrorInfo, DEFAULT_SEED};
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters of a temperature sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunConfig {
    /// Global search and local solver settings.
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Temperature grid.
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Master seed for structure sampling and basin hopping.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output file layout.
    #[serde(default)]
    pub output: OutputConfig,
}

impl RunConfig {
    /// Parses a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, CvmError> {
        serde_yaml::from_str(text)
            .map_err(|err| CvmError::Config(ErrorInfo::new("config-parse", err.to_string())))
    }

    /// Reads a YAML config file.
    pub fn load(path: &Path) -> Result<Self, CvmError> {
        let text = fs::read_to_string(path).map_err(|err| {
            CvmError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text).map_err(|err| {
            CvmError::Config(err.info().clone().with_context("path", path.display().to_string()))
        })
    }
}

/// Settings shared by both global strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Which global search to run.
    #[serde(default)]
    pub strategy: SearchStrategy,
    /// Number of local minimisations (random restart) or hops (basin hopping).
    #[serde(default = "default_num_trials")]
    pub num_trials: usize,
    /// Trials without improvement before stopping early.
    #[serde(default = "default_early_stopping_count")]
    pub early_stopping_count: usize,
    /// Maximum constraint violation of an accepted result.
    #[serde(default = "default_constr_tol")]
    pub constr_tol: f64,
    /// Restrict the search to a ball around the disordered state.
    #[serde(default)]
    pub norm_constrained: bool,
    /// Closed-form or numerically estimated derivatives.
    #[serde(default)]
    pub derivatives: DerivativeMode,
    /// Local solver settings.
    #[serde(default)]
    pub local: LocalOptions,
}

fn default_num_trials() -> usize {
    50
}

fn default_early_stopping_count() -> usize {
    20
}

fn default_constr_tol() -> f64 {
    1e-8
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::default(),
            num_trials: default_num_trials(),
            early_stopping_count: default_early_stopping_count(),
            constr_tol: default_constr_tol(),
            norm_constrained: false,
            derivatives: DerivativeMode::default(),
            local: LocalOptions::default(),
        }
    }
}

impl OptimizerConfig {
    /// Rejects settings the optimiser cannot run with.
    pub fn validate(&self) -> Result<(), CvmError> {
        let invalid = |field: &str, message: &str| {
            Err(CvmError::Config(
                ErrorInfo::new("optimizer-invalid", message).with_context("field", field),
            ))
        };
        if self.num_trials == 0 {
            return invalid("num_trials", "at least one trial is required");
        }
        if !(self.constr_tol > 0.0) {
            return invalid("constr_tol", "constraint tolerance must be positive");
        }
        if self.local.maxiter == 0 {
            return invalid("local.maxiter", "maxiter must be positive");
        }
        if !(self.local.initial_tr_radius > 0.0) {
            return invalid("local.initial_tr_radius", "trust radius must be positive");
        }
        if !(self.local.barrier_decay > 0.0 && self.local.barrier_decay < 1.0) {
            return invalid("local.barrier_decay", "barrier decay must lie in (0, 1)");
        }
        if let SearchStrategy::BasinHopping {
            stepsize,
            temperature,
            interval,
        } = &self.strategy
        {
            if !(*stepsize > 0.0) || !(*temperature > 0.0) || *interval == 0 {
                return invalid(
                    "strategy",
                    "basin hopping needs positive stepsize, temperature and interval",
                );
            }
        }
        Ok(())
    }
}

/// Global search strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SearchStrategy {
    /// Local minimisations from the disordered state and sampled structures.
    #[default]
    RandomRestart,
    /// Gaussian hops on the multi-body correlations with Metropolis acceptance.
    BasinHopping {
        /// Initial standard deviation of the hop.
        #[serde(default = "default_stepsize")]
        stepsize: f64,
        /// Search temperature of the Metropolis test (in free-energy units).
        #[serde(default = "default_hop_temperature")]
        temperature: f64,
        /// Hops between stepsize adjustments.
        #[serde(default = "default_hop_interval")]
        interval: usize,
    },
}

impl SearchStrategy {
    /// Basin hopping with the default hop settings.
    pub fn basin_hopping() -> Self {
        SearchStrategy::BasinHopping {
            stepsize: default_stepsize(),
            temperature: default_hop_temperature(),
            interval: default_hop_interval(),
        }
    }
}

fn default_stepsize() -> f64 {
    0.1
}

fn default_hop_temperature() -> f64 {
    1.0
}

fn default_hop_interval() -> usize {
    50
}

/// How the local solver obtains derivatives of the free energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DerivativeMode {
    /// Closed-form gradient and Hessian.
    #[default]
    Exact,
    /// Central-difference gradient and a BFGS Hessian estimate.
    Approximate,
}

/// Interior-point local solver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalOptions {
    /// Total Newton iterations across all barrier stages.
    #[serde(default = "default_maxiter")]
    pub maxiter: usize,
    /// Step norm below which a barrier stage is considered converged.
    #[serde(default = "default_tol")]
    pub xtol: f64,
    /// Gradient infinity norm below which a barrier stage is converged.
    #[serde(default = "default_tol")]
    pub gtol: f64,
    /// Final barrier parameter.
    #[serde(default = "default_tol")]
    pub barrier_tol: f64,
    /// Initial trust radius bounding the step length.
    #[serde(default = "default_tr_radius")]
    pub initial_tr_radius: f64,
    /// Barrier parameter of the first stage.
    #[serde(default = "default_initial_barrier")]
    pub initial_barrier_parameter: f64,
    /// Factor applied to the barrier parameter between stages.
    #[serde(default = "default_barrier_decay")]
    pub barrier_decay: f64,
}

fn default_maxiter() -> usize {
    5000
}

fn default_tol() -> f64 {
    1e-8
}

fn default_tr_radius() -> f64 {
    1.0
}

fn default_initial_barrier() -> f64 {
    0.1
}

fn default_barrier_decay() -> f64 {
    0.2
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            maxiter: default_maxiter(),
            xtol: default_tol(),
            gtol: default_tol(),
            barrier_tol: default_tol(),
            initial_tr_radius: default_tr_radius(),
            initial_barrier_parameter: default_initial_barrier(),
            barrier_decay: default_barrier_decay(),
        }
    }
}

/// Inclusive temperature grid in kelvin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// First temperature.
    #[serde(default = "default_tmin")]
    pub tmin: f64,
    /// Last temperature (included when on the grid).
    #[serde(default = "default_tmax")]
    pub tmax: f64,
    /// Grid spacing.
    #[serde(default = "default_tstep")]
    pub tstep: f64,
}

fn default_tmin() -> f64 {
    100.0
}

fn default_tmax() -> f64 {
    2000.0
}

fn default_tstep() -> f64 {
    100.0
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            tmin: default_tmin(),
            tmax: default_tmax(),
            tstep: default_tstep(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
}

fn default_master_seed() -> u64 {
    DEFAULT_SEED
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
        }
    }
}

/// Output file layout. Relative names resolve against the output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory. `None` writes into the structure directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Per-temperature result table.
    #[serde(default = "default_results_file")]
    pub results_file: PathBuf,
    /// JSON copy of the result table.
    #[serde(default = "default_results_json")]
    pub results_json: PathBuf,
    /// Run manifest.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: PathBuf,
    /// Directory for per-temperature trial logs. `None` disables them.
    #[serde(default = "default_trial_log_dir")]
    pub trial_log_dir: Option<PathBuf>,
    /// Ordered correlations, one value per line.
    #[serde(default = "default_ordered_correlations")]
    pub ordered_correlations: PathBuf,
    /// Ordered configuration probabilities, one block per line.
    #[serde(default = "default_ordered_rho")]
    pub ordered_rho: PathBuf,
}

fn default_results_file() -> PathBuf {
    PathBuf::from("result.csv")
}

fn default_results_json() -> PathBuf {
    PathBuf::from("result.json")
}

fn default_manifest_file() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_trial_log_dir() -> Option<PathBuf> {
    Some(PathBuf::from("trials"))
}

fn default_ordered_correlations() -> PathBuf {
    PathBuf::from("ordered_correlations.out")
}

fn default_ordered_rho() -> PathBuf {
    PathBuf::from("ordered_rho.out")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            results_file: default_results_file(),
            results_json: default_results_json(),
            manifest_file: default_manifest_file(),
            trial_log_dir: default_trial_log_dir(),
            ordered_correlations: default_ordered_correlations(),
            ordered_rho: default_ordered_rho(),
        }
    }
}

impl OutputConfig {
    /// Output directory for a run in `structure_dir`.
    pub fn root(&self, structure_dir: &Path) -> PathBuf {
        match &self.directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => structure_dir.join(dir),
            None => structure_dir.to_path_buf(),
        }
    }

    /// Resolves a configured file name under the output directory.
    pub fn path(&self, structure_dir: &Path, name: &Path) -> PathBuf {
        if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.root(structure_dir).join(name)
        }
    }
}
