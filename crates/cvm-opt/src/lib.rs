#![deny(missing_docs)]

//! Constrained minimisation of the CVM free energy over cluster correlations.

/// Basin-hopping global search.
pub mod basin_hopping;
/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Free-energy functional with gradient and Hessian.
pub mod functional;
/// Interior-point local solver.
pub mod local;
/// Run manifest serialization helpers.
pub mod manifest;
/// Metropolis acceptance and stepsize adaptation.
pub mod metropolis;
/// Strategy dispatch and the optimiser entry point.
pub mod optimizer;
/// Zero temperature ground state via linear programming.
pub mod ordered;
/// Random-restart global search.
pub mod random_restart;
/// Bounds and inequality constraints of the search.
pub mod region;
/// Result of one temperature's optimisation.
pub mod result;
/// Result table persistence.
pub mod results;
/// Start point sources for random restart.
pub mod sampler;
/// Temperature sweep driver.
pub mod sweep;
/// Per-trial bookkeeping.
pub mod trials;

pub use config::{
    DerivativeMode, LocalOptions, OptimizerConfig, OutputConfig, RunConfig, SearchStrategy,
    SeedPolicy, SweepConfig,
};
pub use functional::FreeEnergyFunctional;
pub use local::{LocalResult, LocalSolver, LocalStatus};
pub use manifest::RunManifest;
pub use optimizer::{CvmOptimizer, SearchContext};
pub use ordered::{write_ordered_outputs, OrderedStateSolver};
pub use region::{FeasibleRegion, NormConstraint};
pub use result::OptimizationResult;
pub use results::{read_results_csv, write_results_csv, write_results_json};
pub use sampler::{ConstantSampler, RandomStructureSampler, TrialSource};
pub use sweep::{run_sweep, temperature_grid, SweepRecord};
pub use trials::{TrialLog, TrialRecord, TrialStatus, TrialSummary};
