use cvm_cluster::ClusterModel;
use cvm_core::{CvmError, RngHandle, DEFAULT_SEED};
use nalgebra::DVector;
use tracing::{info, warn};

use crate::basin_hopping::{basin_hopping, HopParameters};
use crate::config::{OptimizerConfig, SearchStrategy};
use crate::determinism;
use crate::functional::FreeEnergyFunctional;
use crate::local::LocalSolver;
use crate::random_restart::random_restart;
use crate::region::FeasibleRegion;
use crate::result::OptimizationResult;
use crate::sampler::TrialSource;
use crate::trials::TrialLog;

/// Everything a global strategy needs at one temperature.
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    /// Cluster model.
    pub model: &'a ClusterModel,
    /// Feasible region of the search.
    pub region: &'a FeasibleRegion,
    /// Shared optimiser settings.
    pub config: &'a OptimizerConfig,
    /// Temperature in kelvin.
    pub temperature: f64,
}

impl<'a> SearchContext<'a> {
    /// Free energy at the context temperature.
    pub fn functional(&self) -> FreeEnergyFunctional<'a> {
        FreeEnergyFunctional::new(self.model, self.temperature)
    }

    /// Local solver anchored at the disordered state.
    pub fn solver(&self) -> LocalSolver<'a> {
        LocalSolver::new(
            self.functional(),
            self.region,
            &self.config.local,
            self.config.derivatives,
            self.model.disordered_correlations(),
        )
    }
}

/// Global free-energy minimiser; the strategy is picked by
/// [`OptimizerConfig::strategy`].
#[derive(Debug)]
pub struct CvmOptimizer<'a> {
    model: &'a ClusterModel,
    region: FeasibleRegion,
    config: OptimizerConfig,
    master_seed: u64,
    trial_log: TrialLog,
}

impl<'a> CvmOptimizer<'a> {
    /// Validates `config` and builds the feasible region of `model`.
    pub fn new(model: &'a ClusterModel, config: OptimizerConfig) -> Result<Self, CvmError> {
        config.validate()?;
        let region = FeasibleRegion::build(model, config.norm_constrained)?;
        Ok(Self {
            model,
            region,
            config,
            master_seed: DEFAULT_SEED,
            trial_log: TrialLog::new(),
        })
    }

    /// Sets the master seed used by basin hopping.
    pub fn with_seed(mut self, master_seed: u64) -> Self {
        self.master_seed = master_seed;
        self
    }

    /// The model being optimised.
    pub fn model(&self) -> &'a ClusterModel {
        self.model
    }

    /// The search region.
    pub fn region(&self) -> &FeasibleRegion {
        &self.region
    }

    /// Optimiser settings.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Trials of the last [`CvmOptimizer::fit`] call.
    pub fn trial_log(&self) -> &TrialLog {
        &self.trial_log
    }

    /// Free energy of `correlations` at `temperature`.
    pub fn free_energy(&self, temperature: f64, correlations: &DVector<f64>) -> f64 {
        FreeEnergyFunctional::new(self.model, temperature).value(correlations)
    }

    /// Minimum free-energy state at `temperature`.
    ///
    /// The random-restart strategy draws start points from `sampler`; basin
    /// hopping ignores it and uses its own seeded stream.
    pub fn fit(
        &mut self,
        temperature: f64,
        sampler: &mut dyn TrialSource,
    ) -> Result<OptimizationResult, CvmError> {
        self.trial_log.clear();
        let ctx = SearchContext {
            model: self.model,
            region: &self.region,
            config: &self.config,
            temperature,
        };
        let result = match &self.config.strategy {
            SearchStrategy::RandomRestart => random_restart(&ctx, sampler, &mut self.trial_log)?,
            SearchStrategy::BasinHopping {
                stepsize,
                temperature: hop_temperature,
                interval,
            } => {
                let mut rng =
                    RngHandle::from_seed(determinism::hop_seed(self.master_seed, temperature));
                let params = HopParameters {
                    stepsize: *stepsize,
                    temperature: *hop_temperature,
                    interval: *interval,
                };
                basin_hopping(&ctx, params, &mut rng, &mut self.trial_log)?
            }
        };
        if !self.region.check_probabilities(&result.correlations) {
            warn!(
                temperature,
                "optimised probabilities fall outside [0, 1] beyond tolerance"
            );
        }
        let summary = self.trial_log.summary();
        info!(
            temperature,
            free_energy = result.free_energy,
            trials = result.trials_run,
            accepted = summary.accepted,
            failed = summary.failed,
            violation = result.max_constraint_violation,
            "optimisation finished"
        );
        Ok(result)
    }
}
