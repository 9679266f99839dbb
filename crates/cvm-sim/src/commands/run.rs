use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use cvm_cluster::ClusterFiles;
use cvm_opt::{
    run_sweep, temperature_grid, write_results_csv, write_results_json, CvmOptimizer,
    DerivativeMode, RandomStructureSampler, RunManifest, SearchStrategy,
};
use tracing::{info, warn};

use crate::commands::args::{FileArgs, FitFlags};
use crate::pipeline;
use crate::settings::SimConfig;
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// First temperature (K).
    #[arg(long)]
    pub tmin: Option<f64>,
    /// Last temperature (K).
    #[arg(long)]
    pub tmax: Option<f64>,
    /// Temperature step (K).
    #[arg(long)]
    pub tstep: Option<f64>,
    /// Local minimisations or hops per temperature.
    #[arg(long)]
    pub num_trials: Option<usize>,
    /// Trials without improvement before stopping early.
    #[arg(long)]
    pub early_stopping_count: Option<usize>,
    /// Maximum constraint violation of an accepted result.
    #[arg(long)]
    pub constr_tol: Option<f64>,
    /// Iteration limit of each local minimisation.
    #[arg(long)]
    pub maxiter: Option<usize>,
    /// Keep the search inside a ball around the disordered state.
    #[arg(long)]
    pub norm_constraint: bool,
    /// Use finite-difference gradients and a BFGS Hessian.
    #[arg(long)]
    pub approx_deriv: bool,
    /// Use basin hopping instead of random restarts.
    #[arg(long)]
    pub basin_hopping: bool,
    /// Initial basin-hopping step size.
    #[arg(long)]
    pub stepsize: Option<f64>,
    /// Output directory, relative to the structure directory.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Result table file name.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Do not write per-temperature trial logs.
    #[arg(long)]
    pub no_trial_logs: bool,
    /// Stop after the sweep without fitting the correction.
    #[arg(long)]
    pub skip_fit: bool,
    #[command(flatten)]
    pub files: FileArgs,
    #[command(flatten)]
    pub fit: FitFlags,
}

impl RunArgs {
    fn apply(&self, config: &mut SimConfig) {
        let sweep = &mut config.run.sweep;
        sweep.tmin = self.tmin.unwrap_or(sweep.tmin);
        sweep.tmax = self.tmax.unwrap_or(sweep.tmax);
        sweep.tstep = self.tstep.unwrap_or(sweep.tstep);

        let optimizer = &mut config.run.optimizer;
        optimizer.num_trials = self.num_trials.unwrap_or(optimizer.num_trials);
        optimizer.early_stopping_count = self
            .early_stopping_count
            .unwrap_or(optimizer.early_stopping_count);
        optimizer.constr_tol = self.constr_tol.unwrap_or(optimizer.constr_tol);
        optimizer.local.maxiter = self.maxiter.unwrap_or(optimizer.local.maxiter);
        if self.norm_constraint {
            optimizer.norm_constrained = true;
        }
        if self.approx_deriv {
            optimizer.derivatives = DerivativeMode::Approximate;
        }
        if self.basin_hopping && !matches!(optimizer.strategy, SearchStrategy::BasinHopping { .. }) {
            optimizer.strategy = SearchStrategy::basin_hopping();
        }
        if let Some(value) = self.stepsize {
            match &mut optimizer.strategy {
                SearchStrategy::BasinHopping { stepsize, .. } => *stepsize = value,
                SearchStrategy::RandomRestart => {
                    warn!(stepsize = value, "--stepsize only applies to basin hopping, ignored")
                }
            }
        }

        let output = &mut config.run.output;
        if let Some(dir) = &self.output_dir {
            output.directory = Some(dir.clone());
        }
        if let Some(out) = &self.out {
            output.results_file = out.clone();
        }
        if self.no_trial_logs {
            output.trial_log_dir = None;
        }

        self.files.apply(config);
        self.fit.apply(config);
    }
}

pub fn run(global: &GlobalArgs, args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = global.load_config()?;
    args.apply(&mut config);
    config.run.optimizer.validate()?;
    let temperatures = temperature_grid(&config.run.sweep)?;
    let workdir = global.workdir.as_path();
    let seed = config.run.seed_policy.master_seed;
    info!(
        workdir = %workdir.display(),
        seed,
        temperatures = temperatures.len(),
        strategy = ?config.run.optimizer.strategy,
        "starting sweep"
    );

    pipeline::generate_clusters(workdir, &config);
    let corrdump = pipeline::correlation_tool(workdir, &config);
    let mut model = pipeline::load_model(workdir, &config, &corrdump)?;
    pipeline::solve_ordered(&mut model, workdir, &config)?;

    let output = &config.run.output;
    let results_path = output.path(workdir, &output.results_file);
    let manifest_path = output.path(workdir, &output.manifest_file);
    let trial_dir = output
        .trial_log_dir
        .as_ref()
        .map(|dir| output.path(workdir, dir));

    let mut manifest = RunManifest::new(&model, &config.run);
    manifest.provenance = manifest
        .provenance
        .with_tool("cvm-sim", env!("CARGO_PKG_VERSION"));
    manifest.write(&manifest_path)?;

    let mut optimizer = CvmOptimizer::new(&model, config.run.optimizer.clone())?.with_seed(seed);
    let mut sampler = RandomStructureSampler::new(
        ClusterFiles::resolve(workdir, &config.files.structure),
        ClusterFiles::resolve(workdir, &config.files.random_structure),
        &corrdump,
        seed,
    );
    let constr_tol = config.run.optimizer.constr_tol;
    let records = run_sweep(&mut optimizer, &temperatures, &mut sampler, |records, log| {
        let Some(last) = records.last() else {
            return Ok(());
        };
        if last.constraint_violation > constr_tol {
            warn!(
                temperature = last.temperature,
                violation = last.constraint_violation,
                "result kept despite constraint violation"
            );
        }
        write_results_csv(&results_path, records)?;
        if let Some(dir) = &trial_dir {
            let path = dir.join(pipeline::trial_log_name(last.temperature));
            log.write_csv(&path)?;
            manifest.trial_logs.push(path);
        }
        manifest.temperatures.push(last.temperature);
        manifest.write(&manifest_path)
    })?;
    write_results_json(&output.path(workdir, &output.results_json), &records)?;
    info!(
        results = %results_path.display(),
        temperatures = records.len(),
        "sweep finished"
    );

    if args.skip_fit {
        return Ok(());
    }
    pipeline::fit_records(&records, model.num_structure_atoms(), workdir, &config)?;
    Ok(())
}
