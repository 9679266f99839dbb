//! Steps shared by the subcommands.

use std::path::{Path, PathBuf};

use cvm_cluster::{AtomicStructure, ClusterFiles, ClusterModel, Corrdump, CorrelationTool, Cvmclus};
use cvm_core::CvmError;
use cvm_fit::{fit_correction, read_coefficients, write_fit_outputs, FitData, FitOptions, FitResult};
use cvm_opt::{write_ordered_outputs, OrderedStateSolver, SweepRecord};
use tracing::{info, warn};

use crate::settings::SimConfig;

/// Regenerates the cluster files with `cvmclus` when enabled. Failures are
/// logged and the existing files are used.
pub fn generate_clusters(workdir: &Path, config: &SimConfig) {
    if !config.tools.run_cvmclus {
        return;
    }
    let phase_dir = workdir.parent().unwrap_or(workdir);
    let maxclus = ClusterFiles::resolve(phase_dir, &config.files.maximal_clusters);
    let lattice = ClusterFiles::resolve(workdir, &config.files.lattice);
    Cvmclus::with_executable(&config.tools.cvmclus).generate_or_warn(workdir, &maxclus, &lattice);
}

/// `corrdump` bound to the structure directory's cluster and lattice files.
pub fn correlation_tool(workdir: &Path, config: &SimConfig) -> Corrdump {
    Corrdump::new(
        ClusterFiles::resolve(workdir, &config.files.clusters),
        ClusterFiles::resolve(workdir, &config.files.lattice),
    )
    .with_executable(&config.tools.corrdump)
}

pub fn load_model(
    workdir: &Path,
    config: &SimConfig,
    tool: &dyn CorrelationTool,
) -> Result<ClusterModel, CvmError> {
    let model = ClusterModel::load(workdir, &config.files, tool)?;
    info!("\n{}", model.summary());
    Ok(model)
}

/// Solves the ordered state onto `model` and writes its correlation and
/// probability files under the output directory.
pub fn solve_ordered(
    model: &mut ClusterModel,
    workdir: &Path,
    config: &SimConfig,
) -> Result<(), CvmError> {
    let ordered = OrderedStateSolver::solve_into(model)?;
    let output = &config.run.output;
    let correlations = output.path(workdir, &output.ordered_correlations);
    let rho = output.path(workdir, &output.ordered_rho);
    write_ordered_outputs(model, &correlations, &rho)?;
    if let Some(distance) = model.order_disorder_distance() {
        info!(
            ordered = ?ordered.as_slice(),
            distance,
            path = %correlations.display(),
            "ordered state written"
        );
    }
    Ok(())
}

/// Number of sites in the input structure, used to normalise the correction.
pub fn structure_sites(workdir: &Path, config: &SimConfig) -> Result<usize, CvmError> {
    let path = ClusterFiles::resolve(workdir, &config.files.structure);
    Ok(AtomicStructure::read(&path)?.num_sites())
}

/// Fits the SRO correction to `records` and writes the fit files into the
/// output directory. Initial coefficients are read from the structure
/// directory when present.
pub fn fit_records(
    records: &[SweepRecord],
    num_structure_atoms: usize,
    workdir: &Path,
    config: &SimConfig,
) -> Result<FitResult, CvmError> {
    let options: &FitOptions = &config.fit;
    let data = FitData::from_records(records, num_structure_atoms, options.in_joules)?;
    let initial = read_coefficients(
        &ClusterFiles::resolve(workdir, &options.coeff_in),
        &options.model,
    )?;
    let result = fit_correction(&data, options, initial)?;
    if let Some(errors) = result.standard_errors() {
        info!(standard_errors = ?errors.as_slice(), "fit uncertainties");
    } else {
        warn!("fit covariance unavailable");
    }
    let root = config.run.output.root(workdir);
    let outputs = write_fit_outputs(&root, &result, &data, options)?;
    info!(
        coefficients = %outputs.coefficients.display(),
        func = %outputs.func.display(),
        "fit files written"
    );
    Ok(result)
}

/// File name of the trial log for one temperature.
pub fn trial_log_name(temperature: f64) -> PathBuf {
    PathBuf::from(format!("trials_T{temperature}.csv"))
}
