use cvm_core::{CvmError, ErrorInfo};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SweepConfig;
use crate::optimizer::CvmOptimizer;
use crate::sampler::TrialSource;
use crate::trials::TrialLog;

/// Output record of one temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRecord {
    /// Phase label.
    pub phase: String,
    /// Structure label.
    pub structure: String,
    /// Temperature in kelvin.
    pub temperature: f64,
    /// Free energy of the SQS reference, when available.
    pub f_sqs: Option<f64>,
    /// Free energy of the ordered state.
    pub f_ordered: f64,
    /// Free energy of the disordered state.
    pub f_disordered: f64,
    /// Optimised free energy.
    pub f_optimized: f64,
    /// Constraint violation of the optimised state.
    pub constraint_violation: f64,
    /// Optimised correlations.
    pub correlations: Vec<f64>,
}

/// Inclusive grid `tmin + k·tstep` for `k = 0..=⌊(tmax − tmin)/tstep⌋`.
pub fn temperature_grid(config: &SweepConfig) -> Result<Vec<f64>, CvmError> {
    let SweepConfig { tmin, tmax, tstep } = *config;
    if !(tstep > 0.0) || !tmin.is_finite() || !tmax.is_finite() || tmax < tmin || tmin < 0.0 {
        return Err(CvmError::Config(
            ErrorInfo::new("temperature-grid", "invalid temperature range")
                .with_context("tmin", tmin.to_string())
                .with_context("tmax", tmax.to_string())
                .with_context("tstep", tstep.to_string()),
        ));
    }
    // Nudge so that ranges like 100..2000 step 100 keep their end point.
    let count = ((tmax - tmin) / tstep + 1e-9).floor() as usize + 1;
    Ok((0..count).map(|k| tmin + k as f64 * tstep).collect())
}

/// Runs the optimiser over `temperatures`.
///
/// `on_temperature` is called after every temperature with the records so far
/// and that temperature's trial log, so results can be persisted
/// incrementally. An error from the callback aborts the sweep.
pub fn run_sweep<F>(
    optimizer: &mut CvmOptimizer<'_>,
    temperatures: &[f64],
    sampler: &mut dyn TrialSource,
    mut on_temperature: F,
) -> Result<Vec<SweepRecord>, CvmError>
where
    F: FnMut(&[SweepRecord], &TrialLog) -> Result<(), CvmError>,
{
    let model = optimizer.model();
    let ordered = model.ordered_correlations().cloned().ok_or_else(|| {
        CvmError::Model(
            ErrorInfo::new("ordered-unset", "ordered correlations have not been computed")
                .with_hint("run the ordered state solver before the sweep"),
        )
    })?;
    let disordered = model.disordered_correlations().clone();
    let sqs = model.sqs_correlations().cloned();
    let per_atom = model.num_lattice_atoms().max(1) as f64;

    let mut records = Vec::with_capacity(temperatures.len());
    for &temperature in temperatures {
        let f_ordered = optimizer.free_energy(temperature, &ordered);
        let f_disordered = optimizer.free_energy(temperature, &disordered);
        let f_sqs = sqs
            .as_ref()
            .map(|correlations| optimizer.free_energy(temperature, correlations));
        let result = optimizer.fit(temperature, sampler)?;
        info!(
            temperature,
            f_ordered = f_ordered / per_atom,
            f_disordered = f_disordered / per_atom,
            f_sqs = f_sqs.map(|f| f / per_atom),
            f_optimized = result.free_energy / per_atom,
            "free energies (eV/atom)"
        );
        records.push(SweepRecord {
            phase: model.phase().to_string(),
            structure: model.structure().to_string(),
            temperature,
            f_sqs,
            f_ordered,
            f_disordered,
            f_optimized: result.free_energy,
            constraint_violation: result.max_constraint_violation,
            correlations: result.correlations.iter().copied().collect(),
        });
        on_temperature(&records, optimizer.trial_log())?;
    }
    Ok(records)
}
