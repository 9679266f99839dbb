use cvm_core::{CvmError, ErrorInfo};
use nalgebra::DVector;
use tracing::{debug, info, warn};

use crate::optimizer::SearchContext;
use crate::result::{violation_warning, OptimizationResult};
use crate::sampler::TrialSource;
use crate::trials::{TrialLog, TrialRecord, TrialStatus};

/// Random-restart global search.
///
/// Trial 0 starts from the disordered state, later trials from `sampler`.
/// A local minimum replaces the incumbent only when it is feasible within
/// `constr_tol` and strictly lower in free energy. The search stops early
/// once more than `early_stopping_count` trials passed without improvement
/// and more than half of the trials ran.
pub fn random_restart(
    ctx: &SearchContext<'_>,
    sampler: &mut dyn TrialSource,
    log: &mut TrialLog,
) -> Result<OptimizationResult, CvmError> {
    let config = ctx.config;
    let functional = ctx.functional();
    let solver = ctx.solver();
    let anchor = ctx.model.disordered_correlations();
    let dimension = ctx.model.num_clusters();

    let mut best = OptimizationResult {
        temperature: ctx.temperature,
        free_energy: functional.value(anchor),
        correlations: anchor.clone(),
        gradient: DVector::zeros(dimension),
        max_constraint_violation: 0.0,
        accepted: false,
        trial_index: None,
        trials_run: 0,
        constraint_warning: None,
    };
    let mut stall = 0usize;

    for trial in 0..config.num_trials {
        best.trials_run = trial + 1;
        let start = if trial == 0 {
            anchor.clone()
        } else {
            sampler.next_sample()?
        };
        if start.len() != dimension {
            return Err(CvmError::Model(
                ErrorInfo::new(
                    "trial-length",
                    format!("trial vector has {} entries, expected {dimension}", start.len()),
                )
                .with_context("trial", trial.to_string()),
            ));
        }
        let start_energy = functional.value(&start);

        match solver.minimize(&start) {
            Ok(local) => {
                let accepted =
                    local.constr_violation < config.constr_tol && local.fun < best.free_energy;
                debug!(
                    temperature = ctx.temperature,
                    trial,
                    start_energy,
                    local_energy = local.fun,
                    violation = local.constr_violation,
                    iterations = local.iterations,
                    accepted,
                    "trial finished"
                );
                log.push(TrialRecord {
                    temperature: ctx.temperature,
                    trial,
                    start_energy,
                    local_energy: Some(local.fun),
                    constraint_violation: Some(local.constr_violation),
                    accepted,
                    status: if accepted {
                        TrialStatus::Accepted
                    } else {
                        TrialStatus::Rejected
                    },
                    message: local.status.message().to_string(),
                });
                if accepted {
                    stall = 0;
                    best.free_energy = local.fun;
                    best.correlations = local.x;
                    best.gradient = local.gradient;
                    best.max_constraint_violation = local.constr_violation;
                    best.accepted = true;
                    best.trial_index = Some(trial);
                }
            }
            Err(err) if !err.is_fatal() => {
                warn!(
                    temperature = ctx.temperature,
                    trial,
                    start = ?start.as_slice(),
                    status = %err.info().code,
                    message = %err.info().message,
                    "local optimisation failed, trial rejected"
                );
                log.push(TrialRecord {
                    temperature: ctx.temperature,
                    trial,
                    start_energy,
                    local_energy: None,
                    constraint_violation: None,
                    accepted: false,
                    status: TrialStatus::Failed,
                    message: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }

        stall += 1;
        if stall > config.early_stopping_count && 2 * trial > config.num_trials {
            info!(
                temperature = ctx.temperature,
                trials = best.trials_run,
                "no improvement for {} trials after half of the trials, stopping",
                config.early_stopping_count
            );
            break;
        }
    }

    best.constraint_warning = violation_warning(
        best.max_constraint_violation,
        config.constr_tol,
        ctx.temperature,
    );
    Ok(best)
}
