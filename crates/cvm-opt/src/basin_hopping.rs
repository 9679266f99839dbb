use cvm_core::{CvmError, RngHandle};
use nalgebra::DVector;
use tracing::{debug, info, warn};

use crate::local::{LocalResult, LocalStatus};
use crate::metropolis::{adapt_stepsize, attempt_hop};
use crate::optimizer::SearchContext;
use crate::result::{violation_warning, OptimizationResult};
use crate::trials::{TrialLog, TrialRecord, TrialStatus};

/// Basin-hopping parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HopParameters {
    /// Initial standard deviation of the Gaussian hop.
    pub stepsize: f64,
    /// Metropolis search temperature.
    pub temperature: f64,
    /// Hops between stepsize adjustments.
    pub interval: usize,
}

/// Basin-hopping global search.
///
/// Only multi-body correlations that are not pinned are perturbed. A hop is
/// accepted when its minimum keeps every probability in `[0, 1]` and passes
/// the Metropolis test against the current minimum. The search stops after
/// `num_trials` hops, or once more than `early_stopping_count` consecutive
/// hops found no new best.
pub fn basin_hopping(
    ctx: &SearchContext<'_>,
    params: HopParameters,
    rng: &mut RngHandle,
    log: &mut TrialLog,
) -> Result<OptimizationResult, CvmError> {
    let config = ctx.config;
    let functional = ctx.functional();
    let solver = ctx.solver();
    let anchor = ctx.model.disordered_correlations();
    let hop_indices: Vec<usize> = ctx
        .model
        .multibody_clusters()
        .into_iter()
        .filter(|&idx| !ctx.region.is_fixed(idx))
        .collect();

    let initial = match solver.minimize(anchor) {
        Ok(local) => local,
        Err(err) if !err.is_fatal() => {
            warn!(
                temperature = ctx.temperature,
                error = %err,
                "initial minimisation failed, hopping from the disordered state"
            );
            LocalResult {
                fun: functional.value(anchor),
                gradient: DVector::zeros(anchor.len()),
                constr_violation: ctx.region.max_violation(anchor),
                x: anchor.clone(),
                iterations: 0,
                status: LocalStatus::Unchanged,
            }
        }
        Err(err) => return Err(err),
    };
    log.push(TrialRecord {
        temperature: ctx.temperature,
        trial: 0,
        start_energy: functional.value(anchor),
        local_energy: Some(initial.fun),
        constraint_violation: Some(initial.constr_violation),
        accepted: true,
        status: TrialStatus::Accepted,
        message: initial.status.message().to_string(),
    });

    let mut current = initial.clone();
    let mut best = initial;
    let mut best_hop = 0usize;
    let mut stepsize = params.stepsize;
    let mut accepted_total = 0usize;
    let mut stall = 0usize;
    let mut hops_run = 0usize;

    for hop in 1..=config.num_trials {
        hops_run = hop;
        let mut start = current.x.clone();
        for &idx in &hop_indices {
            start[idx] += rng.gaussian(stepsize);
        }
        let start_energy = functional.value(&start);

        match solver.minimize(&start) {
            Ok(local) => {
                let in_unit = ctx
                    .region
                    .constraint_values(&local.x)
                    .iter()
                    .all(|&rho| (0.0..=1.0).contains(&rho));
                let (passed, probability) =
                    attempt_hop(current.fun, local.fun, params.temperature, rng);
                let accepted = in_unit && passed;
                debug!(
                    temperature = ctx.temperature,
                    hop,
                    stepsize,
                    local_energy = local.fun,
                    probability,
                    accepted,
                    "hop finished"
                );
                log.push(TrialRecord {
                    temperature: ctx.temperature,
                    trial: hop,
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
                    accepted_total += 1;
                    if local.fun < best.fun {
                        best = local.clone();
                        best_hop = hop;
                        stall = 0;
                    } else {
                        stall += 1;
                    }
                    current = local;
                } else {
                    stall += 1;
                }
            }
            Err(err) if !err.is_fatal() => {
                warn!(
                    temperature = ctx.temperature,
                    hop,
                    start = ?start.as_slice(),
                    status = %err.info().code,
                    message = %err.info().message,
                    "local optimisation failed, hop rejected"
                );
                log.push(TrialRecord {
                    temperature: ctx.temperature,
                    trial: hop,
                    start_energy,
                    local_energy: None,
                    constraint_violation: None,
                    accepted: false,
                    status: TrialStatus::Failed,
                    message: err.to_string(),
                });
                stall += 1;
            }
            Err(err) => return Err(err),
        }

        if hop % params.interval == 0 {
            let rate = accepted_total as f64 / hop as f64;
            stepsize = adapt_stepsize(stepsize, rate);
            debug!(hop, rate, stepsize, "adjusted hop size");
        }
        if stall > config.early_stopping_count {
            info!(
                temperature = ctx.temperature,
                hops = hop,
                "more than {} hops without a new minimum, stopping",
                config.early_stopping_count
            );
            break;
        }
    }

    let constraint_warning =
        violation_warning(best.constr_violation, config.constr_tol, ctx.temperature);
    if let Some(warning) = &constraint_warning {
        warn!(%warning, "basin hopping result violates constraints");
    }
    Ok(OptimizationResult {
        temperature: ctx.temperature,
        free_energy: best.fun,
        correlations: best.x,
        gradient: best.gradient,
        max_constraint_violation: best.constr_violation,
        accepted: best.fun < functional.value(anchor),
        trial_index: Some(best_hop),
        trials_run: hops_run,
        constraint_warning,
    })
}
