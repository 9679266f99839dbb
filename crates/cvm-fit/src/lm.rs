use cvm_core::{CvmError, ErrorInfo};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Levenberg–Marquardt settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmOptions {
    /// Maximum number of residual evaluations.
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: usize,
    /// Relative step size below which the fit has converged.
    #[serde(default = "default_xtol")]
    pub xtol: f64,
    /// Relative cost reduction below which the fit has converged.
    #[serde(default = "default_ftol")]
    pub ftol: f64,
}

fn default_max_evaluations() -> usize {
    100_000
}

fn default_xtol() -> f64 {
    1e-12
}

fn default_ftol() -> f64 {
    1e-15
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_evaluations: default_max_evaluations(),
            xtol: default_xtol(),
            ftol: default_ftol(),
        }
    }
}

/// Least-squares problem `min Σ (y_i − f(x_i; p))²`.
pub trait LeastSquares {
    /// Number of observations.
    fn len(&self) -> usize;
    /// Model prediction for observation `i`.
    fn predict(&self, i: usize, params: &DVector<f64>) -> f64;
    /// Gradient of the prediction for observation `i`.
    fn jacobian_row(&self, i: usize, params: &DVector<f64>) -> DVector<f64>;
    /// Observed value `i`.
    fn observed(&self, i: usize) -> f64;
}

/// Converged least-squares solution.
#[derive(Debug, Clone, PartialEq)]
pub struct LmSolution {
    /// Best-fit parameters.
    pub params: DVector<f64>,
    /// Parameter covariance `s²·(JᵀJ)⁻¹`; `None` when the problem has no
    /// spare degrees of freedom or `JᵀJ` is singular.
    pub covariance: Option<DMatrix<f64>>,
    /// Sum of squared residuals.
    pub cost: f64,
    /// Residual evaluations used.
    pub evaluations: usize,
}

fn residuals(problem: &dyn LeastSquares, params: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(
        problem.len(),
        (0..problem.len()).map(|i| problem.observed(i) - problem.predict(i, params)),
    )
}

fn jacobian(problem: &dyn LeastSquares, params: &DVector<f64>) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(problem.len(), params.len());
    for i in 0..problem.len() {
        out.set_row(i, &problem.jacobian_row(i, params).transpose());
    }
    out
}

/// Marquardt-scaled Levenberg–Marquardt with an analytic Jacobian.
pub fn levenberg_marquardt(
    problem: &dyn LeastSquares,
    initial: DVector<f64>,
    options: &LmOptions,
) -> Result<LmSolution, CvmError> {
    let n = problem.len();
    let m = initial.len();
    if n < m {
        return Err(CvmError::Fit(
            ErrorInfo::new("fit-too-few-points", "fewer data points than coefficients")
                .with_context("points", n.to_string())
                .with_context("coefficients", m.to_string()),
        ));
    }

    let mut params = initial;
    let mut residual = residuals(problem, &params);
    let mut cost = residual.norm_squared();
    let mut evaluations = 1usize;
    if !cost.is_finite() {
        return Err(non_finite(&params));
    }
    let mut lambda = 1e-3;

    'outer: loop {
        let jac = jacobian(problem, &params);
        let normal = jac.tr_mul(&jac);
        let rhs = jac.tr_mul(&residual);
        if rhs.amax() == 0.0 {
            break;
        }
        loop {
            if evaluations >= options.max_evaluations {
                return Err(CvmError::Fit(
                    ErrorInfo::new("fit-max-evaluations", "maximum number of evaluations exceeded")
                        .with_context("evaluations", evaluations.to_string())
                        .with_context("cost", format!("{cost:e}"))
                        .with_hint("provide initial coefficients closer to the solution"),
                ));
            }
            let mut damped = normal.clone();
            for k in 0..m {
                damped[(k, k)] += lambda * normal[(k, k)].max(1e-12);
            }
            let Some(step) = damped.cholesky().map(|c| c.solve(&rhs)) else {
                lambda *= 10.0;
                if lambda > 1e16 {
                    break 'outer;
                }
                continue;
            };
            let candidate = &params + &step;
            let candidate_residual = residuals(problem, &candidate);
            let candidate_cost = candidate_residual.norm_squared();
            evaluations += 1;
            trace!(evaluations, lambda, cost, candidate_cost, "lm step");

            if candidate_cost.is_finite() && candidate_cost < cost {
                let reduction = (cost - candidate_cost) / cost;
                let small_step = step.norm() <= options.xtol * (params.norm() + options.xtol);
                params = candidate;
                residual = candidate_residual;
                cost = candidate_cost;
                lambda = (lambda / 10.0).max(1e-12);
                if reduction <= options.ftol || small_step || cost == 0.0 {
                    break 'outer;
                }
                break;
            }
            lambda *= 10.0;
            if lambda > 1e16 {
                debug!(evaluations, cost, "no further decrease possible");
                break 'outer;
            }
        }
    }

    let jac = jacobian(problem, &params);
    let covariance = if n > m {
        let scale = cost / (n - m) as f64;
        let inverse = jac.tr_mul(&jac).try_inverse();
        if inverse.is_none() {
            warn!("JᵀJ is singular, coefficient covariance unavailable");
        }
        inverse.map(|inv| inv * scale)
    } else {
        warn!("as many coefficients as points, coefficient covariance unavailable");
        None
    };
    Ok(LmSolution {
        params,
        covariance,
        cost,
        evaluations,
    })
}

fn non_finite(params: &DVector<f64>) -> CvmError {
    CvmError::Fit(
        ErrorInfo::new("fit-non-finite", "residuals are not finite at the initial coefficients")
            .with_context("params", format!("{:?}", params.as_slice())),
    )
}
