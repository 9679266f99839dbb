use cvm_core::{CvmError, ErrorInfo};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::{DerivativeMode, LocalOptions};
use crate::functional::FreeEnergyFunctional;
use crate::region::FeasibleRegion;

/// Fraction of the distance to the boundary a step may cover.
const FRACTION_TO_BOUNDARY: f64 = 0.995;
/// Sufficient decrease constant of the Armijo test.
const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 50;
const MAX_TRUST_RADIUS: f64 = 1e3;

/// Why a local minimisation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocalStatus {
    /// Every barrier stage reached its gradient tolerance.
    GradientTolerance,
    /// The last barrier stage stopped because steps fell below `xtol`.
    StepTolerance,
    /// Nothing to optimise: every coordinate is pinned.
    NoFreeCoordinates,
    /// The start point was kept without a minimisation.
    Unchanged,
}

impl LocalStatus {
    /// Human readable description.
    pub fn message(&self) -> &'static str {
        match self {
            LocalStatus::GradientTolerance => "gradient tolerance reached",
            LocalStatus::StepTolerance => "step size below xtol",
            LocalStatus::NoFreeCoordinates => "all coordinates fixed",
            LocalStatus::Unchanged => "start point kept",
        }
    }
}

/// Outcome of one constrained local minimisation.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalResult {
    /// Minimiser.
    pub x: DVector<f64>,
    /// Free energy at the minimiser.
    pub fun: f64,
    /// Free-energy gradient at the minimiser (all coordinates).
    pub gradient: DVector<f64>,
    /// Maximum constraint violation at the minimiser.
    pub constr_violation: f64,
    /// Newton iterations used.
    pub iterations: usize,
    /// Stop reason.
    pub status: LocalStatus,
}

/// Primal log-barrier interior-point solver over the free coordinates.
///
/// Each barrier stage minimises `F(x) + μ·B(x)` with damped Newton steps,
/// then `μ` shrinks by `barrier_decay` until it falls below `barrier_tol`.
pub struct LocalSolver<'a> {
    functional: FreeEnergyFunctional<'a>,
    region: &'a FeasibleRegion,
    options: &'a LocalOptions,
    derivatives: DerivativeMode,
    anchor: &'a DVector<f64>,
}

impl<'a> LocalSolver<'a> {
    /// Creates a solver. `anchor` must be strictly interior; infeasible
    /// starts are pulled towards it.
    pub fn new(
        functional: FreeEnergyFunctional<'a>,
        region: &'a FeasibleRegion,
        options: &'a LocalOptions,
        derivatives: DerivativeMode,
        anchor: &'a DVector<f64>,
    ) -> Self {
        Self {
            functional,
            region,
            options,
            derivatives,
            anchor,
        }
    }

    /// Minimises the free energy from `start`.
    pub fn minimize(&self, start: &DVector<f64>) -> Result<LocalResult, CvmError> {
        let free = self.region.free_indices();
        let mut x = self.region.pull_inside(start, self.anchor).ok_or_else(|| {
            failure("local-start", "no strictly interior start point", 0)
        })?;
        if free.is_empty() {
            return Ok(self.finish(x, 0, LocalStatus::NoFreeCoordinates));
        }

        let barrier = Barrier {
            region: self.region,
            free: &free,
        };
        let mut bfgs = Bfgs::new(free.len());
        let mut previous_gradient: Option<(DVector<f64>, DVector<f64>)> = None;
        let mut mu = self.options.initial_barrier_parameter;
        let mut radius = self.options.initial_tr_radius;
        let mut iterations = 0usize;
        let mut status;

        loop {
            let tolerance = self.options.gtol.max(mu);
            status = LocalStatus::GradientTolerance;
            loop {
                let objective_gradient = match self.derivatives {
                    DerivativeMode::Exact => self.functional.gradient(&x),
                    DerivativeMode::Approximate => self.functional.numerical_gradient(&x),
                };
                let objective_free = select(&objective_gradient, &free);
                if let Some((step, old_gradient)) = previous_gradient.take() {
                    bfgs.update(&step, &(&objective_free - old_gradient));
                }
                let gradient = &objective_free + barrier.gradient(&x) * mu;
                if !gradient.iter().all(|v| v.is_finite()) {
                    return Err(failure(
                        "local-breakdown",
                        "non-finite gradient",
                        iterations,
                    ));
                }
                if gradient.amax() <= tolerance {
                    break;
                }
                if iterations >= self.options.maxiter {
                    return Err(CvmError::LocalOptimizationFailure(
                        ErrorInfo::new("local-maxiter", "maximum number of iterations exceeded")
                            .with_context("iterations", iterations.to_string())
                            .with_context("mu", format!("{mu:e}")),
                    ));
                }
                iterations += 1;

                let objective_hessian = match self.derivatives {
                    DerivativeMode::Exact => select_square(&self.functional.hessian(&x), &free),
                    DerivativeMode::Approximate => bfgs.matrix().clone(),
                };
                let hessian = objective_hessian + barrier.hessian(&x) * mu;
                let mut direction = newton_direction(&hessian, &gradient);
                let mut slope = gradient.dot(&direction);
                if !(slope < 0.0) {
                    direction = -&gradient;
                    slope = -gradient.norm_squared();
                }
                let direction_norm = direction.norm();
                if direction_norm > radius {
                    direction *= radius / direction_norm;
                    slope *= radius / direction_norm;
                }

                let full_direction = scatter(&direction, &free, x.len());
                let merit = self.merit(&barrier, &x, mu);
                let alpha_max = self.max_step(&x, &full_direction);
                let mut alpha = alpha_max;
                let mut accepted = None;
                for _ in 0..MAX_BACKTRACKS {
                    let candidate = &x + &full_direction * alpha;
                    if self.region.is_strictly_interior(&candidate) {
                        let value = self.merit(&barrier, &candidate, mu);
                        if value <= merit + ARMIJO * alpha * slope {
                            accepted = Some(candidate);
                            break;
                        }
                    }
                    alpha *= 0.5;
                }

                let Some(candidate) = accepted else {
                    radius *= 0.25;
                    if radius < self.options.xtol {
                        status = LocalStatus::StepTolerance;
                        break;
                    }
                    continue;
                };

                let step = select(&(&candidate - &x), &free);
                let step_norm = step.norm();
                if alpha >= alpha_max && alpha_max >= 1.0 && direction.norm() >= 0.99 * radius {
                    radius = (radius * 2.0).min(MAX_TRUST_RADIUS);
                } else if alpha < 0.25 * alpha_max {
                    radius = (radius * 0.5).max(step_norm);
                }
                if self.derivatives == DerivativeMode::Approximate {
                    previous_gradient = Some((step, objective_free));
                }
                x = candidate;
                trace!(iterations, mu, step_norm, radius, "barrier newton step");
                if step_norm < self.options.xtol {
                    status = LocalStatus::StepTolerance;
                    break;
                }
            }
            if mu < self.options.barrier_tol {
                break;
            }
            mu *= self.options.barrier_decay;
            radius = radius.max(self.options.initial_tr_radius);
        }

        let result = self.finish(x, iterations, status);
        if !result.fun.is_finite() {
            return Err(failure("local-breakdown", "non-finite free energy", iterations));
        }
        Ok(result)
    }

    fn merit(&self, barrier: &Barrier<'_>, x: &DVector<f64>, mu: f64) -> f64 {
        self.functional.value(x) + mu * barrier.value(x)
    }

    /// Largest step keeping every probability and free coordinate at least
    /// `1 − τ` of its current slack away from the boundary.
    fn max_step(&self, x: &DVector<f64>, direction: &DVector<f64>) -> f64 {
        let mut alpha: f64 = 1.0;
        let rho = self.region.constraint_values(x);
        let drho = self.region.constraint_values(direction);
        for (r, d) in rho.iter().zip(drho.iter()) {
            if *d < 0.0 {
                alpha = alpha.min(-FRACTION_TO_BOUNDARY * r / d);
            }
        }
        let (lower, upper) = (self.region.lower(), self.region.upper());
        for idx in 0..x.len() {
            let d = direction[idx];
            if d > 0.0 {
                alpha = alpha.min(FRACTION_TO_BOUNDARY * (upper[idx] - x[idx]) / d);
            } else if d < 0.0 {
                alpha = alpha.min(FRACTION_TO_BOUNDARY * (x[idx] - lower[idx]) / -d);
            }
        }
        alpha.max(0.0)
    }

    fn finish(&self, x: DVector<f64>, iterations: usize, status: LocalStatus) -> LocalResult {
        LocalResult {
            fun: self.functional.value(&x),
            gradient: self.functional.gradient(&x),
            constr_violation: self.region.max_violation(&x),
            x,
            iterations,
            status,
        }
    }
}

/// Log barrier of the region restricted to its free coordinates.
struct Barrier<'r> {
    region: &'r FeasibleRegion,
    free: &'r [usize],
}

impl Barrier<'_> {
    fn norm_terms(&self, x: &DVector<f64>) -> Option<(DVector<f64>, f64)> {
        self.region.norm_constraint().map(|constraint| {
            let offset = x - &constraint.center;
            let slack = constraint.radius * constraint.radius - offset.norm_squared();
            (offset, slack)
        })
    }

    fn value(&self, x: &DVector<f64>) -> f64 {
        let mut total = 0.0;
        for rho in self.region.constraint_values(x).iter() {
            total -= rho.ln();
        }
        for &idx in self.free {
            total -= (self.region.upper()[idx] - x[idx]).ln();
            total -= (x[idx] - self.region.lower()[idx]).ln();
        }
        if let Some((_, slack)) = self.norm_terms(x) {
            total -= slack.ln();
        }
        if total.is_nan() {
            f64::INFINITY
        } else {
            total
        }
    }

    fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        let rho = self.region.constraint_values(x);
        let inverse = rho.map(|r| 1.0 / r);
        let mut full = -self.region.vmatrix().tr_mul(&inverse);
        for &idx in self.free {
            full[idx] += 1.0 / (self.region.upper()[idx] - x[idx])
                - 1.0 / (x[idx] - self.region.lower()[idx]);
        }
        if let Some((offset, slack)) = self.norm_terms(x) {
            full += offset * (2.0 / slack);
        }
        select(&full, self.free)
    }

    fn hessian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let vmatrix = self.region.vmatrix();
        let rho = self.region.constraint_values(x);
        let mut scaled = vmatrix.clone();
        for (row, r) in rho.iter().enumerate() {
            scaled.row_mut(row).scale_mut(1.0 / (r * r));
        }
        let mut full = vmatrix.tr_mul(&scaled);
        for &idx in self.free {
            let up = self.region.upper()[idx] - x[idx];
            let down = x[idx] - self.region.lower()[idx];
            full[(idx, idx)] += 1.0 / (up * up) + 1.0 / (down * down);
        }
        if let Some((offset, slack)) = self.norm_terms(x) {
            full += &offset * offset.transpose() * (4.0 / (slack * slack));
            for idx in 0..full.nrows() {
                full[(idx, idx)] += 2.0 / slack;
            }
        }
        select_square(&full, self.free)
    }
}

/// Dense BFGS estimate of the objective Hessian on the free coordinates.
struct Bfgs {
    matrix: DMatrix<f64>,
    initialised: bool,
}

impl Bfgs {
    fn new(dimension: usize) -> Self {
        Self {
            matrix: DMatrix::identity(dimension, dimension),
            initialised: false,
        }
    }

    fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    fn update(&mut self, step: &DVector<f64>, change: &DVector<f64>) {
        let curvature = step.dot(change);
        if curvature <= 1e-12 * step.norm() * change.norm() {
            return;
        }
        if !self.initialised {
            let scale = change.norm_squared() / curvature;
            self.matrix = DMatrix::identity(step.len(), step.len()) * scale;
            self.initialised = true;
        }
        let bs = &self.matrix * step;
        let sbs = step.dot(&bs);
        if sbs <= 0.0 {
            return;
        }
        self.matrix += change * change.transpose() / curvature - &bs * bs.transpose() / sbs;
    }
}

/// Solves `(H + λI)·p = −g`, raising `λ` until the Cholesky factorisation
/// succeeds. Falls back to steepest descent.
fn newton_direction(hessian: &DMatrix<f64>, gradient: &DVector<f64>) -> DVector<f64> {
    let scale = hessian.diagonal().amax().max(1e-12);
    let mut lambda = 0.0;
    for _ in 0..40 {
        let mut shifted = hessian.clone();
        for idx in 0..shifted.nrows() {
            shifted[(idx, idx)] += lambda;
        }
        if let Some(cholesky) = shifted.cholesky() {
            return -cholesky.solve(gradient);
        }
        lambda = if lambda == 0.0 { 1e-10 * scale } else { lambda * 10.0 };
    }
    -gradient
}

fn select(full: &DVector<f64>, free: &[usize]) -> DVector<f64> {
    DVector::from_iterator(free.len(), free.iter().map(|&idx| full[idx]))
}

fn select_square(full: &DMatrix<f64>, free: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(free.len(), free.len(), |i, j| full[(free[i], free[j])])
}

fn scatter(reduced: &DVector<f64>, free: &[usize], dimension: usize) -> DVector<f64> {
    let mut full = DVector::zeros(dimension);
    for (value, &idx) in reduced.iter().zip(free) {
        full[idx] = *value;
    }
    full
}

fn failure(code: &str, message: &str, iterations: usize) -> CvmError {
    CvmError::LocalOptimizationFailure(
        ErrorInfo::new(code, message).with_context("iterations", iterations.to_string()),
    )
}
