use cvm_core::{CvmError, ErrorInfo};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Minimum free-energy state found at one temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Temperature in kelvin.
    pub temperature: f64,
    /// Free energy of `correlations`.
    pub free_energy: f64,
    /// Minimising correlation vector.
    pub correlations: DVector<f64>,
    /// Free-energy gradient at `correlations` (zero when nothing beat the
    /// disordered anchor).
    pub gradient: DVector<f64>,
    /// Maximum constraint violation of `correlations`.
    pub max_constraint_violation: f64,
    /// Whether any trial improved on the disordered anchor.
    pub accepted: bool,
    /// Trial that produced the result.
    pub trial_index: Option<usize>,
    /// Trials executed before the search stopped.
    pub trials_run: usize,
    /// Set when the result violates feasibility beyond the tolerance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_warning: Option<ErrorInfo>,
}

impl OptimizationResult {
    /// The constraint warning as an error value, if any.
    pub fn violation_error(&self) -> Option<CvmError> {
        self.constraint_warning
            .clone()
            .map(CvmError::ConstraintViolationExceeded)
    }
}

/// Warning payload for a violation above `constr_tol`.
pub fn violation_warning(violation: f64, constr_tol: f64, temperature: f64) -> Option<ErrorInfo> {
    (violation >= constr_tol).then(|| {
        ErrorInfo::new("constraint-violation", "best result violates the feasible region")
            .with_context("violation", format!("{violation:e}"))
            .with_context("constr_tol", format!("{constr_tol:e}"))
            .with_context("temperature", temperature.to_string())
    })
}
