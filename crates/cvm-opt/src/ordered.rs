use std::fs;
use std::path::Path;

use cvm_cluster::ClusterModel;
use cvm_core::{CvmError, ErrorInfo};
use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};
use nalgebra::DVector;
use tracing::{debug, info};

use crate::region::FeasibleRegion;

/// Zero-temperature ground state found by linear programming.
///
/// Minimises `mults_eci·x` subject to `V·x ≥ 0` and the region's bounds.
#[derive(Debug, Clone)]
pub struct OrderedStateSolver<'a> {
    model: &'a ClusterModel,
    region: FeasibleRegion,
}

impl<'a> OrderedStateSolver<'a> {
    /// Prepares the LP for `model`.
    pub fn new(model: &'a ClusterModel) -> Result<Self, CvmError> {
        Ok(Self {
            model,
            region: FeasibleRegion::build(model, false)?,
        })
    }

    /// Solves the LP and returns the ordered correlations.
    pub fn solve(&self) -> Result<DVector<f64>, CvmError> {
        let mut problem = Problem::new(OptimizationDirection::Minimize);
        let variables: Vec<_> = self
            .model
            .mults_eci()
            .iter()
            .enumerate()
            .map(|(idx, &coef)| {
                problem.add_var(coef, (self.region.lower()[idx], self.region.upper()[idx]))
            })
            .collect();
        let vmatrix = self.region.vmatrix();
        for row in 0..vmatrix.nrows() {
            let mut expr = LinearExpr::empty();
            for (col, variable) in variables.iter().enumerate() {
                let coef = vmatrix[(row, col)];
                if coef != 0.0 {
                    expr.add(*variable, coef);
                }
            }
            problem.add_constraint(expr, ComparisonOp::Ge, 0.0);
        }

        let solution = problem.solve().map_err(|err| {
            CvmError::OrderedStateInfeasible(
                ErrorInfo::new("ordered-lp", err.to_string())
                    .with_context("clusters", variables.len().to_string())
                    .with_context("constraints", vmatrix.nrows().to_string())
                    .with_hint("check vmat.out and the point correlations of the input structure"),
            )
        })?;
        let ordered = DVector::from_iterator(
            variables.len(),
            variables.iter().map(|variable| solution[*variable]),
        );
        info!(objective = solution.objective(), "ordered state found");
        debug!(correlations = ?ordered.as_slice(), "ordered correlations");
        Ok(ordered)
    }

    /// Solves the LP and records the result on the model.
    pub fn solve_into(model: &mut ClusterModel) -> Result<DVector<f64>, CvmError> {
        let ordered = OrderedStateSolver::new(model)?.solve()?;
        model.set_ordered_correlations(ordered.clone())?;
        Ok(ordered)
    }
}

/// Writes `ordered_correlations.out` (one value per line) and
/// `ordered_rho.out` (one configuration block per line).
pub fn write_ordered_outputs(
    model: &ClusterModel,
    correlations_path: &Path,
    rho_path: &Path,
) -> Result<(), CvmError> {
    let ordered = model.ordered_correlations().ok_or_else(|| {
        CvmError::Model(ErrorInfo::new(
            "ordered-unset",
            "ordered correlations have not been computed",
        ))
    })?;
    let mut correlations = String::new();
    for value in ordered.iter() {
        correlations.push_str(&format!("{value:.10}\n"));
    }
    let mut rho = String::new();
    for block in model.configuration_probabilities(ordered) {
        let line: Vec<String> = block.iter().map(|p| format!("{p:.10}")).collect();
        rho.push_str(&line.join(" "));
        rho.push('\n');
    }
    for (path, contents) in [(correlations_path, correlations), (rho_path, rho)] {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| CvmError::io("ordered-mkdir", &err, parent))?;
        }
        fs::write(path, contents).map_err(|err| CvmError::io("ordered-write", &err, path))?;
    }
    Ok(())
}
