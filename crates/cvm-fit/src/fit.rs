use std::path::PathBuf;

use cvm_core::{CvmError, ErrorInfo};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::{FitData, ModelProblem};
use crate::lm::{levenberg_marquardt, LmOptions};
use crate::model::CorrectionModel;

/// Settings of the SRO correction fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Fitted closed form.
    #[serde(default)]
    pub model: CorrectionModel,
    /// Report corrections in J/mol instead of eV.
    #[serde(default)]
    pub in_joules: bool,
    /// Solver settings.
    #[serde(default)]
    pub solver: LmOptions,
    /// Initial coefficients, read when present.
    #[serde(default = "default_coeff_in")]
    pub coeff_in: PathBuf,
    /// Fitted coefficients.
    #[serde(default = "default_coeff_out")]
    pub coeff_out: PathBuf,
    /// Fitted data points.
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    /// Sampled prediction of the fitted model.
    #[serde(default = "default_prediction_file")]
    pub prediction_file: PathBuf,
    /// Expanded closed form of the fitted model.
    #[serde(default = "default_func_file")]
    pub func_file: PathBuf,
    /// Points in the sampled prediction.
    #[serde(default = "default_samples")]
    pub samples: usize,
}

fn default_coeff_in() -> PathBuf {
    PathBuf::from("sro_coeffs.in")
}

fn default_coeff_out() -> PathBuf {
    PathBuf::from("sro_coeffs.out")
}

fn default_data_file() -> PathBuf {
    PathBuf::from("sro_correction_data.out")
}

fn default_prediction_file() -> PathBuf {
    PathBuf::from("sro_correction_predicted.out")
}

fn default_func_file() -> PathBuf {
    PathBuf::from("func")
}

fn default_samples() -> usize {
    1000
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            model: CorrectionModel::default(),
            in_joules: false,
            solver: LmOptions::default(),
            coeff_in: default_coeff_in(),
            coeff_out: default_coeff_out(),
            data_file: default_data_file(),
            prediction_file: default_prediction_file(),
            func_file: default_func_file(),
            samples: default_samples(),
        }
    }
}

/// Fitted correction model.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// Fitted closed form.
    pub model: CorrectionModel,
    /// Best-fit coefficients.
    pub parameters: DVector<f64>,
    /// Coefficient covariance, when available.
    pub covariance: Option<DMatrix<f64>>,
    /// Sum of squared residuals.
    pub residual_sum: f64,
    /// Residual evaluations used.
    pub evaluations: usize,
}

impl FitResult {
    /// Fitted correction at `temperature`.
    pub fn predict(&self, temperature: f64) -> f64 {
        self.model.evaluate(temperature, &self.parameters)
    }

    /// `count` evenly spaced predictions over `[tmin, tmax]`.
    pub fn sample(&self, tmin: f64, tmax: f64, count: usize) -> Vec<(f64, f64)> {
        match count {
            0 => Vec::new(),
            1 => vec![(tmin, self.predict(tmin))],
            _ => {
                let step = (tmax - tmin) / (count - 1) as f64;
                (0..count)
                    .map(|k| {
                        let t = if k + 1 == count { tmax } else { tmin + k as f64 * step };
                        (t, self.predict(t))
                    })
                    .collect()
            }
        }
    }

    /// Expanded closed form with the fitted coefficients.
    pub fn expression(&self) -> String {
        self.model.expression(&self.parameters)
    }

    /// One-standard-deviation uncertainty of each coefficient.
    pub fn standard_errors(&self) -> Option<DVector<f64>> {
        self.covariance
            .as_ref()
            .map(|cov| cov.diagonal().map(|v| v.max(0.0).sqrt()))
    }
}

/// Fits `options.model` to `data`, starting from `initial` or the model's
/// default coefficients.
pub fn fit_correction(
    data: &FitData,
    options: &FitOptions,
    initial: Option<DVector<f64>>,
) -> Result<FitResult, CvmError> {
    let model = &options.model;
    let start = initial.unwrap_or_else(|| model.default_parameters());
    if start.len() != model.num_parameters() {
        return Err(CvmError::Fit(
            ErrorInfo::new("coeff-count", "initial coefficients do not match the model")
                .with_context("expected", model.num_parameters().to_string())
                .with_context("found", start.len().to_string()),
        ));
    }
    let problem = ModelProblem { model, data };
    let solution = levenberg_marquardt(&problem, start, &options.solver)?;
    info!(
        model = %model.template(),
        parameters = ?solution.params.as_slice(),
        residual_sum = solution.cost,
        evaluations = solution.evaluations,
        "SRO correction fitted"
    );
    Ok(FitResult {
        model: model.clone(),
        parameters: solution.params,
        covariance: solution.covariance,
        residual_sum: solution.cost,
        evaluations: solution.evaluations,
    })
}
