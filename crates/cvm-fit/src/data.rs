use cvm_core::{CvmError, ErrorInfo, EV_TO_J_PER_MOL};
use cvm_opt::SweepRecord;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::lm::LeastSquares;
use crate::model::CorrectionModel;

/// Correction data `(T, (F_opt − F_rnd)·num_str_atoms)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitData {
    /// Temperatures in kelvin, never zero.
    pub temperatures: Vec<f64>,
    /// Correction at each temperature.
    pub corrections: Vec<f64>,
}

impl FitData {
    /// Builds the fit data from sweep records. Zero-temperature rows are
    /// skipped; `in_joules` converts eV to J/mol.
    pub fn from_records(
        records: &[SweepRecord],
        num_structure_atoms: usize,
        in_joules: bool,
    ) -> Result<Self, CvmError> {
        let unit = if in_joules { EV_TO_J_PER_MOL } else { 1.0 };
        let scale = num_structure_atoms as f64 * unit;
        let (temperatures, corrections): (Vec<f64>, Vec<f64>) = records
            .iter()
            .filter(|record| record.temperature != 0.0)
            .map(|record| {
                (
                    record.temperature,
                    (record.f_optimized - record.f_disordered) * scale,
                )
            })
            .unzip();
        if temperatures.is_empty() {
            return Err(CvmError::Fit(
                ErrorInfo::new("fit-no-data", "no non-zero temperature in the results")
                    .with_context("records", records.len().to_string()),
            ));
        }
        Ok(Self {
            temperatures,
            corrections,
        })
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.temperatures.len()
    }

    /// Whether there are no points.
    pub fn is_empty(&self) -> bool {
        self.temperatures.is_empty()
    }

    /// Lowest and highest temperature.
    pub fn range(&self) -> (f64, f64) {
        self.temperatures
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| {
                (lo.min(t), hi.max(t))
            })
    }

    /// Point pairs `(T, correction)`.
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.temperatures
            .iter()
            .copied()
            .zip(self.corrections.iter().copied())
            .collect()
    }
}

/// [`FitData`] seen through a [`CorrectionModel`].
pub(crate) struct ModelProblem<'a> {
    pub(crate) model: &'a CorrectionModel,
    pub(crate) data: &'a FitData,
}

impl LeastSquares for ModelProblem<'_> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn predict(&self, i: usize, params: &DVector<f64>) -> f64 {
        self.model.evaluate(self.data.temperatures[i], params)
    }

    fn jacobian_row(&self, i: usize, params: &DVector<f64>) -> DVector<f64> {
        self.model.gradient(self.data.temperatures[i], params)
    }

    fn observed(&self, i: usize) -> f64 {
        self.data.corrections[i]
    }
}
