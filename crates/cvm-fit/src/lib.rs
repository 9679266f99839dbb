#![deny(missing_docs)]

//! Fit of the short-range-order correction `F_opt − F_rnd` as a closed-form
//! function of temperature.

/// Fit data prepared from sweep records.
pub mod data;
/// TDB-style expression rendering.
pub mod expression;
/// Fit options, results and the fit entry point.
pub mod fit;
/// Levenberg–Marquardt least squares.
pub mod lm;
/// Correction model families.
pub mod model;
/// Coefficient, table and `func` files.
pub mod outputs;

pub use data::FitData;
pub use fit::{fit_correction, FitOptions, FitResult};
pub use lm::{levenberg_marquardt, LeastSquares, LmOptions, LmSolution};
pub use model::CorrectionModel;
pub use outputs::{read_coefficients, write_coefficients, write_fit_outputs, FitOutputs};
