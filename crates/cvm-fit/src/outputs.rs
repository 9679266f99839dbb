use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use cvm_core::{CvmError, ErrorInfo};
use nalgebra::DVector;
use tracing::info;

use crate::data::FitData;
use crate::fit::{FitOptions, FitResult};
use crate::model::CorrectionModel;

/// Writes the coefficient file: the symbolic form on the first line, then
/// one `name=value` line per coefficient.
pub fn write_coefficients(path: &Path, result: &FitResult) -> Result<(), CvmError> {
    let mut text = format!("{}\n", result.model.template());
    for (name, value) in result
        .model
        .parameter_names()
        .iter()
        .zip(result.parameters.iter())
    {
        text.push_str(&format!("{name}={value}\n"));
    }
    write_text(path, &text)
}

/// Reads initial coefficients for `model`.
///
/// Accepts the format of [`write_coefficients`] as well as bare numbers
/// separated by whitespace. Returns `Ok(None)` when the file is absent.
pub fn read_coefficients(
    path: &Path,
    model: &CorrectionModel,
) -> Result<Option<DVector<f64>>, CvmError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no initial coefficients, using defaults");
            return Ok(None);
        }
        Err(err) => return Err(CvmError::io("coeff-read", &err, path)),
    };

    let mut named = BTreeMap::new();
    let mut bare = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if let Some((name, value)) = line.split_once('=') {
            named.insert(name.trim().to_string(), parse_coefficient(value, path, lineno)?);
        } else {
            let values: Result<Vec<f64>, _> =
                line.split_whitespace().map(str::parse::<f64>).collect();
            // the symbolic first line is not numeric and is skipped
            if let Ok(values) = values {
                bare.extend(values);
            }
        }
    }

    let names = model.parameter_names();
    let values = if named.is_empty() {
        bare
    } else {
        names
            .iter()
            .map(|name| {
                named.get(name).copied().ok_or_else(|| {
                    CvmError::Parse(
                        ErrorInfo::new("coeff-missing", format!("coefficient {name} not found"))
                            .with_context("path", path.display().to_string()),
                    )
                })
            })
            .collect::<Result<Vec<f64>, _>>()?
    };
    if values.len() != names.len() {
        return Err(CvmError::Parse(
            ErrorInfo::new("coeff-count", "wrong number of coefficients")
                .with_context("path", path.display().to_string())
                .with_context("expected", names.len().to_string())
                .with_context("found", values.len().to_string()),
        ));
    }
    Ok(Some(DVector::from_vec(values)))
}

fn parse_coefficient(value: &str, path: &Path, lineno: usize) -> Result<f64, CvmError> {
    value.trim().parse::<f64>().map_err(|err| {
        CvmError::Parse(
            ErrorInfo::new("coeff-parse", err.to_string())
                .with_context("path", path.display().to_string())
                .with_context("line", (lineno + 1).to_string()),
        )
    })
}

/// Writes `(x, y)` pairs as two space-separated columns.
pub fn write_table(path: &Path, points: &[(f64, f64)]) -> Result<(), CvmError> {
    let mut text = String::new();
    for (x, y) in points {
        text.push_str(&format!("{x:.18e} {y:.18e}\n"));
    }
    write_text(path, &text)
}

/// Files written by [`write_fit_outputs`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutputs {
    /// Coefficient file.
    pub coefficients: PathBuf,
    /// Fitted data points.
    pub data: PathBuf,
    /// Sampled prediction.
    pub prediction: PathBuf,
    /// Expanded closed form.
    pub func: PathBuf,
}

/// Writes the coefficients, data, prediction and `func` files under `root`.
pub fn write_fit_outputs(
    root: &Path,
    result: &FitResult,
    data: &FitData,
    options: &FitOptions,
) -> Result<FitOutputs, CvmError> {
    let outputs = FitOutputs {
        coefficients: root.join(&options.coeff_out),
        data: root.join(&options.data_file),
        prediction: root.join(&options.prediction_file),
        func: root.join(&options.func_file),
    };
    let (tmin, tmax) = data.range();
    write_coefficients(&outputs.coefficients, result)?;
    write_table(&outputs.data, &data.points())?;
    write_table(
        &outputs.prediction,
        &result.sample(tmin, tmax, options.samples),
    )?;
    let expression = result.expression();
    write_text(&outputs.func, &expression)?;
    info!(func = %outputs.func.display(), %expression, "SRO correction written");
    Ok(outputs)
}

fn write_text(path: &Path, text: &str) -> Result<(), CvmError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| CvmError::io("fit-mkdir", &err, parent))?;
    }
    fs::write(path, text).map_err(|err| CvmError::io("fit-write", &err, path))
}
