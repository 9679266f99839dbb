use std::path::{Path, PathBuf};
use std::process::Command;

use cvm_core::{CvmError, ErrorInfo};
use nalgebra::DVector;
use tracing::debug;

/// Which correlations the tool should report for a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationMode {
    /// Correlations of the structure as given.
    Structure,
    /// Correlations of the fully disordered state at the structure's composition.
    Disordered,
}

/// Computes the correlation vector of a structure file.
///
/// Implementations may spawn processes and read files; every failure is
/// reported as [`CvmError::StructureSamplingFailed`].
pub trait CorrelationTool {
    /// Returns the correlation vector of the structure stored at `structure`.
    fn correlations(&self, structure: &Path, mode: CorrelationMode)
        -> Result<DVector<f64>, CvmError>;
}

/// Adapter around the external `corrdump` executable.
#[derive(Debug, Clone)]
pub struct Corrdump {
    executable: PathBuf,
    clusters: PathBuf,
    lattice: PathBuf,
}

impl Corrdump {
    /// Creates an adapter using `corrdump` from `PATH`.
    pub fn new(clusters: impl Into<PathBuf>, lattice: impl Into<PathBuf>) -> Self {
        Self {
            executable: PathBuf::from("corrdump"),
            clusters: clusters.into(),
            lattice: lattice.into(),
        }
    }

    /// Overrides the executable location.
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    fn arguments(&self, structure: &Path, mode: CorrelationMode) -> Vec<String> {
        let mut args = vec![
            "-c".to_string(),
            format!("-cf={}", self.clusters.display()),
            format!("-s={}", structure.display()),
            format!("-l={}", self.lattice.display()),
        ];
        if mode == CorrelationMode::Disordered {
            args.push("-rnd".to_string());
        }
        args
    }
}

impl CorrelationTool for Corrdump {
    fn correlations(
        &self,
        structure: &Path,
        mode: CorrelationMode,
    ) -> Result<DVector<f64>, CvmError> {
        let args = self.arguments(structure, mode);
        let command_line = format!("{} {}", self.executable.display(), args.join(" "));
        debug!(command = %command_line, "computing correlations");
        let output = Command::new(&self.executable)
            .args(&args)
            .output()
            .map_err(|err| {
                CvmError::StructureSamplingFailed(
                    ErrorInfo::new("corrdump-spawn", err.to_string())
                        .with_context("command", command_line.clone())
                        .with_hint("make sure the ATAT tools are on PATH"),
                )
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CvmError::StructureSamplingFailed(
                ErrorInfo::new("corrdump-exit", stderr.trim().to_string())
                    .with_context("command", command_line)
                    .with_context("status", output.status.to_string()),
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_correlation_output(&stdout).map_err(|err| {
            CvmError::StructureSamplingFailed(err.info().clone().with_context("command", command_line))
        })
    }
}

/// Parses the tab separated correlations printed by `corrdump`.
pub fn parse_correlation_output(text: &str) -> Result<DVector<f64>, CvmError> {
    let values: Vec<f64> = text
        .split(['\t', '\n'])
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<f64>().map_err(|err| {
                CvmError::StructureSamplingFailed(ErrorInfo::new(
                    "corrdump-output",
                    format!("`{token}`: {err}"),
                ))
            })
        })
        .collect::<Result<_, _>>()?;
    if values.is_empty() {
        return Err(CvmError::StructureSamplingFailed(ErrorInfo::new(
            "corrdump-output",
            "no correlations in output",
        )));
    }
    Ok(DVector::from_vec(values))
}
