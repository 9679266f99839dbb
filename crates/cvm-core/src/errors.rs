//! Structured error types shared across the CVM crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Diagnostic payload carried by every [`CvmError`].
///
/// `code` is stable and meant for matching in tests and scripts; `context`
/// names the file, command, trial or temperature involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Short kebab-case identifier, e.g. `vmat-shape`.
    pub code: String,
    /// What went wrong.
    pub message: String,
    /// Paths, commands and indices involved.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Suggested fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload without context or hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds (or replaces) a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches a suggested fix.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the SRO correction engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum CvmError {
    /// A required cluster-expansion input file is absent.
    #[error("missing input file: {0}")]
    MissingInputFile(ErrorInfo),
    /// An input file exists but could not be parsed.
    #[error("parse error: {0}")]
    Parse(ErrorInfo),
    /// The cluster model is internally inconsistent.
    #[error("model error: {0}")]
    Model(ErrorInfo),
    /// The zero temperature linear program has no usable solution.
    #[error("ordered state infeasible: {0}")]
    OrderedStateInfeasible(ErrorInfo),
    /// A single constrained local minimisation did not converge.
    #[error("local optimisation failure: {0}")]
    LocalOptimizationFailure(ErrorInfo),
    /// The external correlation tool failed or produced unusable output.
    #[error("structure sampling failed: {0}")]
    StructureSamplingFailed(ErrorInfo),
    /// The best result still violates feasibility beyond tolerance.
    #[error("constraint violation exceeded: {0}")]
    ConstraintViolationExceeded(ErrorInfo),
    /// Fitting the temperature dependent correction failed.
    #[error("fit error: {0}")]
    Fit(ErrorInfo),
    /// Invalid configuration values.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Output persistence and serialization errors.
    #[error("io error: {0}")]
    Io(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            write!(f, " ({})", pairs.join(", "))?;
        }
        match &self.hint {
            Some(hint) => write!(f, "; hint: {hint}"),
            None => Ok(()),
        }
    }
}

impl CvmError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            CvmError::MissingInputFile(info)
            | CvmError::Parse(info)
            | CvmError::Model(info)
            | CvmError::OrderedStateInfeasible(info)
            | CvmError::LocalOptimizationFailure(info)
            | CvmError::StructureSamplingFailed(info)
            | CvmError::ConstraintViolationExceeded(info)
            | CvmError::Fit(info)
            | CvmError::Config(info)
            | CvmError::Io(info) => info,
        }
    }

    /// Whether the error aborts a run or is recovered where it happens.
    ///
    /// Local optimisation failures reject a single trial and constraint
    /// violations are reported on the output record.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CvmError::LocalOptimizationFailure(_) | CvmError::ConstraintViolationExceeded(_)
        )
    }

    /// Wraps a filesystem error for the given path.
    pub fn io(code: &str, err: &std::io::Error, path: &std::path::Path) -> Self {
        CvmError::Io(
            ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
        )
    }
}
