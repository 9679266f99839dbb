use std::fs;
use std::path::Path;

use cvm_core::{CvmError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Outcome of a single trial of a global search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrialStatus {
    /// Became the new incumbent.
    Accepted,
    /// Converged but did not beat the incumbent or violated a constraint.
    Rejected,
    /// The local minimisation failed.
    Failed,
}

/// One row of the trial log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Temperature of the search.
    pub temperature: f64,
    /// Trial (or hop) index.
    pub trial: usize,
    /// Free energy of the start point.
    pub start_energy: f64,
    /// Free energy after local minimisation.
    pub local_energy: Option<f64>,
    /// Constraint violation after local minimisation.
    pub constraint_violation: Option<f64>,
    /// Whether the trial became the incumbent.
    pub accepted: bool,
    /// Trial outcome.
    pub status: TrialStatus,
    /// Solver status or failure message.
    pub message: String,
}

/// Aggregates over the trials of a log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    /// Number of trials recorded.
    pub trials: usize,
    /// Number of accepted trials.
    pub accepted: usize,
    /// Number of failed local minimisations.
    pub failed: usize,
    /// Accepted over recorded trials.
    pub acceptance_rate: f64,
    /// Mean free energy over converged trials.
    pub mean_local_energy: Option<f64>,
}

/// Collects trial records for CSV export.
#[derive(Debug, Default, Clone)]
pub struct TrialLog {
    records: Vec<TrialRecord>,
}

impl TrialLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn push(&mut self, record: TrialRecord) {
        self.records.push(record);
    }

    /// Recorded trials in order.
    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Summary over the recorded trials.
    pub fn summary(&self) -> TrialSummary {
        let trials = self.records.len();
        let accepted = self.records.iter().filter(|r| r.accepted).count();
        let failed = self
            .records
            .iter()
            .filter(|r| r.status == TrialStatus::Failed)
            .count();
        let energies: Vec<f64> = self.records.iter().filter_map(|r| r.local_energy).collect();
        let mean_local_energy = if energies.is_empty() {
            None
        } else {
            Some(energies.iter().sum::<f64>() / energies.len() as f64)
        };
        TrialSummary {
            trials,
            accepted,
            failed,
            acceptance_rate: if trials == 0 {
                0.0
            } else {
                accepted as f64 / trials as f64
            },
            mean_local_energy,
        }
    }

    /// Writes the records to a CSV file.
    pub fn write_csv(&self, path: &Path) -> Result<(), CvmError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| CvmError::io("trials-mkdir", &err, parent))?;
        }
        let mut writer = csv::Writer::from_path(path).map_err(|err| csv_error("trials-open", err, path))?;
        for record in &self.records {
            writer
                .serialize(record)
                .map_err(|err| csv_error("trials-write", err, path))?;
        }
        writer
            .flush()
            .map_err(|err| CvmError::io("trials-flush", &err, path))
    }

    /// Reads a log written by [`TrialLog::write_csv`].
    pub fn read_csv(path: &Path) -> Result<Self, CvmError> {
        let mut reader = csv::Reader::from_path(path).map_err(|err| csv_error("trials-open", err, path))?;
        let records = reader
            .deserialize()
            .collect::<Result<Vec<TrialRecord>, _>>()
            .map_err(|err| csv_error("trials-read", err, path))?;
        Ok(Self { records })
    }
}

pub(crate) fn csv_error(code: &str, err: csv::Error, path: &Path) -> CvmError {
    CvmError::Io(ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()))
}
