use std::fs;
use std::path::Path;

use cvm_core::{CvmError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::sweep::SweepRecord;
use crate::trials::csv_error;

/// Flat CSV row; correlations are space separated.
#[derive(Debug, Serialize, Deserialize)]
struct SweepRow {
    phase: String,
    structure: String,
    temperature: f64,
    f_sqs: Option<f64>,
    f_ordered: f64,
    f_disordered: f64,
    f_optimized: f64,
    constraint_violation: f64,
    correlations: String,
}

impl From<&SweepRecord> for SweepRow {
    fn from(record: &SweepRecord) -> Self {
        Self {
            phase: record.phase.clone(),
            structure: record.structure.clone(),
            temperature: record.temperature,
            f_sqs: record.f_sqs,
            f_ordered: record.f_ordered,
            f_disordered: record.f_disordered,
            f_optimized: record.f_optimized,
            constraint_violation: record.constraint_violation,
            correlations: record
                .correlations
                .iter()
                .map(|value| format!("{value:e}"))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl TryFrom<SweepRow> for SweepRecord {
    type Error = CvmError;

    fn try_from(row: SweepRow) -> Result<Self, Self::Error> {
        let correlations = row
            .correlations
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|err| {
                    CvmError::Parse(
                        ErrorInfo::new("results-correlations", err.to_string())
                            .with_context("temperature", row.temperature.to_string()),
                    )
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            phase: row.phase,
            structure: row.structure,
            temperature: row.temperature,
            f_sqs: row.f_sqs,
            f_ordered: row.f_ordered,
            f_disordered: row.f_disordered,
            f_optimized: row.f_optimized,
            constraint_violation: row.constraint_violation,
            correlations,
        })
    }
}

/// Writes the per-temperature table, replacing any previous file.
pub fn write_results_csv(path: &Path, records: &[SweepRecord]) -> Result<(), CvmError> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(|err| csv_error("results-open", err, path))?;
    for record in records {
        writer
            .serialize(SweepRow::from(record))
            .map_err(|err| csv_error("results-write", err, path))?;
    }
    writer
        .flush()
        .map_err(|err| CvmError::io("results-flush", &err, path))
}

/// Reads a table written by [`write_results_csv`].
pub fn read_results_csv(path: &Path) -> Result<Vec<SweepRecord>, CvmError> {
    let mut reader = csv::Reader::from_path(path).map_err(|err| match err.kind() {
        csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            CvmError::MissingInputFile(
                ErrorInfo::new("results-missing", "result table not found")
                    .with_context("path", path.display().to_string()),
            )
        }
        _ => csv_error("results-open", err, path),
    })?;
    reader
        .deserialize::<SweepRow>()
        .map(|row| {
            row.map_err(|err| csv_error("results-read", err, path))
                .and_then(SweepRecord::try_from)
        })
        .collect()
}

/// Writes the records as a JSON array.
pub fn write_results_json(path: &Path, records: &[SweepRecord]) -> Result<(), CvmError> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(records).map_err(|err| {
        CvmError::Io(
            ErrorInfo::new("results-serialize", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    fs::write(path, json).map_err(|err| CvmError::io("results-write", &err, path))
}

fn ensure_parent(path: &Path) -> Result<(), CvmError> {
    match path.parent() {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(|err| CvmError::io("results-mkdir", &err, parent))
        }
        None => Ok(()),
    }
}
