use std::fs;
use std::path::{Path, PathBuf};

use cvm_cluster::{ClusterModel, EciSource};
use cvm_core::errors::ErrorInfo;
use cvm_core::{CvmError, RunProvenance, SchemaVersion};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;

/// Schema of [`RunManifest`].
pub const MANIFEST_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Structured manifest describing a completed or running sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Manifest schema.
    pub schema: SchemaVersion,
    /// Configuration used for the run.
    pub config: RunConfig,
    /// Inputs, seed and tool versions.
    pub provenance: RunProvenance,
    /// Whether the interactions were read or substituted.
    pub eci_source: EciSource,
    /// Ordered ground-state correlations.
    pub ordered_correlations: Vec<f64>,
    /// Temperatures completed so far.
    pub temperatures: Vec<f64>,
    /// Result table (relative to the output directory).
    pub results_file: PathBuf,
    /// Trial logs written during the run.
    pub trial_logs: Vec<PathBuf>,
}

impl RunManifest {
    /// Starts a manifest for `model` before any temperature has run.
    pub fn new(model: &ClusterModel, config: &RunConfig) -> Self {
        let provenance = RunProvenance {
            input_hash: model.input_hash().to_string(),
            phase: model.phase().to_string(),
            structure: model.structure().to_string(),
            seed: config.seed_policy.master_seed,
            created_at: chrono::Utc::now().to_rfc3339(),
            ..RunProvenance::default()
        }
        .with_tool("cvm-opt", env!("CARGO_PKG_VERSION"));
        Self {
            schema: MANIFEST_SCHEMA,
            config: config.clone(),
            provenance,
            eci_source: model.eci_source(),
            ordered_correlations: model
                .ordered_correlations()
                .map(|x| x.iter().copied().collect())
                .unwrap_or_default(),
            temperatures: Vec::new(),
            results_file: config.output.results_file.clone(),
            trial_logs: Vec::new(),
        }
    }

    /// Writes the manifest as pretty-printed JSON, creating parent
    /// directories.
    pub fn write(&self, path: &Path) -> Result<(), CvmError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| CvmError::io("manifest-mkdir", &err, parent))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            CvmError::Io(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| CvmError::io("manifest-write", &err, path))
    }

    /// Loads a manifest from disk, refusing schemas this build cannot read.
    pub fn load(path: &Path) -> Result<Self, CvmError> {
        let contents =
            fs::read_to_string(path).map_err(|err| CvmError::io("manifest-read", &err, path))?;
        let manifest: Self = serde_json::from_str(&contents).map_err(|err| {
            CvmError::Parse(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        if !MANIFEST_SCHEMA.reads(&manifest.schema) {
            return Err(CvmError::Parse(
                ErrorInfo::new("manifest-schema", "unsupported manifest schema")
                    .with_context("path", path.display().to_string())
                    .with_context("found", manifest.schema.to_string())
                    .with_context("supported", MANIFEST_SCHEMA.to_string()),
            ));
        }
        Ok(manifest)
    }
}
