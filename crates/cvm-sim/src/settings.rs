use std::fs;
use std::path::{Path, PathBuf};

use cvm_cluster::ClusterFiles;
use cvm_core::{CvmError, ErrorInfo};
use cvm_fit::FitOptions;
use cvm_opt::RunConfig;
use serde::{Deserialize, Serialize};

/// Full configuration of a `cvm-sim` invocation.
///
/// Sweep and optimiser keys sit at the top level, the same layout a plain
/// [`RunConfig`] file uses, so either document loads here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(flatten)]
    pub run: RunConfig,
    #[serde(default)]
    pub files: ClusterFiles,
    #[serde(default)]
    pub fit: FitOptions,
    #[serde(default)]
    pub tools: ToolPaths,
}

/// External programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    #[serde(default = "default_corrdump")]
    pub corrdump: PathBuf,
    #[serde(default = "default_cvmclus")]
    pub cvmclus: PathBuf,
    /// Regenerate the cluster files before loading them.
    #[serde(default = "default_run_cvmclus")]
    pub run_cvmclus: bool,
}

fn default_corrdump() -> PathBuf {
    PathBuf::from("corrdump")
}

fn default_cvmclus() -> PathBuf {
    PathBuf::from("cvmclus")
}

fn default_run_cvmclus() -> bool {
    true
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            corrdump: default_corrdump(),
            cvmclus: default_cvmclus(),
            run_cvmclus: default_run_cvmclus(),
        }
    }
}

impl SimConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, CvmError> {
        serde_yaml::from_str(text)
            .map_err(|err| CvmError::Config(ErrorInfo::new("config-parse", err.to_string())))
    }

    pub fn load(path: &Path) -> Result<Self, CvmError> {
        let text = fs::read_to_string(path).map_err(|err| {
            CvmError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&text).map_err(|err| {
            CvmError::Config(err.info().clone().with_context("path", path.display().to_string()))
        })
    }
}
