use std::path::{Path, PathBuf};
use std::process::Command;

use cvm_core::{CvmError, ErrorInfo};
use tracing::{info, warn};

/// Adapter around the `cvmclus` cluster-file generator.
#[derive(Debug, Clone)]
pub struct Cvmclus {
    executable: PathBuf,
}

impl Default for Cvmclus {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("cvmclus"),
        }
    }
}

impl Cvmclus {
    /// Overrides the executable location.
    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn arguments(&self, maxclus: &Path, lattice: &Path) -> Vec<String> {
        vec![
            format!("-m={}", maxclus.display()),
            format!("-l={}", lattice.display()),
        ]
    }

    /// Runs `cvmclus -m=<maxclus> -l=<lattice>` inside `workdir`.
    pub fn generate(&self, workdir: &Path, maxclus: &Path, lattice: &Path) -> Result<(), CvmError> {
        let args = self.arguments(maxclus, lattice);
        let command_line = format!("{} {}", self.executable.display(), args.join(" "));
        let output = Command::new(&self.executable)
            .args(&args)
            .current_dir(workdir)
            .output()
            .map_err(|err| {
                CvmError::StructureSamplingFailed(
                    ErrorInfo::new("cvmclus-spawn", err.to_string())
                        .with_context("command", command_line.clone()),
                )
            })?;
        if !output.status.success() {
            return Err(CvmError::StructureSamplingFailed(
                ErrorInfo::new(
                    "cvmclus-exit",
                    String::from_utf8_lossy(&output.stderr).trim().to_string(),
                )
                .with_context("command", command_line)
                .with_context("status", output.status.to_string()),
            ));
        }
        info!(command = %command_line, "generated cluster files");
        Ok(())
    }

    /// Same as [`Cvmclus::generate`] but logs failures instead of returning them.
    pub fn generate_or_warn(&self, workdir: &Path, maxclus: &Path, lattice: &Path) -> bool {
        match self.generate(workdir, maxclus, lattice) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "cvmclus failed, continuing with existing cluster files");
                false
            }
        }
    }
}
