//! Schema versions and run provenance stored in manifests.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// `major.minor.patch` version of a persisted format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Changes when older readers can no longer load the format.
    pub major: u32,
    /// Changes when fields are added.
    pub minor: u32,
    /// Changes for fixes that leave the layout alone.
    pub patch: u32,
}

impl SchemaVersion {
    /// Builds a version.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether a reader of `self` can load data written as `other`.
    pub fn reads(&self, other: &SchemaVersion) -> bool {
        self.major == other.major && self.minor >= other.minor
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Where a sweep came from: input files, labels, seed and tool versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunProvenance {
    /// SHA-256 over the cluster-expansion input files.
    pub input_hash: String,
    /// Phase directory name (parent of the structure directory).
    pub phase: String,
    /// Structure directory name.
    pub structure: String,
    /// Master seed of the run.
    pub seed: u64,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Crate name to version.
    #[serde(default)]
    pub tool_versions: BTreeMap<String, String>,
}

impl RunProvenance {
    /// Records the version of a tool that took part in the run.
    pub fn with_tool(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.tool_versions.insert(name.into(), version.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_minor_versions_read_older_data() {
        let reader = SchemaVersion::new(1, 2, 0);
        assert!(reader.reads(&SchemaVersion::new(1, 0, 3)));
        assert!(!reader.reads(&SchemaVersion::new(1, 3, 0)));
        assert!(!reader.reads(&SchemaVersion::new(2, 0, 0)));
        assert_eq!(reader.to_string(), "1.2.0");
    }

    #[test]
    fn tools_accumulate() {
        let provenance = RunProvenance::default()
            .with_tool("cvm-opt", "0.1.0")
            .with_tool("cvm-sim", "0.2.0");
        assert_eq!(provenance.tool_versions.len(), 2);
        assert_eq!(provenance.tool_versions["cvm-sim"], "0.2.0");
    }
}
