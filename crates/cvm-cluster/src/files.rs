use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Names of the cluster-expansion files inside a structure directory.
///
/// Defaults follow the names written by `cvmclus` and used by `corrdump`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterFiles {
    /// Cluster description (`multiplicity`, `diameter`, `arity` blocks).
    #[serde(default = "default_clusters")]
    pub clusters: PathBuf,
    /// Effective cluster interactions.
    #[serde(default = "default_eci")]
    pub eci: PathBuf,
    /// Cluster multiplicities.
    #[serde(default = "default_cluster_multiplicities")]
    pub cluster_multiplicities: PathBuf,
    /// Configuration description, only used for cross-checking.
    #[serde(default = "default_configs")]
    pub configs: PathBuf,
    /// Configuration multiplicities.
    #[serde(default = "default_config_multiplicities")]
    pub config_multiplicities: PathBuf,
    /// Kikuchi-Barker coefficients.
    #[serde(default = "default_kikuchi_barker")]
    pub kikuchi_barker: PathBuf,
    /// Probability-mapping matrix blocks.
    #[serde(default = "default_vmatrix")]
    pub vmatrix: PathBuf,
    /// Maximal cluster geometry, read by `cvmclus` from the phase directory.
    #[serde(default = "default_maximal_clusters")]
    pub maximal_clusters: PathBuf,
    /// Lattice description.
    #[serde(default = "default_lattice")]
    pub lattice: PathBuf,
    /// Canonical input structure, also the template for random structures.
    #[serde(default = "default_structure")]
    pub structure: PathBuf,
    /// Relaxed special quasirandom structure.
    #[serde(default = "default_sqs_structure")]
    pub sqs_structure: PathBuf,
    /// Scratch file written by the structure sampler.
    #[serde(default = "default_random_structure")]
    pub random_structure: PathBuf,
}

fn default_clusters() -> PathBuf {
    PathBuf::from("clusters.out")
}

fn default_eci() -> PathBuf {
    PathBuf::from("eci.out")
}

fn default_cluster_multiplicities() -> PathBuf {
    PathBuf::from("clusmult.out")
}

fn default_configs() -> PathBuf {
    PathBuf::from("config.out")
}

fn default_config_multiplicities() -> PathBuf {
    PathBuf::from("configmult.out")
}

fn default_kikuchi_barker() -> PathBuf {
    PathBuf::from("configkb.out")
}

fn default_vmatrix() -> PathBuf {
    PathBuf::from("vmat.out")
}

fn default_maximal_clusters() -> PathBuf {
    PathBuf::from("maxclus.in")
}

fn default_lattice() -> PathBuf {
    PathBuf::from("lat.in")
}

fn default_structure() -> PathBuf {
    PathBuf::from("str.in")
}

fn default_sqs_structure() -> PathBuf {
    PathBuf::from("str_relax.out")
}

fn default_random_structure() -> PathBuf {
    PathBuf::from("randstr.in")
}

impl Default for ClusterFiles {
    fn default() -> Self {
        Self {
            clusters: default_clusters(),
            eci: default_eci(),
            cluster_multiplicities: default_cluster_multiplicities(),
            configs: default_configs(),
            config_multiplicities: default_config_multiplicities(),
            kikuchi_barker: default_kikuchi_barker(),
            vmatrix: default_vmatrix(),
            maximal_clusters: default_maximal_clusters(),
            lattice: default_lattice(),
            structure: default_structure(),
            sqs_structure: default_sqs_structure(),
            random_structure: default_random_structure(),
        }
    }
}

impl ClusterFiles {
    /// Resolves a file name against the structure directory.
    pub fn resolve(dir: &Path, name: &Path) -> PathBuf {
        if name.is_absolute() {
            name.to_path_buf()
        } else {
            dir.join(name)
        }
    }

    /// Path of the rescaled relaxed SQS written next to the relaxed structure.
    pub fn rescaled_sqs(&self, dir: &Path) -> PathBuf {
        let mut name = Self::resolve(dir, &self.sqs_structure).into_os_string();
        name.push("_temp");
        PathBuf::from(name)
    }
}
