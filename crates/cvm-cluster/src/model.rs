use std::fmt;
use std::path::Path;

use cvm_core::{CvmError, ErrorInfo, PROBABILITY_EPSILON};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::corrdump::{CorrelationMode, CorrelationTool};
use crate::files::ClusterFiles;
use crate::hash::hash_inputs;
use crate::io::{
    parse_clusters, parse_column, parse_config_multiplicities, parse_configs, parse_vmatrix,
    read_optional, read_required, with_path, ClusterInfo,
};
use crate::structure::AtomicStructure;

/// Where the effective cluster interactions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EciSource {
    /// Read from `eci.out`.
    File,
    /// `eci.out` was absent and zero interactions were substituted.
    Created,
}

/// Raw contents of the cluster-expansion files of one structure directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterExpansion {
    /// Cluster records in index order.
    pub clusters: Vec<ClusterInfo>,
    /// Effective cluster interactions, `None` when `eci.out` is absent.
    pub eci: Option<Vec<f64>>,
    /// Cluster multiplicities from `clusmult.out`.
    pub cluster_multiplicities: Vec<f64>,
    /// Sub-configuration multiplicities per configuration block.
    pub config_multiplicities: Vec<Vec<f64>>,
    /// Kikuchi-Barker coefficient per configuration block.
    pub kikuchi_barker: Vec<f64>,
    /// Probability-mapping matrix per configuration block.
    pub vmatrix: Vec<DMatrix<f64>>,
    /// Sub-cluster counts from `config.out`, when present.
    pub subcluster_counts: Option<Vec<usize>>,
    /// Hash over every file that was read.
    pub input_hash: String,
}

impl ClusterExpansion {
    /// Reads and parses the cluster-expansion files in `dir`.
    pub fn read(dir: &Path, files: &ClusterFiles) -> Result<Self, CvmError> {
        let required = |name: &Path| {
            let path = ClusterFiles::resolve(dir, name);
            read_required(&path).map(|text| (path, text))
        };
        let (clusters_path, clusters_text) = required(&files.clusters)?;
        let (clusmult_path, clusmult_text) = required(&files.cluster_multiplicities)?;
        let (configmult_path, configmult_text) = required(&files.config_multiplicities)?;
        let (kb_path, kb_text) = required(&files.kikuchi_barker)?;
        let (vmat_path, vmat_text) = required(&files.vmatrix)?;

        let eci_path = ClusterFiles::resolve(dir, &files.eci);
        let eci_text = read_optional(&eci_path)?;
        let configs_path = ClusterFiles::resolve(dir, &files.configs);
        let configs_text = read_optional(&configs_path)?;

        let mut hashed = vec![
            ("clusters", clusters_text.as_str()),
            ("clusmult", clusmult_text.as_str()),
            ("configmult", configmult_text.as_str()),
            ("configkb", kb_text.as_str()),
            ("vmat", vmat_text.as_str()),
        ];
        if let Some(text) = &eci_text {
            hashed.push(("eci", text.as_str()));
        }

        Ok(Self {
            clusters: with_path(parse_clusters(&clusters_text), &clusters_path)?,
            eci: eci_text
                .as_deref()
                .map(|text| with_path(parse_column(text), &eci_path))
                .transpose()?,
            cluster_multiplicities: with_path(parse_column(&clusmult_text), &clusmult_path)?,
            config_multiplicities: with_path(
                parse_config_multiplicities(&configmult_text),
                &configmult_path,
            )?,
            kikuchi_barker: with_path(parse_column(&kb_text), &kb_path)?,
            vmatrix: with_path(parse_vmatrix(&vmat_text), &vmat_path)?,
            subcluster_counts: configs_text
                .as_deref()
                .map(|text| with_path(parse_configs(text), &configs_path))
                .transpose()?,
            input_hash: hash_inputs(hashed),
        })
    }
}

/// Reference correlation vectors computed once when the model is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceStates {
    /// Fully disordered state at the structure's composition.
    pub disordered: DVector<f64>,
    /// Relaxed special quasirandom structure, when one exists.
    pub sqs: Option<DVector<f64>>,
}

/// Immutable view of a cluster expansion plus its derived quantities.
///
/// Only the ordered correlations change after construction, and only once.
#[derive(Debug, Clone)]
pub struct ClusterModel {
    clusters: Vec<ClusterInfo>,
    eci: DVector<f64>,
    eci_source: EciSource,
    cluster_multiplicities: DVector<f64>,
    mults_eci: DVector<f64>,
    config_multiplicities: Vec<Vec<f64>>,
    kikuchi_barker: Vec<f64>,
    config_weights: DVector<f64>,
    block_offsets: Vec<usize>,
    vmatrix: DMatrix<f64>,
    disordered: DVector<f64>,
    sqs: Option<DVector<f64>>,
    ordered: Option<DVector<f64>>,
    num_lattice_atoms: usize,
    num_structure_atoms: usize,
    phase: String,
    structure: String,
    input_hash: String,
}

impl ClusterModel {
    /// Validates the expansion against the reference states and derives the
    /// functional inputs.
    pub fn new(expansion: ClusterExpansion, references: ReferenceStates) -> Result<Self, CvmError> {
        let ClusterExpansion {
            clusters,
            eci,
            cluster_multiplicities,
            config_multiplicities,
            kikuchi_barker,
            vmatrix,
            subcluster_counts,
            input_hash,
        } = expansion;
        let num_clusters = clusters.len();

        check_len("clusmult", cluster_multiplicities.len(), num_clusters)?;
        for (idx, (info, mult)) in clusters.iter().zip(&cluster_multiplicities).enumerate() {
            if (f64::from(info.multiplicity) - mult).abs() > 1e-9 {
                warn!(
                    cluster = idx,
                    clusters_out = info.multiplicity,
                    clusmult_out = mult,
                    "cluster multiplicities disagree between files"
                );
            }
        }

        let (eci, eci_source) = match eci {
            Some(values) => {
                check_len("eci", values.len(), num_clusters)?;
                (DVector::from_vec(values), EciSource::File)
            }
            None => {
                warn!("eci.out not found, using zero interactions");
                (DVector::zeros(num_clusters), EciSource::Created)
            }
        };

        check_len("configkb", kikuchi_barker.len(), config_multiplicities.len())?;
        check_len("vmat blocks", vmatrix.len(), config_multiplicities.len())?;
        if let Some(counts) = &subcluster_counts {
            let declared: Vec<usize> = config_multiplicities.iter().map(Vec::len).collect();
            if counts != &declared {
                return Err(CvmError::Model(
                    ErrorInfo::new(
                        "config-mismatch",
                        "config.out sub-cluster counts disagree with configmult.out",
                    )
                    .with_context("config.out", format!("{counts:?}"))
                    .with_context("configmult.out", format!("{declared:?}")),
                ));
            }
        }

        let mut block_offsets = Vec::with_capacity(vmatrix.len() + 1);
        let mut total_rows = 0usize;
        for (idx, (block, mults)) in vmatrix.iter().zip(&config_multiplicities).enumerate() {
            if block.nrows() != mults.len() || block.ncols() != num_clusters {
                return Err(CvmError::Model(
                    ErrorInfo::new(
                        "vmat-shape",
                        format!(
                            "block is {}x{}, expected {}x{num_clusters}",
                            block.nrows(),
                            block.ncols(),
                            mults.len()
                        ),
                    )
                    .with_context("block", idx.to_string()),
                ));
            }
            block_offsets.push(total_rows);
            total_rows += block.nrows();
        }
        block_offsets.push(total_rows);

        let mut stacked = DMatrix::zeros(total_rows, num_clusters);
        let mut weights = Vec::with_capacity(total_rows);
        for ((block, mults), (&kb, &offset)) in vmatrix
            .iter()
            .zip(&config_multiplicities)
            .zip(kikuchi_barker.iter().zip(&block_offsets))
        {
            for row in 0..block.nrows() {
                for col in 0..num_clusters {
                    stacked[(offset + row, col)] = block[(row, col)];
                }
            }
            weights.extend(mults.iter().map(|m| m * kb));
        }

        check_len("disordered correlations", references.disordered.len(), num_clusters)?;
        if let Some(sqs) = &references.sqs {
            check_len("sqs correlations", sqs.len(), num_clusters)?;
        }

        let cluster_multiplicities = DVector::from_vec(cluster_multiplicities);
        let mults_eci = cluster_multiplicities.component_mul(&eci);

        Ok(Self {
            clusters,
            eci,
            eci_source,
            cluster_multiplicities,
            mults_eci,
            config_multiplicities,
            kikuchi_barker,
            config_weights: DVector::from_vec(weights),
            block_offsets,
            vmatrix: stacked,
            disordered: references.disordered,
            sqs: references.sqs,
            ordered: None,
            num_lattice_atoms: 1,
            num_structure_atoms: 1,
            phase: String::new(),
            structure: String::new(),
            input_hash,
        })
    }

    /// Builds the model for the structure directory `dir`.
    ///
    /// Reads the cluster files, asks `tool` for the disordered correlations of
    /// the input structure and, when a relaxed SQS exists, rescales it onto the
    /// input cell and computes its correlations.
    pub fn load(
        dir: &Path,
        files: &ClusterFiles,
        tool: &dyn CorrelationTool,
    ) -> Result<Self, CvmError> {
        let expansion = ClusterExpansion::read(dir, files)?;
        let structure_path = ClusterFiles::resolve(dir, &files.structure);
        let input_structure = AtomicStructure::read(&structure_path)?;
        let lattice = AtomicStructure::read(&ClusterFiles::resolve(dir, &files.lattice))?;

        let disordered = tool.correlations(&structure_path, CorrelationMode::Disordered)?;

        let sqs_path = ClusterFiles::resolve(dir, &files.sqs_structure);
        let sqs = if sqs_path.exists() {
            let relaxed = AtomicStructure::read(&sqs_path)?;
            let rescaled_path = files.rescaled_sqs(dir);
            relaxed.with_header_of(&input_structure).write(&rescaled_path)?;
            Some(tool.correlations(&rescaled_path, CorrelationMode::Structure)?)
        } else {
            info!(path = %sqs_path.display(), "no relaxed SQS, skipping SQS reference");
            None
        };

        let model = Self::new(expansion, ReferenceStates { disordered, sqs })?
            .with_site_counts(lattice.num_sites(), input_structure.num_sites())
            .with_labels(directory_name(dir.parent()), directory_name(Some(dir)));
        info!(
            phase = %model.phase,
            structure = %model.structure,
            clusters = model.num_clusters(),
            configurations = model.num_configurations(),
            "cluster model loaded"
        );
        Ok(model)
    }

    /// Sets the lattice and structure site counts.
    pub fn with_site_counts(mut self, lattice: usize, structure: usize) -> Self {
        self.num_lattice_atoms = lattice;
        self.num_structure_atoms = structure;
        self
    }

    /// Sets the phase and structure labels used in output records.
    pub fn with_labels(mut self, phase: impl Into<String>, structure: impl Into<String>) -> Self {
        self.phase = phase.into();
        self.structure = structure.into();
        self
    }

    /// Number of clusters (length of every correlation vector).
    pub fn num_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Number of configuration blocks.
    pub fn num_configurations(&self) -> usize {
        self.config_multiplicities.len()
    }

    /// Total number of sub-configurations (rows of `V`).
    pub fn num_subconfigurations(&self) -> usize {
        self.vmatrix.nrows()
    }

    /// Cluster records.
    pub fn clusters(&self) -> &[ClusterInfo] {
        &self.clusters
    }

    /// Effective cluster interactions.
    pub fn eci(&self) -> &DVector<f64> {
        &self.eci
    }

    /// Whether the interactions were read or substituted.
    pub fn eci_source(&self) -> EciSource {
        self.eci_source
    }

    /// Cluster multiplicities.
    pub fn cluster_multiplicities(&self) -> &DVector<f64> {
        &self.cluster_multiplicities
    }

    /// Element-wise product of multiplicities and interactions.
    pub fn mults_eci(&self) -> &DVector<f64> {
        &self.mults_eci
    }

    /// Configuration multiplicities weighted by the Kikuchi-Barker coefficient
    /// of their block.
    pub fn config_weights(&self) -> &DVector<f64> {
        &self.config_weights
    }

    /// Kikuchi-Barker coefficient per block.
    pub fn kikuchi_barker(&self) -> &[f64] {
        &self.kikuchi_barker
    }

    /// Stacked probability-mapping matrix `V`.
    pub fn vmatrix(&self) -> &DMatrix<f64> {
        &self.vmatrix
    }

    /// Disordered reference correlations.
    pub fn disordered_correlations(&self) -> &DVector<f64> {
        &self.disordered
    }

    /// SQS reference correlations, if a relaxed SQS was available.
    pub fn sqs_correlations(&self) -> Option<&DVector<f64>> {
        self.sqs.as_ref()
    }

    /// Ordered ground-state correlations, once set.
    pub fn ordered_correlations(&self) -> Option<&DVector<f64>> {
        self.ordered.as_ref()
    }

    /// Records the ordered correlations. Fails on a second write.
    pub fn set_ordered_correlations(&mut self, correlations: DVector<f64>) -> Result<(), CvmError> {
        if self.ordered.is_some() {
            return Err(CvmError::Model(ErrorInfo::new(
                "ordered-write-once",
                "ordered correlations are already set",
            )));
        }
        check_len("ordered correlations", correlations.len(), self.num_clusters())?;
        self.ordered = Some(correlations);
        Ok(())
    }

    /// Indices of point clusters (arity 1).
    pub fn point_clusters(&self) -> Vec<usize> {
        self.indices_where(|info| info.arity == 1)
    }

    /// Indices of clusters with two or more sites.
    pub fn multibody_clusters(&self) -> Vec<usize> {
        self.indices_where(|info| info.arity >= 2)
    }

    fn indices_where(&self, predicate: impl Fn(&ClusterInfo) -> bool) -> Vec<usize> {
        self.clusters
            .iter()
            .enumerate()
            .filter(|(_, info)| predicate(info))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// All sub-configuration probabilities `V·x`.
    pub fn probabilities(&self, correlations: &DVector<f64>) -> DVector<f64> {
        &self.vmatrix * correlations
    }

    /// Probabilities split per configuration block.
    pub fn configuration_probabilities(&self, correlations: &DVector<f64>) -> Vec<DVector<f64>> {
        let rho = self.probabilities(correlations);
        self.block_offsets
            .windows(2)
            .map(|w| rho.rows(w[0], w[1] - w[0]).into_owned())
            .collect()
    }

    /// Whether every probability lies in `[0, 1]` up to [`PROBABILITY_EPSILON`].
    pub fn check_correlation_validity(&self, correlations: &DVector<f64>) -> bool {
        self.probabilities(correlations)
            .iter()
            .all(|&p| p >= -PROBABILITY_EPSILON && p <= 1.0 + PROBABILITY_EPSILON)
    }

    /// Euclidean distance from the disordered reference.
    pub fn distance_from_disordered(&self, correlations: &DVector<f64>) -> f64 {
        (correlations - &self.disordered).norm()
    }

    /// Euclidean distance from the ordered reference, once set.
    pub fn distance_from_ordered(&self, correlations: &DVector<f64>) -> Option<f64> {
        self.ordered
            .as_ref()
            .map(|ordered| (correlations - ordered).norm())
    }

    /// Distance between the ordered and disordered references.
    pub fn order_disorder_distance(&self) -> Option<f64> {
        self.distance_from_ordered(&self.disordered)
    }

    /// Number of sites in the lattice file.
    pub fn num_lattice_atoms(&self) -> usize {
        self.num_lattice_atoms
    }

    /// Number of sites in the input structure.
    pub fn num_structure_atoms(&self) -> usize {
        self.num_structure_atoms
    }

    /// Phase label.
    pub fn phase(&self) -> &str {
        &self.phase
    }

    /// Structure label.
    pub fn structure(&self) -> &str {
        &self.structure
    }

    /// Hash over the cluster-expansion inputs.
    pub fn input_hash(&self) -> &str {
        &self.input_hash
    }

    /// Tabular overview of the model for logs.
    pub fn summary(&self) -> ModelSummary<'_> {
        ModelSummary { model: self }
    }
}

/// Display adapter printing one row per cluster.
pub struct ModelSummary<'a> {
    model: &'a ClusterModel,
}

impl fmt::Display for ModelSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = self.model;
        writeln!(
            f,
            "{}/{}: {} clusters, {} configurations, eci {:?}",
            model.phase,
            model.structure,
            model.num_clusters(),
            model.num_configurations(),
            model.eci_source
        )?;
        writeln!(
            f,
            "{:>5} {:>5} {:>5} {:>10} {:>12} {:>12}",
            "index", "arity", "mult", "diameter", "eci", "disordered"
        )?;
        for (idx, info) in model.clusters.iter().enumerate() {
            writeln!(
                f,
                "{idx:>5} {:>5} {:>5} {:>10.5} {:>12.6} {:>12.6}",
                info.arity, info.multiplicity, info.diameter, model.eci[idx], model.disordered[idx]
            )?;
        }
        Ok(())
    }
}

fn check_len(what: &str, actual: usize, expected: usize) -> Result<(), CvmError> {
    if actual == expected {
        return Ok(());
    }
    Err(CvmError::Model(
        ErrorInfo::new("length-mismatch", format!("{what} has {actual} entries, expected {expected}"))
            .with_context("input", what),
    ))
}

fn directory_name(dir: Option<&Path>) -> String {
    dir.and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
