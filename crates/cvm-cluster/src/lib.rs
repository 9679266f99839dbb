#![deny(missing_docs)]

//! Cluster-expansion inputs for the CVM engine: ATAT file parsers, structure
//! files, the `corrdump` and `cvmclus` adapters and the [`ClusterModel`].

/// Correlation tool abstraction and the `corrdump` adapter.
pub mod corrdump;
/// Cluster-file generator adapter.
pub mod cvmclus;
/// Input file names and path resolution.
pub mod files;
/// Content hashing of input files.
pub mod hash;
/// Parsers for the cluster-expansion files.
pub mod io;
/// Cluster model with derived reference states.
pub mod model;
/// ATAT structure and lattice files.
pub mod structure;

pub use corrdump::{parse_correlation_output, CorrelationMode, CorrelationTool, Corrdump};
pub use cvmclus::Cvmclus;
pub use files::ClusterFiles;
pub use io::ClusterInfo;
pub use model::{ClusterExpansion, ClusterModel, EciSource, ModelSummary, ReferenceStates};
pub use structure::{AtomicStructure, Site};
