#![deny(missing_docs)]
#![doc = "Shared error, randomness, provenance and physical constants for the CVM short-range-order correction engine."]

pub mod errors;
pub mod provenance;
pub mod rng;

pub use errors::{CvmError, ErrorInfo};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};

/// Boltzmann constant in eV/K.
pub const BOLTZMANN_EV: f64 = 8.617330337217213e-05;

/// Conversion from eV/atom to J/mol.
pub const EV_TO_J_PER_MOL: f64 = 96491.5666370759;

/// Offset added to derived probabilities before taking logarithms.
pub const LOG_EPSILON: f64 = f64::EPSILON;

/// Tolerance used when checking that derived probabilities lie in `[0, 1]`.
pub const PROBABILITY_EPSILON: f64 = 1e-2;

/// Master seed used when the caller does not provide one.
pub const DEFAULT_SEED: u64 = 42;
