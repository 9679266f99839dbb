use std::path::PathBuf;

use cvm_cluster::{AtomicStructure, CorrelationMode, CorrelationTool};
use cvm_core::{CvmError, RngHandle};
use nalgebra::DVector;
use tracing::debug;

use crate::determinism;

/// Unbounded source of trial correlation vectors.
pub trait TrialSource {
    /// Produces the next trial vector.
    fn next_sample(&mut self) -> Result<DVector<f64>, CvmError>;
}

/// Samples correlations of randomly permuted copies of the input structure.
///
/// Every call reads the template structure, shuffles its species with a
/// substream of the master seed, writes the result to the scratch file and
/// runs the correlation tool on it. A tool failure is returned as
/// [`CvmError::StructureSamplingFailed`]. The only way to restart the
/// sequence is to build a new sampler.
pub struct RandomStructureSampler<'t> {
    template: PathBuf,
    scratch: PathBuf,
    tool: &'t dyn CorrelationTool,
    master_seed: u64,
    counter: u64,
}

impl<'t> RandomStructureSampler<'t> {
    /// Creates a sampler over `template`, writing permutations to `scratch`.
    pub fn new(
        template: impl Into<PathBuf>,
        scratch: impl Into<PathBuf>,
        tool: &'t dyn CorrelationTool,
        master_seed: u64,
    ) -> Self {
        Self {
            template: template.into(),
            scratch: scratch.into(),
            tool,
            master_seed,
            counter: 0,
        }
    }

    /// Number of samples drawn so far.
    pub fn samples_drawn(&self) -> u64 {
        self.counter
    }
}

impl TrialSource for RandomStructureSampler<'_> {
    fn next_sample(&mut self) -> Result<DVector<f64>, CvmError> {
        let structure = AtomicStructure::read(&self.template)?;
        let mut rng = RngHandle::from_seed(determinism::sample_seed(self.master_seed, self.counter));
        self.counter += 1;
        structure
            .with_shuffled_species(&mut rng)
            .write(&self.scratch)?;
        let correlations = self.tool.correlations(&self.scratch, CorrelationMode::Structure)?;
        debug!(sample = self.counter, correlations = ?correlations.as_slice(), "sampled structure");
        Ok(correlations)
    }
}

/// Always returns the same vector.
#[derive(Debug, Clone)]
pub struct ConstantSampler {
    sample: DVector<f64>,
    calls: usize,
}

impl ConstantSampler {
    /// Sampler returning `sample` on every call.
    pub fn new(sample: DVector<f64>) -> Self {
        Self { sample, calls: 0 }
    }

    /// Number of calls so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl TrialSource for ConstantSampler {
    fn next_sample(&mut self) -> Result<DVector<f64>, CvmError> {
        self.calls += 1;
        Ok(self.sample.clone())
    }
}
