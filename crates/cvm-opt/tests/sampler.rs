use std::cell::RefCell;
use std::fs;
use std::path::Path;

use cvm_cluster::{
    AtomicStructure, ClusterExpansion, ClusterInfo, ClusterModel, CorrelationMode,
    CorrelationTool, ReferenceStates,
};
use cvm_core::{CvmError, ErrorInfo, RngHandle};
use cvm_opt::determinism::sample_seed;
use cvm_opt::{CvmOptimizer, OptimizerConfig, RandomStructureSampler, TrialSource};
use nalgebra::{DMatrix, DVector};

const TEMPLATE: &str = "4.0 4.0 4.0 90 90 90
1 0 0
0 1 0
0 0 1
0 0 0 A
0.5 0 0 B
0 0.5 0 C
0 0 0.5 D
0.5 0.5 0 E
0.5 0 0.5 F
0 0.5 0.5 G
0.5 0.5 0.5 H
0.25 0 0 I
0 0.25 0 J
0 0 0.25 K
0.25 0.25 0 L
";

/// Returns fixed correlations and keeps a copy of every structure it read.
struct RecordingTool {
    correlations: DVector<f64>,
    seen: RefCell<Vec<String>>,
}

impl RecordingTool {
    fn new(correlations: &[f64]) -> Self {
        Self {
            correlations: DVector::from_vec(correlations.to_vec()),
            seen: RefCell::new(Vec::new()),
        }
    }
}

impl CorrelationTool for RecordingTool {
    fn correlations(
        &self,
        structure: &Path,
        mode: CorrelationMode,
    ) -> Result<DVector<f64>, CvmError> {
        assert_eq!(mode, CorrelationMode::Structure);
        let text = fs::read_to_string(structure)
            .map_err(|err| CvmError::io("structure-read", &err, structure))?;
        self.seen.borrow_mut().push(text);
        Ok(self.correlations.clone())
    }
}

struct BrokenTool;

impl CorrelationTool for BrokenTool {
    fn correlations(&self, _: &Path, _: CorrelationMode) -> Result<DVector<f64>, CvmError> {
        Err(CvmError::StructureSamplingFailed(ErrorInfo::new(
            "corrdump-exit",
            "Unable to open lattice file",
        )))
    }
}

fn workdir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("str.in"), TEMPLATE).unwrap();
    dir
}

fn sorted(mut species: Vec<&str>) -> Vec<&str> {
    species.sort_unstable();
    species
}

#[test]
fn each_draw_writes_a_seeded_permutation_to_the_scratch_file() {
    let dir = workdir();
    let template = dir.path().join("str.in");
    let scratch = dir.path().join("randstr.in");
    let tool = RecordingTool::new(&[1.0, 0.0, -0.25]);
    let mut sampler = RandomStructureSampler::new(&template, &scratch, &tool, 42);

    for _ in 0..3 {
        let correlations = sampler.next_sample().unwrap();
        assert_eq!(correlations.as_slice(), &[1.0, 0.0, -0.25]);
    }
    assert_eq!(sampler.samples_drawn(), 3);

    let original = AtomicStructure::read(&template).unwrap();
    let seen = tool.seen.borrow();
    assert_eq!(seen.len(), 3);
    for (counter, text) in seen.iter().enumerate() {
        let mut rng = RngHandle::from_seed(sample_seed(42, counter as u64));
        assert_eq!(text, &original.with_shuffled_species(&mut rng).to_text());

        let drawn = AtomicStructure::parse(text).unwrap();
        assert_eq!(drawn.header(), original.header());
        assert_eq!(sorted(drawn.species()), sorted(original.species()));
    }
    assert_ne!(seen[0], seen[1]);
    assert_eq!(fs::read_to_string(&scratch).unwrap(), seen[2]);
    assert_eq!(fs::read_to_string(&template).unwrap(), TEMPLATE);
}

#[test]
fn a_rebuilt_sampler_replays_the_same_structures() {
    let dir = workdir();
    let template = dir.path().join("str.in");
    let scratch = dir.path().join("randstr.in");
    let draw = |seed: u64| {
        let tool = RecordingTool::new(&[1.0]);
        let mut sampler = RandomStructureSampler::new(&template, &scratch, &tool, seed);
        for _ in 0..4 {
            sampler.next_sample().unwrap();
        }
        tool.seen.into_inner()
    };
    let first = draw(7);
    assert_eq!(first, draw(7));
    assert_ne!(first, draw(8));
}

#[test]
fn tool_failures_are_sampling_failures() {
    let dir = workdir();
    let mut sampler = RandomStructureSampler::new(
        dir.path().join("str.in"),
        dir.path().join("randstr.in"),
        &BrokenTool,
        42,
    );
    let err = sampler.next_sample().unwrap_err();
    assert!(matches!(err, CvmError::StructureSamplingFailed(_)));
    assert!(err.is_fatal());
    assert_eq!(sampler.samples_drawn(), 1);
}

#[test]
fn missing_template_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let tool = RecordingTool::new(&[1.0]);
    let mut sampler = RandomStructureSampler::new(
        dir.path().join("str.in"),
        dir.path().join("randstr.in"),
        &tool,
        42,
    );
    let err = sampler.next_sample().unwrap_err();
    assert!(matches!(err, CvmError::MissingInputFile(_)));
    assert!(tool.seen.borrow().is_empty());
}

fn chain_model() -> ClusterModel {
    let expansion = ClusterExpansion {
        clusters: vec![
            ClusterInfo { multiplicity: 1, diameter: 0.0, arity: 0 },
            ClusterInfo { multiplicity: 1, diameter: 0.0, arity: 1 },
            ClusterInfo { multiplicity: 1, diameter: 1.0, arity: 2 },
        ],
        eci: Some(vec![0.0, 0.0, 0.01]),
        cluster_multiplicities: vec![1.0, 1.0, 1.0],
        config_multiplicities: vec![vec![1.0, 2.0, 1.0], vec![1.0, 1.0]],
        kikuchi_barker: vec![1.0, -1.0],
        vmatrix: vec![
            DMatrix::from_row_slice(3, 3, &[0.25, 0.5, 0.25, 0.25, 0.0, -0.25, 0.25, -0.5, 0.25]),
            DMatrix::from_row_slice(2, 3, &[0.5, 0.5, 0.0, 0.5, -0.5, 0.0]),
        ],
        subcluster_counts: None,
        input_hash: "chain".to_string(),
    };
    let references = ReferenceStates {
        disordered: DVector::from_vec(vec![1.0, 0.0, 0.0]),
        sqs: None,
    };
    ClusterModel::new(expansion, references).unwrap()
}

#[test]
fn random_restart_draws_one_structure_per_later_trial() {
    let dir = workdir();
    let model = chain_model();
    let tool = RecordingTool::new(&[1.0, 0.0, 0.0]);
    let mut sampler = RandomStructureSampler::new(
        dir.path().join("str.in"),
        dir.path().join("randstr.in"),
        &tool,
        3,
    );
    let config = OptimizerConfig {
        num_trials: 50,
        early_stopping_count: 5,
        ..OptimizerConfig::default()
    };
    let mut optimizer = CvmOptimizer::new(&model, config).unwrap();
    let result = optimizer.fit(1000.0, &mut sampler).unwrap();

    assert_eq!(result.trials_run, 27);
    assert_eq!(sampler.samples_drawn(), 26);
    assert_eq!(tool.seen.borrow().len(), 26);
}
