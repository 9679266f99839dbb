use std::path::Path;

use cvm_cluster::{ClusterExpansion, ClusterInfo, ClusterModel, EciSource, ReferenceStates};
use cvm_core::CvmError;
use cvm_opt::{
    read_results_csv, run_sweep, temperature_grid, write_results_csv, write_results_json,
    ConstantSampler, CvmOptimizer, OptimizerConfig, OrderedStateSolver, RunConfig, RunManifest,
    SearchStrategy, SweepConfig, TrialLog,
};
use nalgebra::{DMatrix, DVector};
use tempfile::tempdir;

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
        sqs: Some(DVector::from_vec(vec![1.0, 0.0, -0.05])),
    };
    ClusterModel::new(expansion, references)
        .unwrap()
        .with_site_counts(1, 4)
        .with_labels("B2", "chain")
}

fn sweep_config() -> OptimizerConfig {
    OptimizerConfig {
        num_trials: 4,
        early_stopping_count: 2,
        ..OptimizerConfig::default()
    }
}

#[test]
fn temperature_grid_includes_both_ends() {
    let grid = temperature_grid(&SweepConfig::default()).unwrap();
    assert_eq!(grid.len(), 20);
    assert_eq!(grid[0], 100.0);
    assert_eq!(grid[19], 2000.0);

    let off_grid = SweepConfig {
        tmin: 0.0,
        tmax: 250.0,
        tstep: 100.0,
    };
    assert_eq!(temperature_grid(&off_grid).unwrap(), vec![0.0, 100.0, 200.0]);

    let tenths = SweepConfig {
        tmin: 0.1,
        tmax: 0.3,
        tstep: 0.1,
    };
    assert_eq!(temperature_grid(&tenths).unwrap().len(), 3);
}

#[test]
fn invalid_grids_are_config_errors() {
    for (tmin, tmax, tstep) in [(100.0, 50.0, 10.0), (0.0, 100.0, 0.0), (-10.0, 100.0, 10.0)] {
        let err = temperature_grid(&SweepConfig { tmin, tmax, tstep }).unwrap_err();
        assert!(matches!(err, CvmError::Config(_)));
        assert_eq!(err.info().code, "temperature-grid");
    }
}

#[test]
fn sweep_requires_the_ordered_state() {
    let model = chain_model();
    let mut optimizer = CvmOptimizer::new(&model, sweep_config()).unwrap();
    let mut sampler = ConstantSampler::new(model.disordered_correlations().clone());
    let err = run_sweep(&mut optimizer, &[500.0], &mut sampler, |_, _| Ok(())).unwrap_err();
    assert_eq!(err.info().code, "ordered-unset");
}

#[test]
fn sweep_records_every_temperature_and_persists_incrementally() {
    let dir = tempdir().unwrap();
    let mut model = chain_model();
    OrderedStateSolver::solve_into(&mut model).unwrap();
    let mut optimizer = CvmOptimizer::new(&model, sweep_config()).unwrap();
    let mut sampler = ConstantSampler::new(DVector::from_vec(vec![1.0, 0.0, 0.3]));

    let results_path = dir.path().join("result.csv");
    let mut persisted = Vec::new();
    let records = run_sweep(
        &mut optimizer,
        &[0.0, 500.0, 1000.0],
        &mut sampler,
        |records, log: &TrialLog| {
            write_results_csv(&results_path, records)?;
            let trial_path = dir
                .path()
                .join("trials")
                .join(format!("T{}.csv", records.len()));
            log.write_csv(&trial_path)?;
            persisted.push(records.len());
            Ok(())
        },
    )
    .unwrap();

    assert_eq!(persisted, vec![1, 2, 3]);
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.phase, "B2");
        assert_eq!(record.structure, "chain");
        assert!(record.f_optimized <= record.f_disordered + 1e-12);
        assert!(record.f_sqs.is_some());
        assert_eq!(record.correlations.len(), 3);
    }
    // the disordered state is pure energy at 0 K and the ordered one is lowest
    assert!((records[0].f_disordered).abs() < 1e-15);
    assert!((records[0].f_ordered + 0.01).abs() < 1e-9);

    let reread = read_results_csv(&results_path).unwrap();
    assert_eq!(reread, records);

    let trials = TrialLog::read_csv(&dir.path().join("trials").join("T3.csv")).unwrap();
    assert_eq!(trials.records(), optimizer.trial_log().records());
}

#[test]
fn results_json_is_an_array_of_records() {
    let dir = tempdir().unwrap();
    let mut model = chain_model();
    OrderedStateSolver::solve_into(&mut model).unwrap();
    let mut optimizer = CvmOptimizer::new(&model, sweep_config()).unwrap();
    let mut sampler = ConstantSampler::new(model.disordered_correlations().clone());
    let records = run_sweep(&mut optimizer, &[700.0], &mut sampler, |_, _| Ok(())).unwrap();

    let path = dir.path().join("out").join("result.json");
    write_results_json(&path, &records).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value.as_array().map(Vec::len), Some(1));
    assert_eq!(value[0]["temperature"], 700.0);
}

#[test]
fn missing_results_table_is_reported() {
    let err = read_results_csv(Path::new("/nonexistent/result.csv")).unwrap_err();
    assert!(matches!(err, CvmError::MissingInputFile(_)));
}

#[test]
fn yaml_config_fills_defaults() {
    let config = RunConfig::from_yaml_str(
        "optimizer:\n  strategy:\n    type: basin-hopping\n    stepsize: 0.2\n  num_trials: 10\nsweep:\n  tmax: 500\n",
    )
    .unwrap();
    assert_eq!(config.optimizer.num_trials, 10);
    assert_eq!(config.optimizer.early_stopping_count, 20);
    assert_eq!(
        config.optimizer.strategy,
        SearchStrategy::BasinHopping {
            stepsize: 0.2,
            temperature: 1.0,
            interval: 50,
        }
    );
    assert_eq!(config.sweep.tmin, 100.0);
    assert_eq!(config.sweep.tmax, 500.0);
    assert_eq!(config.seed_policy.master_seed, 42);
    assert_eq!(config.output.results_file, Path::new("result.csv"));

    let empty = RunConfig::from_yaml_str("{}").unwrap();
    assert_eq!(empty, RunConfig::default());

    let err = RunConfig::from_yaml_str("optimizer: [1, 2]").unwrap_err();
    assert_eq!(err.info().code, "config-parse");
}

#[test]
fn output_paths_resolve_against_the_structure_directory() {
    let mut config = RunConfig::default();
    let structure = Path::new("/data/B2/chain");
    assert_eq!(
        config.output.path(structure, &config.output.results_file),
        Path::new("/data/B2/chain/result.csv")
    );
    config.output.directory = Some("sro".into());
    assert_eq!(
        config.output.path(structure, &config.output.manifest_file),
        Path::new("/data/B2/chain/sro/manifest.json")
    );
}

#[test]
fn manifest_round_trips() {
    let dir = tempdir().unwrap();
    let mut model = chain_model();
    OrderedStateSolver::solve_into(&mut model).unwrap();
    let config = RunConfig::default();
    let mut manifest = RunManifest::new(&model, &config);
    manifest.temperatures = vec![100.0, 200.0];
    manifest.trial_logs = vec!["trials/T100.csv".into(), "trials/T200.csv".into()];

    let path = dir.path().join("manifest.json");
    manifest.write(&path).unwrap();
    let loaded = RunManifest::load(&path).unwrap();
    assert_eq!(loaded.config, config);
    assert_eq!(loaded.provenance, manifest.provenance);
    assert_eq!(loaded.provenance.phase, "B2");
    assert_eq!(loaded.provenance.seed, 42);
    assert_eq!(loaded.eci_source, EciSource::File);
    assert_eq!(loaded.temperatures, vec![100.0, 200.0]);
    assert_eq!(loaded.trial_logs.len(), 2);
    assert_eq!(loaded.ordered_correlations.len(), 3);
}

#[test]
fn manifests_from_a_newer_major_schema_are_refused() {
    let dir = tempdir().unwrap();
    let mut model = chain_model();
    OrderedStateSolver::solve_into(&mut model).unwrap();
    let manifest = RunManifest::new(&model, &RunConfig::default());
    let path = dir.path().join("manifest.json");
    manifest.write(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"major\": 1"));
    std::fs::write(&path, text.replacen("\"major\": 1", "\"major\": 2", 1)).unwrap();
    let err = RunManifest::load(&path).unwrap_err();
    assert_eq!(err.info().code, "manifest-schema");
    assert_eq!(err.info().context["found"], "2.0.0");
}
