use cvm_cluster::{ClusterExpansion, ClusterInfo, ClusterModel, ReferenceStates};
use cvm_core::CvmError;
use cvm_opt::FeasibleRegion;
use nalgebra::{DMatrix, DVector};

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
fn empty_and_point_clusters_are_pinned() {
    let model = chain_model();
    let region = FeasibleRegion::build(&model, false).unwrap();
    assert_eq!(region.dimension(), 3);
    assert!(region.is_fixed(0));
    assert!(region.is_fixed(1));
    assert!(!region.is_fixed(2));
    assert_eq!(region.free_indices(), vec![2]);
    assert_eq!(region.lower().as_slice(), &[1.0, 0.0, -1.0]);
    assert_eq!(region.upper().as_slice(), &[1.0, 0.0, 1.0]);
    assert!(region.norm_constraint().is_none());
}

#[test]
fn violations_cover_bounds_and_probabilities() {
    let model = chain_model();
    let region = FeasibleRegion::build(&model, false).unwrap();

    let inside = DVector::from_vec(vec![1.0, 0.0, 0.3]);
    assert_eq!(region.max_violation(&inside), 0.0);
    assert!(region.is_strictly_interior(&inside));

    let off_bound = DVector::from_vec(vec![1.0, 0.2, 0.3]);
    assert!((region.max_violation(&off_bound) - 0.2).abs() < 1e-15);
    assert!(!region.is_strictly_interior(&off_bound));

    // rho of the middle pair configuration is 0.25 - 0.25 * 1.4
    let beyond = DVector::from_vec(vec![1.0, 0.0, 1.4]);
    assert!((region.max_violation(&beyond) - 0.4).abs() < 1e-12);
    assert!(!region.check_probabilities(&beyond));
    assert!(region.check_probabilities(&inside));
}

#[test]
fn projection_resets_pinned_coordinates() {
    let model = chain_model();
    let region = FeasibleRegion::build(&model, false).unwrap();
    let projected = region.project_fixed(&DVector::from_vec(vec![0.7, 0.4, -0.6]));
    assert_eq!(projected.as_slice(), &[1.0, 0.0, -0.6]);
}

#[test]
fn infeasible_starts_are_pulled_towards_the_anchor() {
    let model = chain_model();
    let region = FeasibleRegion::build(&model, false).unwrap();
    let anchor = model.disordered_correlations();
    let pulled = region
        .pull_inside(&DVector::from_vec(vec![1.0, 0.0, 3.0]), anchor)
        .unwrap();
    assert!(region.is_strictly_interior(&pulled));
    assert!(pulled[2] > 0.0 && pulled[2] < 1.0);
}

#[test]
fn norm_constraint_needs_the_ordered_state() {
    let mut model = chain_model();
    let err = FeasibleRegion::build(&model, true).unwrap_err();
    assert!(matches!(err, CvmError::Model(_)));
    assert_eq!(err.info().code, "ordered-unset");

    model
        .set_ordered_correlations(DVector::from_vec(vec![1.0, 0.0, -1.0]))
        .unwrap();
    let region = FeasibleRegion::build(&model, true).unwrap();
    let norm = region.norm_constraint().unwrap();
    assert!((norm.radius - 0.5).abs() < 1e-15);
    assert_eq!(norm.center.as_slice(), &[1.0, 0.0, 0.0]);

    let outside = DVector::from_vec(vec![1.0, 0.0, -0.8]);
    assert!((region.max_violation(&outside) - 0.3).abs() < 1e-12);
    assert!(!region.is_strictly_interior(&outside));
}
