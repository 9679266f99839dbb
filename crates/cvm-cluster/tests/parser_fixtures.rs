use cvm_cluster::io::{
    parse_clusters, parse_column, parse_config_multiplicities, parse_configs, parse_vmatrix,
};
use cvm_core::CvmError;

const CLUSTERS: &str = "1
0.000000
0

2
0.000000
1
0.000000 0.000000 0.000000 0

1
1.000000
2
0.000000 0.000000 0.000000 0
1.000000 0.000000 0.000000 0
";

const CONFIGMULT: &str = "2

3
1
2
1

2
1
1
";

const VMAT: &str = "2

3 3
0.25 0.5 0.25
0.25 0 -0.25
0.25 -0.5 0.25

2 3
0.5 0.5 0
0.5 -0.5 0
";

const CONFIGS: &str = "2


3
2
0 0 0 0
1 0 0 0

2
0 0 0 0
1 0 0 0

2
0 0 0 0
1 0 0 0


2
1
0 0 0 0

1
0 0 0 0
";

#[test]
fn clusters_are_read_in_index_order() {
    let clusters = parse_clusters(CLUSTERS).unwrap();
    assert_eq!(clusters.len(), 3);
    assert_eq!(clusters[0].arity, 0);
    assert_eq!(clusters[1].multiplicity, 2);
    assert_eq!(clusters[1].arity, 1);
    assert_eq!(clusters[2].arity, 2);
    assert!((clusters[2].diameter - 1.0).abs() < 1e-12);
}

#[test]
fn column_files_skip_their_header() {
    let eci = parse_column("3\n0\n-0.5\n0.0125\n").unwrap();
    assert_eq!(eci, vec![0.0, -0.5, 0.0125]);
    let kb = parse_column("2\n1\n-1\n\n").unwrap();
    assert_eq!(kb, vec![1.0, -1.0]);
}

#[test]
fn configuration_multiplicities_drop_block_counts() {
    let mults = parse_config_multiplicities(CONFIGMULT).unwrap();
    assert_eq!(mults, vec![vec![1.0, 2.0, 1.0], vec![1.0, 1.0]]);
}

#[test]
fn vmatrix_blocks_keep_their_shape() {
    let blocks = parse_vmatrix(VMAT).unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].shape(), (3, 3));
    assert_eq!(blocks[1].shape(), (2, 3));
    assert!((blocks[0][(1, 2)] + 0.25).abs() < 1e-12);
    assert!((blocks[1][(1, 1)] + 0.5).abs() < 1e-12);
}

#[test]
fn vmatrix_row_count_mismatch_is_a_parse_error() {
    let text = "1\n\n3 3\n0.25 0.5 0.25\n0.25 0 -0.25\n";
    let err = parse_vmatrix(text).unwrap_err();
    assert!(matches!(err, CvmError::Parse(_)));
    assert_eq!(err.info().code, "vmat-rows");
}

#[test]
fn vmatrix_column_count_mismatch_is_a_parse_error() {
    let text = "1\n\n1 3\n0.25 0.5\n";
    let err = parse_vmatrix(text).unwrap_err();
    assert_eq!(err.info().code, "vmat-cols");
}

#[test]
fn config_blocks_need_two_blank_lines() {
    assert_eq!(parse_configs(CONFIGS).unwrap(), vec![3, 2]);
}

#[test]
fn empty_cluster_file_is_rejected() {
    let err = parse_clusters("\n\n").unwrap_err();
    assert_eq!(err.info().code, "clusters-empty");
}

#[test]
fn truncated_cluster_block_is_rejected() {
    let err = parse_clusters("1\n0.0\n0\n\n1\n0.5\n").unwrap_err();
    assert_eq!(err.info().code, "clusters-short-block");
}
