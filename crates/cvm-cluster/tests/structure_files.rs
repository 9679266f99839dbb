use cvm_cluster::{parse_correlation_output, AtomicStructure};
use cvm_core::{CvmError, RngHandle};

const SHORT_HEADER: &str = "3.0 3.0 3.0 90 90 90
1 0 0
0 1 0
0 0 1
0 0 0 Al
0.5 0.5 0 Al
0.5 0 0.5 Ni
0 0.5 0.5 Ni
";

const LONG_HEADER: &str = "1 0 0
0 1 0
0 0 1
1 0 0
0 1 0
0 0 4
0 0 0 Cu
0 0 1 Au
0 0 2 Cu
0 0 3 Au
";

fn sorted(mut species: Vec<&str>) -> Vec<&str> {
    species.sort_unstable();
    species
}

#[test]
fn header_length_follows_first_line_token_count() {
    let short = AtomicStructure::parse(SHORT_HEADER).unwrap();
    assert_eq!(short.header().len(), 4);
    assert_eq!(short.num_sites(), 4);

    let long = AtomicStructure::parse(LONG_HEADER).unwrap();
    assert_eq!(long.header().len(), 6);
    assert_eq!(long.num_sites(), 4);
    assert_eq!(long.species(), vec!["Cu", "Au", "Cu", "Au"]);
}

#[test]
fn rendering_keeps_the_layout() {
    let structure = AtomicStructure::parse(SHORT_HEADER).unwrap();
    assert_eq!(structure.to_text(), SHORT_HEADER);
}

#[test]
fn shuffling_preserves_composition_and_coordinates() {
    let structure = AtomicStructure::parse(LONG_HEADER).unwrap();
    let mut rng = RngHandle::substream(42, 0);
    let shuffled = structure.with_shuffled_species(&mut rng);
    assert_eq!(sorted(shuffled.species()), sorted(structure.species()));
    assert_eq!(shuffled.header(), structure.header());
    for (a, b) in shuffled.sites().iter().zip(structure.sites()) {
        assert_eq!(a.coordinates, b.coordinates);
    }
}

#[test]
fn shuffling_is_reproducible_per_substream() {
    let structure = AtomicStructure::parse(LONG_HEADER).unwrap();
    let first = structure.with_shuffled_species(&mut RngHandle::substream(7, 3));
    let second = structure.with_shuffled_species(&mut RngHandle::substream(7, 3));
    assert_eq!(first, second);
}

#[test]
fn header_transfer_keeps_sites() {
    let relaxed = AtomicStructure::parse(
        "1.02 0 0\n0 0.98 0\n0 0 1.01\n1 0 0\n0 1 0\n0 0 4.1\n0 0 0 Cu\n0 0 1.02 Au\n",
    )
    .unwrap();
    let reference = AtomicStructure::parse(LONG_HEADER).unwrap();
    let rescaled = relaxed.with_header_of(&reference);
    assert_eq!(rescaled.header(), reference.header());
    assert_eq!(rescaled.sites(), relaxed.sites());
}

#[test]
fn write_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("randstr.in");
    let structure = AtomicStructure::parse(SHORT_HEADER).unwrap();
    structure.write(&path).unwrap();
    assert_eq!(AtomicStructure::read(&path).unwrap(), structure);
}

#[test]
fn truncated_header_is_rejected() {
    let err = AtomicStructure::parse("1 0 0\n0 1 0\n").unwrap_err();
    assert_eq!(err.info().code, "structure-header");
}

#[test]
fn missing_structure_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = AtomicStructure::read(&dir.path().join("str.in")).unwrap_err();
    assert!(matches!(err, CvmError::MissingInputFile(_)));
    assert!(err.info().context["path"].ends_with("str.in"));
}

#[test]
fn corrdump_output_strips_trailing_tab() {
    let values = parse_correlation_output("1.000000\t0.000000\t-0.333333\t\n").unwrap();
    assert_eq!(values.len(), 3);
    assert!((values[2] + 0.333333).abs() < 1e-12);
}

#[test]
fn corrdump_garbage_is_a_sampling_failure() {
    let err = parse_correlation_output("Unable to open lattice file\n").unwrap_err();
    assert!(matches!(err, CvmError::StructureSamplingFailed(_)));
    let err = parse_correlation_output("\n").unwrap_err();
    assert_eq!(err.info().code, "corrdump-output");
}
