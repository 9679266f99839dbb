use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cvm_cluster::{ClusterExpansion, ClusterInfo, ClusterModel, ReferenceStates};
use nalgebra::{DMatrix, DVector};

use cvm_opt::{
    DerivativeMode, FeasibleRegion, FreeEnergyFunctional, LocalOptions, LocalSolver,
};

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

fn bench_functional(c: &mut Criterion) {
    let model = chain_model();
    let functional = FreeEnergyFunctional::new(&model, 1000.0);
    let x = DVector::from_vec(vec![1.0, 0.0, -0.1]);
    c.bench_function("functional_value_gradient_hessian", |b| {
        b.iter(|| {
            let value = functional.value(black_box(&x));
            let gradient = functional.gradient(black_box(&x));
            let hessian = functional.hessian(black_box(&x));
            black_box((value, gradient, hessian));
        });
    });

    let region = FeasibleRegion::build(&model, false).unwrap();
    let options = LocalOptions::default();
    c.bench_function("local_minimisation", |b| {
        b.iter(|| {
            let solver = LocalSolver::new(
                functional,
                &region,
                &options,
                DerivativeMode::Exact,
                model.disordered_correlations(),
            );
            black_box(solver.minimize(model.disordered_correlations()).unwrap());
        });
    });
}

criterion_group!(benches, bench_functional);
criterion_main!(benches);
