use cvm_core::{CvmError, EV_TO_J_PER_MOL};
use cvm_fit::{fit_correction, CorrectionModel, FitData, FitOptions};
use cvm_opt::SweepRecord;
use nalgebra::DVector;
use proptest::prelude::*;

fn synthetic(model: &CorrectionModel, params: &[f64]) -> FitData {
    let params = DVector::from_row_slice(params);
    let temperatures: Vec<f64> = (1..=20).map(|k| 100.0 * k as f64).collect();
    let corrections = temperatures
        .iter()
        .map(|&t| model.evaluate(t, &params))
        .collect();
    FitData {
        temperatures,
        corrections,
    }
}

fn record(temperature: f64, f_optimized: f64, f_disordered: f64) -> SweepRecord {
    SweepRecord {
        phase: "B2".to_string(),
        structure: "chain".to_string(),
        temperature,
        f_sqs: None,
        f_ordered: -0.1,
        f_disordered,
        f_optimized,
        constraint_violation: 0.0,
        correlations: vec![1.0, 0.0, -0.1],
    }
}

fn assert_recovered(found: &DVector<f64>, expected: &[f64], tolerance: f64) {
    for (f, e) in found.iter().zip(expected) {
        assert!(
            (f - e).abs() <= tolerance * e.abs().max(1.0),
            "{:?} vs {expected:?}",
            found.as_slice()
        );
    }
}

#[test]
fn recovers_exponential_decay_coefficients() {
    let truth = [600.0, -0.03, 25.0];
    let options = FitOptions::default();
    let data = synthetic(&options.model, &truth);
    let initial = DVector::from_vec(vec![500.0, -0.02, 20.0]);
    let result = fit_correction(&data, &options, Some(initial)).unwrap();

    assert_recovered(&result.parameters, &truth, 1e-6);
    assert!(result.residual_sum < 1e-20);
    assert!(result.covariance.is_some());
    let expected = options
        .model
        .evaluate(1000.0, &DVector::from_row_slice(&truth));
    assert!((result.predict(1000.0) - expected).abs() < 1e-10);
}

#[test]
fn recovers_inverse_polynomial_from_default_start() {
    let truth = [-0.5, 120.0, -3000.0];
    let options = FitOptions {
        model: CorrectionModel::InversePolynomial { degree: 2 },
        ..FitOptions::default()
    };
    let data = synthetic(&options.model, &truth);
    let result = fit_correction(&data, &options, None).unwrap();
    assert_recovered(&result.parameters, &truth, 1e-5);

    let errors = result.standard_errors().unwrap();
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().all(|e| e.is_finite() && *e >= 0.0));
}

#[test]
fn data_skips_zero_temperature_and_scales_units() {
    let records = vec![
        record(0.0, -0.2, -0.1),
        record(100.0, -0.011, -0.010),
        record(200.0, -0.024, -0.020),
    ];
    let ev = FitData::from_records(&records, 4, false).unwrap();
    assert_eq!(ev.temperatures, vec![100.0, 200.0]);
    assert!((ev.corrections[0] + 0.004).abs() < 1e-12);
    assert!((ev.corrections[1] + 0.016).abs() < 1e-12);
    assert_eq!(ev.range(), (100.0, 200.0));

    let joules = FitData::from_records(&records, 4, true).unwrap();
    assert!((joules.corrections[0] - ev.corrections[0] * EV_TO_J_PER_MOL).abs() < 1e-9);

    let err = FitData::from_records(&records[..1], 4, false).unwrap_err();
    assert_eq!(err.info().code, "fit-no-data");
}

#[test]
fn too_few_points_is_a_fit_error() {
    let data = FitData {
        temperatures: vec![100.0, 200.0],
        corrections: vec![-0.1, -0.05],
    };
    let err = fit_correction(&data, &FitOptions::default(), None).unwrap_err();
    assert!(matches!(err, CvmError::Fit(_)));
    assert_eq!(err.info().code, "fit-too-few-points");
}

#[test]
fn mismatched_initial_coefficients_are_refused() {
    let data = synthetic(&CorrectionModel::ExpDecay, &[600.0, -0.03, 25.0]);
    let err = fit_correction(
        &data,
        &FitOptions::default(),
        Some(DVector::from_vec(vec![1.0, 2.0])),
    )
    .unwrap_err();
    assert_eq!(err.info().code, "coeff-count");
}

#[test]
fn model_options_parse_from_yaml_tags() {
    let options: FitOptions = serde_yaml::from_str(
        "model:\n  type: inverse-polynomial\n  degree: 3\nin_joules: true\n",
    )
    .unwrap();
    assert_eq!(options.model, CorrectionModel::InversePolynomial { degree: 3 });
    assert!(options.in_joules);
    assert_eq!(options.samples, 1000);
    assert_eq!(options.coeff_in.to_str(), Some("sro_coeffs.in"));
}

proptest! {
    #[test]
    fn linear_models_are_recovered(a0 in -1.0f64..1.0, a1 in -500.0f64..500.0) {
        let model = CorrectionModel::InversePolynomial { degree: 1 };
        let data = synthetic(&model, &[a0, a1]);
        let options = FitOptions { model, ..FitOptions::default() };
        let result = fit_correction(&data, &options, None).unwrap();
        prop_assert!((result.parameters[0] - a0).abs() < 1e-6);
        prop_assert!((result.parameters[1] - a1).abs() < 1e-6 * a1.abs().max(1.0));
    }
}
