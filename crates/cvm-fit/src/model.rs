use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::expression::Term;

/// Closed-form temperature dependence of the SRO correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CorrectionModel {
    /// `(exp(−a0/T) − 1)·(a1 + a2/T)`.
    #[default]
    ExpDecay,
    /// `Σ a_k·T^(−k)` for `k = 0..=degree`.
    InversePolynomial {
        /// Highest inverse power of `T`.
        #[serde(default = "default_degree")]
        degree: usize,
    },
}

fn default_degree() -> usize {
    2
}

impl CorrectionModel {
    /// Number of fitted coefficients.
    pub fn num_parameters(&self) -> usize {
        match self {
            CorrectionModel::ExpDecay => 3,
            CorrectionModel::InversePolynomial { degree } => degree + 1,
        }
    }

    /// Coefficient names `a0, a1, …` in parameter order.
    pub fn parameter_names(&self) -> Vec<String> {
        (0..self.num_parameters()).map(|k| format!("a{k}")).collect()
    }

    /// Starting guess used when no coefficient file is given.
    pub fn default_parameters(&self) -> DVector<f64> {
        DVector::from_element(self.num_parameters(), 1.0)
    }

    /// Value at `temperature`.
    pub fn evaluate(&self, temperature: f64, params: &DVector<f64>) -> f64 {
        let inverse = 1.0 / temperature;
        match self {
            CorrectionModel::ExpDecay => {
                let decay = (-params[0] * inverse).exp();
                (decay - 1.0) * (params[1] + params[2] * inverse)
            }
            CorrectionModel::InversePolynomial { .. } => params
                .iter()
                .enumerate()
                .map(|(k, a)| a * inverse.powi(k as i32))
                .sum(),
        }
    }

    /// Derivatives of [`CorrectionModel::evaluate`] with respect to each
    /// coefficient.
    pub fn gradient(&self, temperature: f64, params: &DVector<f64>) -> DVector<f64> {
        let inverse = 1.0 / temperature;
        match self {
            CorrectionModel::ExpDecay => {
                let decay = (-params[0] * inverse).exp();
                let linear = params[1] + params[2] * inverse;
                DVector::from_vec(vec![
                    -inverse * decay * linear,
                    decay - 1.0,
                    (decay - 1.0) * inverse,
                ])
            }
            CorrectionModel::InversePolynomial { degree } => {
                DVector::from_iterator(degree + 1, (0..=*degree).map(|k| inverse.powi(k as i32)))
            }
        }
    }

    /// Symbolic form with coefficient names, in the syntax of
    /// [`CorrectionModel::expression`].
    pub fn template(&self) -> String {
        match self {
            CorrectionModel::ExpDecay => "(EXP(-a0*T**(-1))-1)*(a1+a2*T**(-1))".to_string(),
            CorrectionModel::InversePolynomial { degree } => (0..=*degree)
                .map(|k| match k {
                    0 => "a0".to_string(),
                    _ => format!("a{k}*{}", inverse_power(k)),
                })
                .collect::<Vec<_>>()
                .join("+"),
        }
    }

    /// Expanded closed form with the coefficients substituted, written with
    /// `EXP` and `T**(-k)` so it can be pasted into a TDB function.
    pub fn expression(&self, params: &DVector<f64>) -> String {
        let terms = match self {
            CorrectionModel::ExpDecay => {
                let exponent = Term::new(-params[0], vec![inverse_power(1)]).render_single();
                let decay = format!("EXP({exponent})");
                vec![
                    Term::new(params[1], vec![decay.clone()]),
                    Term::new(params[2], vec![inverse_power(1), decay]),
                    Term::new(-params[1], Vec::new()),
                    Term::new(-params[2], vec![inverse_power(1)]),
                ]
            }
            CorrectionModel::InversePolynomial { .. } => params
                .iter()
                .enumerate()
                .map(|(k, a)| match k {
                    0 => Term::new(*a, Vec::new()),
                    _ => Term::new(*a, vec![inverse_power(k)]),
                })
                .collect(),
        };
        Term::render_sum(&terms)
    }
}

fn inverse_power(k: usize) -> String {
    format!("T**(-{k})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_matches_differences() {
        let models = [
            CorrectionModel::ExpDecay,
            CorrectionModel::InversePolynomial { degree: 3 },
        ];
        for model in models {
            let params = DVector::from_fn(model.num_parameters(), |k, _| 300.0 / (k as f64 + 1.0));
            let gradient = model.gradient(700.0, &params);
            for k in 0..params.len() {
                let h = 1e-6 * params[k].abs().max(1.0);
                let mut up = params.clone();
                up[k] += h;
                let mut down = params.clone();
                down[k] -= h;
                let numeric = (model.evaluate(700.0, &up) - model.evaluate(700.0, &down)) / (2.0 * h);
                assert!((numeric - gradient[k]).abs() < 1e-6 * gradient[k].abs().max(1.0));
            }
        }
    }

    #[test]
    fn templates_name_every_coefficient() {
        assert_eq!(
            CorrectionModel::InversePolynomial { degree: 2 }.template(),
            "a0+a1*T**(-1)+a2*T**(-2)"
        );
        assert!(CorrectionModel::ExpDecay.template().contains("a2"));
    }
}
