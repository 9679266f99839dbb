use cvm_cluster::ClusterModel;
use cvm_core::{BOLTZMANN_EV, LOG_EPSILON};
use nalgebra::{DMatrix, DVector};

/// CVM free energy of a cluster model at a fixed temperature.
///
/// `F(x) = mults_eci·x + kB·T · w·ρlnρ(V·x + ε)` where `w` are the
/// Kikuchi-Barker weighted configuration multiplicities.
#[derive(Debug, Clone, Copy)]
pub struct FreeEnergyFunctional<'a> {
    model: &'a ClusterModel,
    temperature: f64,
}

impl<'a> FreeEnergyFunctional<'a> {
    /// Functional of `model` at `temperature` kelvin.
    pub fn new(model: &'a ClusterModel, temperature: f64) -> Self {
        Self { model, temperature }
    }

    /// Temperature in kelvin.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Underlying model.
    pub fn model(&self) -> &'a ClusterModel {
        self.model
    }

    fn kt(&self) -> f64 {
        BOLTZMANN_EV * self.temperature
    }

    /// Interaction energy `mults_eci·x`.
    pub fn energy(&self, x: &DVector<f64>) -> f64 {
        self.model.mults_eci().dot(x)
    }

    /// Entropic contribution `w·ρlnρ(V·x + ε)`, without the `kB·T` factor.
    pub fn negative_entropy(&self, x: &DVector<f64>) -> f64 {
        let rho = self.model.probabilities(x);
        self.model
            .config_weights()
            .iter()
            .zip(rho.iter())
            .map(|(w, p)| w * rho_log_rho(p + LOG_EPSILON))
            .sum()
    }

    /// Free energy.
    pub fn value(&self, x: &DVector<f64>) -> f64 {
        self.energy(x) + self.kt() * self.negative_entropy(x)
    }

    /// Closed-form gradient `mults_eci + kB·T · Vᵀ (w ⊙ (1 + ln|V·x + ε|))`.
    pub fn gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        let rho = self.model.probabilities(x);
        let weighted = DVector::from_iterator(
            rho.len(),
            self.model
                .config_weights()
                .iter()
                .zip(rho.iter())
                .map(|(w, p)| w * (1.0 + (p + LOG_EPSILON).abs().ln())),
        );
        self.model.mults_eci() + self.model.vmatrix().tr_mul(&weighted) * self.kt()
    }

    /// Closed-form Hessian `kB·T · Vᵀ diag(w / (V·x)) V`.
    ///
    /// Undefined when a probability is exactly zero; callers keep trial points
    /// strictly inside the feasible region.
    pub fn hessian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let vmatrix = self.model.vmatrix();
        let rho = self.model.probabilities(x);
        let mut scaled = vmatrix.clone();
        for (row, (w, p)) in self.model.config_weights().iter().zip(rho.iter()).enumerate() {
            let factor = w / p;
            scaled.row_mut(row).scale_mut(factor);
        }
        vmatrix.tr_mul(&scaled) * self.kt()
    }

    /// Three-point central-difference gradient.
    pub fn numerical_gradient(&self, x: &DVector<f64>) -> DVector<f64> {
        let step_base = f64::EPSILON.cbrt();
        let mut probe = x.clone();
        DVector::from_iterator(
            x.len(),
            (0..x.len()).map(|idx| {
                let h = step_base * x[idx].abs().max(1.0);
                probe[idx] = x[idx] + h;
                let forward = self.value(&probe);
                probe[idx] = x[idx] - h;
                let backward = self.value(&probe);
                probe[idx] = x[idx];
                (forward - backward) / (2.0 * h)
            }),
        )
    }
}

/// `ρ·ln|ρ|`, continuous at zero.
pub fn rho_log_rho(rho: f64) -> f64 {
    if rho == 0.0 {
        0.0
    } else {
        rho * rho.abs().ln()
    }
}
