use cvm_cluster::ClusterModel;
use cvm_core::{CvmError, ErrorInfo, PROBABILITY_EPSILON};
use nalgebra::{DMatrix, DVector};

/// Ball constraint `radius − ‖x − center‖ ≥ 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormConstraint {
    /// Disordered reference.
    pub center: DVector<f64>,
    /// Half the ordered-disordered distance.
    pub radius: f64,
}

impl NormConstraint {
    /// Constraint value; negative outside the ball.
    pub fn value(&self, x: &DVector<f64>) -> f64 {
        self.radius - (x - &self.center).norm()
    }
}

/// Bounds and inequality constraints on the correlation vector.
///
/// Cluster 0 is fixed at 1, point clusters at their disordered values and
/// every other correlation lies in `[-1, 1]`. The probabilities `V·x` must be
/// non-negative.
#[derive(Debug, Clone)]
pub struct FeasibleRegion {
    lower: DVector<f64>,
    upper: DVector<f64>,
    fixed: Vec<bool>,
    vmatrix: DMatrix<f64>,
    norm: Option<NormConstraint>,
}

impl FeasibleRegion {
    /// Builds the region for `model`. The norm constraint needs the ordered
    /// correlations to be set.
    pub fn build(model: &ClusterModel, norm_constrained: bool) -> Result<Self, CvmError> {
        let n = model.num_clusters();
        let disordered = model.disordered_correlations();
        let mut lower = DVector::from_element(n, -1.0);
        let mut upper = DVector::from_element(n, 1.0);
        let mut fixed = vec![false; n];
        for (idx, info) in model.clusters().iter().enumerate() {
            let pinned = match info.arity {
                0 => Some(1.0),
                1 => Some(disordered[idx]),
                _ => None,
            };
            if let Some(value) = pinned {
                lower[idx] = value;
                upper[idx] = value;
                fixed[idx] = true;
            }
        }

        let norm = if norm_constrained {
            let radius = model.order_disorder_distance().ok_or_else(|| {
                CvmError::Model(
                    ErrorInfo::new(
                        "ordered-unset",
                        "norm constraint requires the ordered correlations",
                    )
                    .with_hint("solve the ordered state before building the search region"),
                )
            })? / 2.0;
            Some(NormConstraint {
                center: disordered.clone(),
                radius,
            })
        } else {
            None
        };

        Ok(Self {
            lower,
            upper,
            fixed,
            vmatrix: model.vmatrix().clone(),
            norm,
        })
    }

    /// Number of correlations.
    pub fn dimension(&self) -> usize {
        self.fixed.len()
    }

    /// Lower bounds.
    pub fn lower(&self) -> &DVector<f64> {
        &self.lower
    }

    /// Upper bounds.
    pub fn upper(&self) -> &DVector<f64> {
        &self.upper
    }

    /// Whether coordinate `idx` is pinned.
    pub fn is_fixed(&self, idx: usize) -> bool {
        self.fixed[idx]
    }

    /// Indices of the coordinates the optimiser may move.
    pub fn free_indices(&self) -> Vec<usize> {
        (0..self.dimension()).filter(|&idx| !self.fixed[idx]).collect()
    }

    /// The probability-mapping matrix `V`.
    pub fn vmatrix(&self) -> &DMatrix<f64> {
        &self.vmatrix
    }

    /// Optional ball constraint.
    pub fn norm_constraint(&self) -> Option<&NormConstraint> {
        self.norm.as_ref()
    }

    /// Copy of `x` with pinned coordinates set to their bound.
    pub fn project_fixed(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut out = x.clone();
        for (idx, &pinned) in self.fixed.iter().enumerate() {
            if pinned {
                out[idx] = self.lower[idx];
            }
        }
        out
    }

    /// Linear constraint values `V·x`.
    pub fn constraint_values(&self, x: &DVector<f64>) -> DVector<f64> {
        &self.vmatrix * x
    }

    /// Largest violation over bounds, `V·x ≥ 0` and the norm constraint.
    pub fn max_violation(&self, x: &DVector<f64>) -> f64 {
        let bounds = x
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .map(|(v, (lo, hi))| (lo - v).max(v - hi))
            .fold(0.0_f64, f64::max);
        let linear = self
            .constraint_values(x)
            .iter()
            .map(|rho| -rho)
            .fold(0.0_f64, f64::max);
        let norm = self
            .norm
            .as_ref()
            .map_or(0.0, |constraint| (-constraint.value(x)).max(0.0));
        bounds.max(linear).max(norm)
    }

    /// Whether `x` lies strictly inside the barrier domain: every probability
    /// positive, free coordinates inside `(-1, 1)` and the norm constraint
    /// strictly satisfied. Pinned coordinates must sit on their value.
    pub fn is_strictly_interior(&self, x: &DVector<f64>) -> bool {
        let coordinates = (0..self.dimension()).all(|idx| {
            if self.fixed[idx] {
                x[idx] == self.lower[idx]
            } else {
                x[idx] > self.lower[idx] && x[idx] < self.upper[idx]
            }
        });
        coordinates
            && self.constraint_values(x).iter().all(|&rho| rho > 0.0)
            && self
                .norm
                .as_ref()
                .map_or(true, |constraint| constraint.value(x) > 0.0)
    }

    /// Post-hoc check that every probability lies in `[0, 1]` up to
    /// [`PROBABILITY_EPSILON`]. The upper bound is not enforced during the
    /// search.
    pub fn check_probabilities(&self, x: &DVector<f64>) -> bool {
        self.constraint_values(x)
            .iter()
            .all(|&rho| rho >= -PROBABILITY_EPSILON && rho <= 1.0 + PROBABILITY_EPSILON)
    }

    /// Moves `start` towards `anchor` until it is strictly interior.
    ///
    /// Returns `None` when even points very close to the anchor are not
    /// interior, which means the anchor itself is not.
    pub fn pull_inside(&self, start: &DVector<f64>, anchor: &DVector<f64>) -> Option<DVector<f64>> {
        let start = self.project_fixed(start);
        let anchor = self.project_fixed(anchor);
        let mut theta = 1.0;
        for _ in 0..200 {
            let candidate = &anchor + (&start - &anchor) * theta;
            if self.is_strictly_interior(&candidate) {
                return Some(candidate);
            }
            theta *= 0.9;
        }
        self.is_strictly_interior(&anchor).then_some(anchor)
    }
}
