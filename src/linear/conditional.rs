//! Linear-Gaussian conditional densities
//!
//! A [`GaussianConditional`] is `P(x | y) ∝ exp(−0.5 ‖R x + Σ S_j y_j − d‖²)`
//! with `R` upper triangular, as produced by QR elimination. The whitened
//! form means the normalization constant is determined by `R` alone.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use smallvec::SmallVec;
use std::f64::consts::PI;

use super::factor::JacobianFactor;
use super::vector_values::VectorValues;
use crate::discrete::Key;
use crate::errors::InferenceError;

/// A conditional Gaussian `P(frontals | parents)` in square-root form
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianConditional {
    /// Frontal keys with their dimensions, in elimination order
    frontals: SmallVec<[(Key, usize); 2]>,
    /// Parent keys with their dimensions
    parents: SmallVec<[(Key, usize); 4]>,
    /// Upper-triangular square-root information matrix
    r: DMatrix<f64>,
    /// One block per parent, same row count as `r`
    s: Vec<DMatrix<f64>>,
    d: DVector<f64>,
}

impl GaussianConditional {
    /// Create a conditional from its square-root pieces
    pub fn new(
        frontals: Vec<(Key, usize)>,
        r: DMatrix<f64>,
        parents: Vec<(Key, DMatrix<f64>)>,
        d: DVector<f64>,
    ) -> Result<Self, InferenceError> {
        let n = r.nrows();
        if r.ncols() != n {
            return Err(InferenceError::DimensionMismatch {
                expected: n,
                actual: r.ncols(),
                context: "columns of R".to_string(),
            });
        }
        let frontal_dim: usize = frontals.iter().map(|(_, dim)| dim).sum();
        if frontal_dim != n {
            return Err(InferenceError::DimensionMismatch {
                expected: n,
                actual: frontal_dim,
                context: "total frontal dimension".to_string(),
            });
        }
        if d.len() != n {
            return Err(InferenceError::DimensionMismatch {
                expected: n,
                actual: d.len(),
                context: "length of d".to_string(),
            });
        }
        let mut parent_keys = SmallVec::new();
        let mut s = Vec::with_capacity(parents.len());
        for (key, block) in parents {
            if block.nrows() != n {
                return Err(InferenceError::DimensionMismatch {
                    expected: n,
                    actual: block.nrows(),
                    context: format!("rows of parent block for key {}", key),
                });
            }
            parent_keys.push((key, block.ncols()));
            s.push(block);
        }
        Ok(Self {
            frontals: frontals.into_iter().collect(),
            parents: parent_keys,
            r,
            s,
            d,
        })
    }

    /// `P(x) = N(mean, sigma² I)` with no parents
    pub fn from_mean_and_stddev(
        key: Key,
        mean: DVector<f64>,
        sigma: f64,
    ) -> Result<Self, InferenceError> {
        if sigma <= 0.0 {
            return Err(InferenceError::Construction {
                description: "stddev must be positive".to_string(),
            });
        }
        let n = mean.len();
        let r = DMatrix::identity(n, n) / sigma;
        let d = mean / sigma;
        Self::new(vec![(key, n)], r, vec![], d)
    }

    /// `P(x | y) = N(A y + b, sigma² I)`
    pub fn from_mean_and_stddev_with_parent(
        key: Key,
        a: DMatrix<f64>,
        parent: Key,
        b: DVector<f64>,
        sigma: f64,
    ) -> Result<Self, InferenceError> {
        if sigma <= 0.0 {
            return Err(InferenceError::Construction {
                description: "stddev must be positive".to_string(),
            });
        }
        let n = b.len();
        if a.nrows() != n {
            return Err(InferenceError::DimensionMismatch {
                expected: n,
                actual: a.nrows(),
                context: "rows of A".to_string(),
            });
        }
        let r = DMatrix::identity(n, n) / sigma;
        let s = -a / sigma;
        let d = b / sigma;
        Self::new(vec![(key, n)], r, vec![(parent, s)], d)
    }

    /// Frontal keys in order
    pub fn frontal_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.frontals.iter().map(|&(key, _)| key)
    }

    /// Parent keys in order
    pub fn parent_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.parents.iter().map(|&(key, _)| key)
    }

    /// Total frontal dimension
    pub fn dim(&self) -> usize {
        self.r.nrows()
    }

    /// Stack the frontal values of `values` into one vector
    fn stack_frontals(&self, values: &VectorValues) -> Result<DVector<f64>, InferenceError> {
        let mut stacked = DVector::zeros(self.dim());
        let mut offset = 0;
        for &(key, dim) in &self.frontals {
            let x = values.at(key)?;
            if x.len() != dim {
                return Err(InferenceError::DimensionMismatch {
                    expected: dim,
                    actual: x.len(),
                    context: format!("value dimension of key {}", key),
                });
            }
            stacked.rows_mut(offset, dim).copy_from(x);
            offset += dim;
        }
        Ok(stacked)
    }

    /// `d − Σ S_j y_j` for the given parent values
    fn parent_rhs(&self, values: &VectorValues) -> Result<DVector<f64>, InferenceError> {
        let mut rhs = self.d.clone();
        for (&(key, dim), block) in self.parents.iter().zip(&self.s) {
            let y = values.at(key)?;
            if y.len() != dim {
                return Err(InferenceError::DimensionMismatch {
                    expected: dim,
                    actual: y.len(),
                    context: format!("value dimension of key {}", key),
                });
            }
            rhs -= block * y;
        }
        Ok(rhs)
    }

    /// Negative log density up to the normalization constant:
    /// `0.5 ‖R x + Σ S_j y_j − d‖²`
    pub fn error(&self, values: &VectorValues) -> Result<f64, InferenceError> {
        let x = self.stack_frontals(values)?;
        let rhs = self.parent_rhs(values)?;
        let residual = &self.r * x - rhs;
        Ok(0.5 * residual.norm_squared())
    }

    /// Solve for the frontal variables by back-substitution
    ///
    /// Returns the frontal solutions given already-solved parent values.
    pub fn solve(&self, values: &VectorValues) -> Result<VectorValues, InferenceError> {
        let rhs = self.parent_rhs(values)?;
        let x = self
            .r
            .solve_upper_triangular(&rhs)
            .ok_or_else(|| InferenceError::Singular {
                context: "back-substitution through R".to_string(),
            })?;
        Ok(self.split_frontals(x))
    }

    /// Sample the frontal variables given assigned parent values
    pub fn sample<R: Rng + ?Sized>(
        &self,
        values: &VectorValues,
        rng: &mut R,
    ) -> Result<VectorValues, InferenceError> {
        let mut rhs = self.parent_rhs(values)?;
        for i in 0..rhs.len() {
            let noise: f64 = rng.sample(StandardNormal);
            rhs[i] += noise;
        }
        let x = self
            .r
            .solve_upper_triangular(&rhs)
            .ok_or_else(|| InferenceError::Singular {
                context: "back-substitution through R".to_string(),
            })?;
        Ok(self.split_frontals(x))
    }

    /// Split a stacked frontal vector back into per-key values
    fn split_frontals(&self, stacked: DVector<f64>) -> VectorValues {
        let mut values = VectorValues::new();
        let mut offset = 0;
        for &(key, dim) in &self.frontals {
            values.insert(key, stacked.rows(offset, dim).into_owned());
            offset += dim;
        }
        values
    }

    /// The likelihood of observed frontal values, as a factor on the parents
    ///
    /// `L(y) ∝ exp(−0.5 ‖Σ S_j y_j − (d − R x)‖²)`.
    pub fn likelihood(
        &self,
        frontal_values: &VectorValues,
    ) -> Result<JacobianFactor, InferenceError> {
        let x = self.stack_frontals(frontal_values)?;
        let b = &self.d - &self.r * x;
        let terms = self
            .parents
            .iter()
            .zip(&self.s)
            .map(|(&(key, _), block)| (key, block.clone()))
            .collect();
        JacobianFactor::new(terms, b)
    }

    /// `log k` with `k = |det R| / (2π)^(n/2)`, the density normalizer
    ///
    /// Branches of a mixture with different noise models have different
    /// constants; carrying them is what keeps branch posteriors comparable.
    pub fn log_normalization_constant(&self) -> f64 {
        let n = self.dim() as f64;
        let log_det: f64 = self.r.diagonal().iter().map(|v| v.abs().ln()).sum();
        log_det - 0.5 * n * (2.0 * PI).ln()
    }
}
