//! Whitened Gaussian factors
//!
//! A [`JacobianFactor`] stores the already-whitened linear system
//! `‖Σ A_j x_j − b‖²`, so its error needs no noise model. A factor may have
//! no keys at all and still carry constant rows; that is how elimination
//! constants survive once every variable of a branch has been eliminated.

use nalgebra::{DMatrix, DVector};
use smallvec::SmallVec;

use super::vector_values::VectorValues;
use crate::discrete::Key;
use crate::errors::InferenceError;

/// A whitened linear factor `0.5 ‖Σ A_j x_j − b‖²`
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianFactor {
    keys: SmallVec<[Key; 4]>,
    blocks: Vec<DMatrix<f64>>,
    b: DVector<f64>,
}

impl JacobianFactor {
    /// Create a factor from per-key blocks and the right-hand side
    ///
    /// All blocks and `b` must have the same row count.
    pub fn new(
        terms: Vec<(Key, DMatrix<f64>)>,
        b: DVector<f64>,
    ) -> Result<Self, InferenceError> {
        let rows = b.len();
        let mut keys = SmallVec::new();
        let mut blocks = Vec::with_capacity(terms.len());
        for (key, block) in terms {
            if keys.contains(&key) {
                return Err(InferenceError::Construction {
                    description: format!("duplicate key {} in factor terms", key),
                });
            }
            if block.nrows() != rows {
                return Err(InferenceError::DimensionMismatch {
                    expected: rows,
                    actual: block.nrows(),
                    context: format!("rows of block for key {}", key),
                });
            }
            keys.push(key);
            blocks.push(block);
        }
        Ok(Self { keys, blocks, b })
    }

    /// Create a factor whitened by per-row standard deviations
    pub fn with_sigmas(
        terms: Vec<(Key, DMatrix<f64>)>,
        b: DVector<f64>,
        sigmas: &DVector<f64>,
    ) -> Result<Self, InferenceError> {
        if sigmas.len() != b.len() {
            return Err(InferenceError::DimensionMismatch {
                expected: b.len(),
                actual: sigmas.len(),
                context: "sigmas length".to_string(),
            });
        }
        if sigmas.iter().any(|&s| s <= 0.0) {
            return Err(InferenceError::Construction {
                description: "noise sigmas must be positive".to_string(),
            });
        }
        let whitened_terms = terms
            .into_iter()
            .map(|(key, mut block)| {
                for (mut row, &sigma) in block.row_iter_mut().zip(sigmas.iter()) {
                    row /= sigma;
                }
                (key, block)
            })
            .collect();
        let whitened_b =
            DVector::from_iterator(b.len(), b.iter().zip(sigmas.iter()).map(|(&v, &s)| v / s));
        Self::new(whitened_terms, whitened_b)
    }

    /// Single-key factor with isotropic noise `sigma`
    pub fn isotropic(
        key: Key,
        a: DMatrix<f64>,
        b: DVector<f64>,
        sigma: f64,
    ) -> Result<Self, InferenceError> {
        let sigmas = DVector::from_element(b.len(), sigma);
        Self::with_sigmas(vec![(key, a)], b, &sigmas)
    }

    /// A factor with no variables, carrying only constant rows
    pub fn constant(b: DVector<f64>) -> Self {
        Self {
            keys: SmallVec::new(),
            blocks: Vec::new(),
            b,
        }
    }

    /// Keys in term order
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// (key, block) pairs in term order
    pub fn terms(&self) -> impl Iterator<Item = (Key, &DMatrix<f64>)> {
        self.keys.iter().copied().zip(self.blocks.iter())
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.b.len()
    }

    /// Right-hand side
    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    /// Column dimension of one key's block
    pub fn dim_of(&self, key: Key) -> Option<usize> {
        self.keys
            .iter()
            .position(|&k| k == key)
            .map(|i| self.blocks[i].ncols())
    }

    /// Negative log density up to a constant: `0.5 ‖Σ A_j x_j − b‖²`
    pub fn error(&self, values: &VectorValues) -> Result<f64, InferenceError> {
        let mut residual = -self.b.clone();
        for (key, block) in self.terms() {
            let x = values.at(key)?;
            if x.len() != block.ncols() {
                return Err(InferenceError::DimensionMismatch {
                    expected: block.ncols(),
                    actual: x.len(),
                    context: format!("value dimension of key {}", key),
                });
            }
            residual += block * x;
        }
        Ok(0.5 * residual.norm_squared())
    }
}
