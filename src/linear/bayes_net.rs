//! Pure-continuous Gaussian Bayes nets
//!
//! An ordered sequence of Gaussian conditionals, first-eliminated first.
//! Back-substitution walks the sequence in reverse: the last conditional
//! has no unsolved parents.

use std::sync::Arc;

use rand::Rng;

use super::conditional::GaussianConditional;
use super::vector_values::VectorValues;
use crate::errors::InferenceError;

/// An ordered set of Gaussian conditionals in elimination order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaussianBayesNet {
    conditionals: Vec<Arc<GaussianConditional>>,
}

impl GaussianBayesNet {
    /// Create an empty net
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a conditional (elimination order)
    pub fn push(&mut self, conditional: Arc<GaussianConditional>) {
        self.conditionals.push(conditional);
    }

    /// Number of conditionals
    pub fn len(&self) -> usize {
        self.conditionals.len()
    }

    /// Whether the net is empty
    pub fn is_empty(&self) -> bool {
        self.conditionals.is_empty()
    }

    /// Conditional at position `i`
    pub fn at(&self, i: usize) -> Option<&Arc<GaussianConditional>> {
        self.conditionals.get(i)
    }

    /// Iterate in elimination order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<GaussianConditional>> {
        self.conditionals.iter()
    }

    /// Solve the whole net by back-substitution
    pub fn optimize(&self) -> Result<VectorValues, InferenceError> {
        let mut values = VectorValues::new();
        for conditional in self.conditionals.iter().rev() {
            let solution = conditional.solve(&values)?;
            values.extend(&solution);
        }
        Ok(values)
    }

    /// Ancestral sampling: parents first, children conditioned on them
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<VectorValues, InferenceError> {
        let mut values = VectorValues::new();
        for conditional in self.conditionals.iter().rev() {
            let sampled = conditional.sample(&values, rng)?;
            values.extend(&sampled);
        }
        Ok(values)
    }

    /// Total negative log density up to normalization constants
    pub fn error(&self, values: &VectorValues) -> Result<f64, InferenceError> {
        let mut total = 0.0;
        for conditional in &self.conditionals {
            total += conditional.error(values)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    #[test]
    fn test_optimize_chain() {
        // x0 | x1: x0 = x1 + 1;  x1: N(2, 1)
        let child = GaussianConditional::from_mean_and_stddev_with_parent(
            0,
            DMatrix::identity(1, 1),
            1,
            DVector::from_element(1, 1.0),
            1.0,
        )
        .unwrap();
        let root =
            GaussianConditional::from_mean_and_stddev(1, DVector::from_element(1, 2.0), 1.0)
                .unwrap();

        let mut net = GaussianBayesNet::new();
        net.push(Arc::new(child));
        net.push(Arc::new(root));

        let solution = net.optimize().unwrap();
        assert!((solution.at(1).unwrap()[0] - 2.0).abs() < 1e-12);
        assert!((solution.at(0).unwrap()[0] - 3.0).abs() < 1e-12);

        // the optimum has zero error
        assert!(net.error(&solution).unwrap() < 1e-12);
    }
}
