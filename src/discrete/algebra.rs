//! Ring operations on real-valued decision trees
//!
//! An [`AlgebraicDecisionTree`] is a [`DecisionTree`] over `f64` leaves.
//! The ring ops combine two trees pointwise over the union of their
//! variables; `safe_div` resolves 0/0 to 0 because probability tables may
//! legitimately contain exact-zero entries for pruned branches.

use super::decision_tree::DecisionTree;
use crate::errors::InferenceError;

/// Decision tree with real-valued leaves
pub type AlgebraicDecisionTree = DecisionTree<f64>;

/// Division that maps 0/0 to 0
#[inline]
pub fn safe_divide(a: f64, b: f64) -> f64 {
    if a == 0.0 && b == 0.0 {
        0.0
    } else {
        a / b
    }
}

impl DecisionTree<f64> {
    /// Pointwise sum of two trees
    pub fn add(&self, other: &Self) -> Result<Self, InferenceError> {
        self.apply(other, |a, b| a + b)
    }

    /// Pointwise product of two trees
    pub fn mul(&self, other: &Self) -> Result<Self, InferenceError> {
        self.apply(other, |a, b| a * b)
    }

    /// Pointwise maximum of two trees
    pub fn max(&self, other: &Self) -> Result<Self, InferenceError> {
        self.apply(other, |a, b| f64::max(*a, *b))
    }

    /// Pointwise safe division: 0/0 resolves to 0
    pub fn safe_div(&self, other: &Self) -> Result<Self, InferenceError> {
        self.apply(other, |a, b| safe_divide(*a, *b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrete::{Assignment, DiscreteKey};

    #[test]
    fn test_safe_divide() {
        assert_eq!(safe_divide(0.0, 0.0), 0.0);
        assert_eq!(safe_divide(1.0, 2.0), 0.5);
        assert_eq!(safe_divide(0.0, 2.0), 0.0);
        assert!(safe_divide(1.0, 0.0).is_infinite());
    }

    #[test]
    fn test_ring_ops() {
        let key = [DiscreteKey::new(0, 2)];
        let a = AlgebraicDecisionTree::from_table(&key, &[1.0, 0.0]).unwrap();
        let b = AlgebraicDecisionTree::from_table(&key, &[4.0, 0.0]).unwrap();

        let zero = Assignment::from_pairs([(0, 1)]);
        let one = Assignment::from_pairs([(0, 0)]);

        assert_eq!(*a.add(&b).unwrap().evaluate(&one).unwrap(), 5.0);
        assert_eq!(*a.mul(&b).unwrap().evaluate(&one).unwrap(), 4.0);
        assert_eq!(*a.max(&b).unwrap().evaluate(&one).unwrap(), 4.0);
        assert_eq!(*a.safe_div(&b).unwrap().evaluate(&one).unwrap(), 0.25);
        // 0/0 is 0, not NaN
        assert_eq!(*a.safe_div(&b).unwrap().evaluate(&zero).unwrap(), 0.0);
    }
}
