//! Discrete potentials (probability/weight tables)
//!
//! A [`DiscretePotential`] is an [`AlgebraicDecisionTree`] together with an
//! explicit cardinality record for each of its keys. The record is needed
//! because the tree alone cannot recover the cardinality of variables that
//! never branch (e.g. constant factors).

use super::algebra::{safe_divide, AlgebraicDecisionTree};
use super::assignment::Assignment;
use super::key::{DiscreteKey, Key};
use crate::errors::InferenceError;

/// How eliminated variables are combined away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Sum over eliminated values (sum-product / marginalization)
    Sum,
    /// Maximize over eliminated values (max-product / MPE queries)
    Max,
}

/// A discrete weight table over a set of discrete variables
#[derive(Debug, Clone, PartialEq)]
pub struct DiscretePotential {
    /// Keys in canonical (ascending id) order
    keys: Vec<DiscreteKey>,
    tree: AlgebraicDecisionTree,
}

impl DiscretePotential {
    /// Create a potential from keys and a tree over (a subset of) those keys
    ///
    /// The recorded cardinalities must agree with every branch node's child
    /// count; disagreement is a `DimensionMismatch`.
    pub fn new(
        keys: &[DiscreteKey],
        tree: AlgebraicDecisionTree,
    ) -> Result<Self, InferenceError> {
        let mut sorted: Vec<DiscreteKey> = keys.to_vec();
        sorted.sort_by_key(|k| k.key);
        for pair in sorted.windows(2) {
            if pair[0].key == pair[1].key {
                if pair[0].cardinality != pair[1].cardinality {
                    return Err(InferenceError::DimensionMismatch {
                        expected: pair[0].cardinality,
                        actual: pair[1].cardinality,
                        context: format!("cardinality of key {}", pair[0].key),
                    });
                }
            }
        }
        sorted.dedup_by_key(|k| k.key);
        tree.check_cardinalities(&sorted)?;
        Ok(Self { keys: sorted, tree })
    }

    /// Create a potential from a flat value table
    ///
    /// The table is interpreted with the first declared key varying slowest,
    /// matching [`Assignment::cartesian_product`].
    pub fn from_table(keys: &[DiscreteKey], values: &[f64]) -> Result<Self, InferenceError> {
        let tree = AlgebraicDecisionTree::from_table(keys, values)?;
        Self::new(keys, tree)
    }

    /// A constant potential over the given keys
    pub fn constant(keys: &[DiscreteKey], value: f64) -> Result<Self, InferenceError> {
        Self::new(keys, AlgebraicDecisionTree::leaf(value))
    }

    /// Keys in canonical order
    pub fn keys(&self) -> &[DiscreteKey] {
        &self.keys
    }

    /// Cardinality of one key, if it belongs to this potential
    pub fn cardinality(&self, key: Key) -> Option<usize> {
        self.keys.iter().find(|k| k.key == key).map(|k| k.cardinality)
    }

    /// The underlying decision tree
    pub fn tree(&self) -> &AlgebraicDecisionTree {
        &self.tree
    }

    /// Direct tree evaluation
    pub fn value(&self, assignment: &Assignment) -> Result<f64, InferenceError> {
        self.tree.evaluate(assignment).copied()
    }

    /// Check that cardinalities of keys shared with `other` agree
    fn check_compatible(&self, other: &Self) -> Result<(), InferenceError> {
        for key in &self.keys {
            if let Some(cardinality) = other.cardinality(key.key) {
                if cardinality != key.cardinality {
                    return Err(InferenceError::DimensionMismatch {
                        expected: key.cardinality,
                        actual: cardinality,
                        context: format!("cardinality of shared key {}", key.key),
                    });
                }
            }
        }
        Ok(())
    }

    /// Union of both key sets, canonical order
    fn union_keys(&self, other: &Self) -> Vec<DiscreteKey> {
        let mut keys = self.keys.clone();
        for key in &other.keys {
            if !keys.iter().any(|k| k.key == key.key) {
                keys.push(*key);
            }
        }
        keys.sort_by_key(|k| k.key);
        keys
    }

    /// Pointwise product over the union of both key sets
    pub fn multiply(&self, other: &Self) -> Result<Self, InferenceError> {
        self.check_compatible(other)?;
        let keys = self.union_keys(other);
        Self::new(&keys, self.tree.mul(&other.tree)?)
    }

    /// Pointwise safe division over the union of both key sets (0/0 is 0)
    pub fn divide(&self, other: &Self) -> Result<Self, InferenceError> {
        self.check_compatible(other)?;
        let keys = self.union_keys(other);
        Self::new(&keys, self.tree.apply(&other.tree, |a, b| safe_divide(*a, *b))?)
    }

    /// Eliminate the named frontal variables, combining their values away
    ///
    /// For every combination of frontal values the corresponding subtree
    /// over the remaining (separator) variables is combined via `op`.
    pub fn marginalize(
        &self,
        frontals: &[Key],
        op: Reduction,
    ) -> Result<Self, InferenceError> {
        let frontal_keys: Vec<DiscreteKey> = frontals
            .iter()
            .map(|&key| {
                self.keys
                    .iter()
                    .find(|k| k.key == key)
                    .copied()
                    .ok_or_else(|| InferenceError::Construction {
                        description: format!("marginalized key {} is not in the potential", key),
                    })
            })
            .collect::<Result<_, _>>()?;
        let remaining: Vec<DiscreteKey> = self
            .keys
            .iter()
            .filter(|k| !frontals.contains(&k.key))
            .copied()
            .collect();

        let mut combined: Option<AlgebraicDecisionTree> = None;
        for assignment in Assignment::cartesian_product(&frontal_keys) {
            let slice = self.tree.restrict(&assignment)?;
            combined = Some(match combined {
                None => slice,
                Some(acc) => match op {
                    Reduction::Sum => acc.add(&slice)?,
                    Reduction::Max => acc.max(&slice)?,
                },
            });
        }
        match combined {
            Some(tree) => Self::new(&remaining, tree),
            // no frontal combinations means no frontal keys at all
            None => Err(InferenceError::Construction {
                description: "marginalizing over a zero-cardinality key".to_string(),
            }),
        }
    }

    /// Eliminate the first `count` keys in canonical order
    pub fn marginalize_first(&self, count: usize, op: Reduction) -> Result<Self, InferenceError> {
        if count > self.keys.len() {
            return Err(InferenceError::Construction {
                description: format!(
                    "cannot marginalize {} of {} keys",
                    count,
                    self.keys.len()
                ),
            });
        }
        let frontals: Vec<Key> = self.keys[..count].iter().map(|k| k.key).collect();
        self.marginalize(&frontals, op)
    }

    /// Full expansion into (assignment, value) pairs
    ///
    /// Canonical key order, first key varying slowest. Intended for small
    /// tables; the caller owns the combinatorial blow-up.
    pub fn enumerate(&self) -> Result<Vec<(Assignment, f64)>, InferenceError> {
        Assignment::cartesian_product(&self.keys)
            .into_iter()
            .map(|assignment| {
                let value = self.value(&assignment)?;
                Ok((assignment, value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_key_potential() -> DiscretePotential {
        let keys = [DiscreteKey::new(0, 2), DiscreteKey::new(1, 3)];
        DiscretePotential::from_table(&keys, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap()
    }

    #[test]
    fn test_value() {
        let potential = two_key_potential();
        let assignment = Assignment::from_pairs([(0, 1), (1, 2)]);
        assert_eq!(potential.value(&assignment).unwrap(), 6.0);
    }

    #[test]
    fn test_multiply_is_pointwise() {
        let a = two_key_potential();
        let b = DiscretePotential::from_table(&[DiscreteKey::new(1, 3)], &[2.0, 0.5, 1.0]).unwrap();
        let product = a.multiply(&b).unwrap();
        for (assignment, value) in a.enumerate().unwrap() {
            let expected = value * b.value(&assignment).unwrap();
            assert_eq!(product.value(&assignment).unwrap(), expected);
        }
    }

    #[test]
    fn test_multiply_cardinality_conflict() {
        let a = two_key_potential();
        let b = DiscretePotential::from_table(&[DiscreteKey::new(1, 2)], &[1.0, 2.0]).unwrap();
        assert!(matches!(
            a.multiply(&b),
            Err(InferenceError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_safe_division_law() {
        let keys = [DiscreteKey::new(0, 2)];
        let a = DiscretePotential::from_table(&keys, &[0.0, 3.0]).unwrap();
        let b = DiscretePotential::from_table(&keys, &[0.0, 2.0]).unwrap();
        let quotient = a.divide(&b).unwrap();
        let zero = Assignment::from_pairs([(0, 0)]);
        let one = Assignment::from_pairs([(0, 1)]);
        assert_eq!(quotient.value(&zero).unwrap(), 0.0);
        assert_eq!(quotient.value(&one).unwrap(), 1.5);
    }

    #[test]
    fn test_marginalize_sum() {
        let potential = two_key_potential();
        let marginal = potential.marginalize(&[0], Reduction::Sum).unwrap();
        assert_eq!(marginal.keys().len(), 1);
        for v1 in 0..3 {
            let assignment = Assignment::from_pairs([(1, v1)]);
            let expected: f64 = (0..2)
                .map(|v0| {
                    potential
                        .value(&Assignment::from_pairs([(0, v0), (1, v1)]))
                        .unwrap()
                })
                .sum();
            assert_eq!(marginal.value(&assignment).unwrap(), expected);
        }
    }

    #[test]
    fn test_marginalize_max() {
        let potential = two_key_potential();
        let marginal = potential.marginalize(&[1], Reduction::Max).unwrap();
        // max over key 1 rows: [3, 6]
        assert_eq!(
            marginal.value(&Assignment::from_pairs([(0, 0)])).unwrap(),
            3.0
        );
        assert_eq!(
            marginal.value(&Assignment::from_pairs([(0, 1)])).unwrap(),
            6.0
        );
    }

    #[test]
    fn test_marginalize_first() {
        let potential = two_key_potential();
        let by_name = potential.marginalize(&[0], Reduction::Sum).unwrap();
        let by_count = potential.marginalize_first(1, Reduction::Sum).unwrap();
        assert_eq!(by_name, by_count);
    }

    #[test]
    fn test_enumerate_order() {
        let potential = two_key_potential();
        let entries = potential.enumerate().unwrap();
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0].1, 1.0);
        assert_eq!(entries[5].1, 6.0);
    }

    #[test]
    fn test_constant_keeps_cardinalities() {
        let keys = [DiscreteKey::new(2, 4)];
        let constant = DiscretePotential::constant(&keys, 0.25).unwrap();
        assert_eq!(constant.cardinality(2), Some(4));
        let assignment = Assignment::from_pairs([(2, 3)]);
        assert_eq!(constant.value(&assignment).unwrap(), 0.25);
    }
}
