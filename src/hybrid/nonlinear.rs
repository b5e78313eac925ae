//! Nonlinear mixture factors
//!
//! The pre-linearization counterpart of a Gaussian mixture factor: a
//! decision tree over discrete keys whose leaves pair a nonlinear factor
//! with a scalar. The scalar is a log-normalization term, so error
//! accounting uses `0.5·s²` (the quadratic form of negative log-likelihood
//! bookkeeping); linearization preserves the scalar untouched.

use std::fmt;
use std::sync::Arc;

use crate::discrete::{AlgebraicDecisionTree, Assignment, DecisionTree, DiscreteKey, Key};
use crate::errors::InferenceError;
use crate::linear::{JacobianFactor, VectorValues};

use super::mixture_factor::GaussianMixtureFactor;

/// A factor whose error and Jacobian depend nonlinearly on the values
pub trait NonlinearFactor: fmt::Debug {
    /// Continuous variables this factor touches
    fn keys(&self) -> &[Key];

    /// Number of residual rows on linearization
    fn dim(&self) -> usize;

    /// Negative log likelihood up to a constant
    fn error(&self, values: &VectorValues) -> Result<f64, InferenceError>;

    /// First-order approximation at the linearization point
    fn linearize(&self, values: &VectorValues) -> Result<JacobianFactor, InferenceError>;
}

/// A (nonlinear factor, scalar) leaf
///
/// Equality is by factor identity: trait objects have no structural
/// equality, and identical leaves come from shared handles anyway.
#[derive(Debug, Clone)]
pub struct NonlinearPair {
    /// The branch's measurement model
    pub factor: Arc<dyn NonlinearFactor>,
    /// Log-normalization term for this branch
    pub scalar: f64,
}

impl PartialEq for NonlinearPair {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.factor, &other.factor) && self.scalar == other.scalar
    }
}

/// Tree of per-mode nonlinear factors
pub type NonlinearFactors = DecisionTree<NonlinearPair>;

/// An unnormalized nonlinear factor whose model switches on discrete keys
#[derive(Debug, Clone, PartialEq)]
pub struct NonlinearMixtureFactor {
    continuous_keys: Vec<Key>,
    discrete_keys: Vec<DiscreteKey>,
    factors: NonlinearFactors,
}

impl NonlinearMixtureFactor {
    /// Create from a flat list of (factor, scalar) pairs
    ///
    /// The union of the branch factors' keys must equal the declared
    /// continuous keys, and the list length must match the product of the
    /// discrete cardinalities.
    pub fn from_list(
        continuous_keys: Vec<Key>,
        discrete_keys: Vec<DiscreteKey>,
        factors: Vec<(Arc<dyn NonlinearFactor>, f64)>,
    ) -> Result<Self, InferenceError> {
        let mut mentioned: Vec<Key> = factors
            .iter()
            .flat_map(|(factor, _)| factor.keys().iter().copied())
            .collect();
        mentioned.sort_unstable();
        mentioned.dedup();
        let mut declared = continuous_keys.clone();
        declared.sort_unstable();
        if mentioned != declared {
            return Err(InferenceError::Construction {
                description: format!(
                    "factors mention continuous keys {:?}, declared {:?}",
                    mentioned, declared
                ),
            });
        }

        let leaves: Vec<NonlinearPair> = factors
            .into_iter()
            .map(|(factor, scalar)| NonlinearPair { factor, scalar })
            .collect();
        let tree = NonlinearFactors::from_table(&discrete_keys, &leaves)?;
        let mut discrete_keys = discrete_keys;
        discrete_keys.sort_by_key(|k| k.key);
        Ok(Self {
            continuous_keys,
            discrete_keys,
            factors: tree,
        })
    }

    /// Continuous variables
    pub fn continuous_keys(&self) -> &[Key] {
        &self.continuous_keys
    }

    /// Discrete keys in canonical order
    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        &self.discrete_keys
    }

    /// The (factor, scalar) leaf selected by one discrete assignment
    pub fn value(&self, assignment: &Assignment) -> Result<NonlinearPair, InferenceError> {
        Ok(self.factors.evaluate(assignment)?.clone())
    }

    /// Per-branch error plus `0.5·scalar²`, as a tree over the discrete keys
    pub fn error_tree(
        &self,
        values: &VectorValues,
    ) -> Result<AlgebraicDecisionTree, InferenceError> {
        self.factors.try_map(|leaf| {
            Ok(leaf.factor.error(values)? + 0.5 * leaf.scalar * leaf.scalar)
        })
    }

    /// Error of the branch selected by `assignment`
    pub fn error(
        &self,
        values: &VectorValues,
        assignment: &Assignment,
    ) -> Result<f64, InferenceError> {
        let leaf = self.value(assignment)?;
        Ok(leaf.factor.error(values)? + 0.5 * leaf.scalar * leaf.scalar)
    }

    /// Linearize the branch selected by `assignment`
    pub fn linearize_at(
        &self,
        values: &VectorValues,
        assignment: &Assignment,
    ) -> Result<JacobianFactor, InferenceError> {
        self.value(assignment)?.factor.linearize(values)
    }

    /// Linearize every branch, preserving the scalars untouched
    pub fn linearize(
        &self,
        values: &VectorValues,
    ) -> Result<GaussianMixtureFactor, InferenceError> {
        let linearized = self.factors.try_map(|leaf| {
            Ok((Arc::new(leaf.factor.linearize(values)?), leaf.scalar))
        })?;
        GaussianMixtureFactor::new(
            self.continuous_keys.clone(),
            self.discrete_keys.clone(),
            linearized,
        )
    }
}
