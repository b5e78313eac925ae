//! Mixture factors (unnormalized switching Gaussian factors)
//!
//! A [`GaussianMixtureFactor`] is the unnormalized counterpart of a mixture
//! conditional: a decision tree over discrete keys whose leaves pair a
//! Gaussian factor with a scalar offset. The scalar carries an
//! elimination-time normalization constant and must be added back into any
//! error computation.

use std::sync::Arc;

use crate::discrete::{AlgebraicDecisionTree, Assignment, DecisionTree, DiscreteKey, Key};
use crate::errors::InferenceError;
use crate::linear::{JacobianFactor, VectorValues};

use super::values::HybridValues;

/// One Gaussian factor plus scalar offset per discrete assignment
pub type MixtureFactors = DecisionTree<(Arc<JacobianFactor>, f64)>;

/// An unnormalized Gaussian factor whose parameters switch on discrete keys
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixtureFactor {
    /// Continuous variables the branch factors may mention
    continuous_keys: Vec<Key>,
    /// Discrete keys, canonical order
    discrete_keys: Vec<DiscreteKey>,
    factors: MixtureFactors,
}

impl GaussianMixtureFactor {
    /// Create a mixture factor from a tree of (factor, scalar) leaves
    ///
    /// Each leaf factor may only mention the declared continuous keys.
    pub fn new(
        continuous_keys: Vec<Key>,
        discrete_keys: Vec<DiscreteKey>,
        factors: MixtureFactors,
    ) -> Result<Self, InferenceError> {
        let mut discrete_keys = discrete_keys;
        discrete_keys.sort_by_key(|k| k.key);
        factors.check_cardinalities(&discrete_keys)?;

        let mut leaf_error: Option<InferenceError> = None;
        factors.visit_leaves(|(factor, _)| {
            if leaf_error.is_some() {
                return;
            }
            for key in factor.keys() {
                if !continuous_keys.contains(key) {
                    leaf_error = Some(InferenceError::InvalidLeaf {
                        description: format!(
                            "branch factor mentions undeclared continuous key {}",
                            key
                        ),
                    });
                    return;
                }
            }
        });
        if let Some(error) = leaf_error {
            return Err(error);
        }

        Ok(Self {
            continuous_keys,
            discrete_keys,
            factors,
        })
    }

    /// Create from a flat list of (factor, scalar) pairs
    ///
    /// The list is interpreted in the same nested order as
    /// [`Assignment::cartesian_product`] over `discrete_keys`; the length
    /// must equal the product of the cardinalities.
    pub fn from_list(
        continuous_keys: Vec<Key>,
        discrete_keys: Vec<DiscreteKey>,
        factors: Vec<(Arc<JacobianFactor>, f64)>,
    ) -> Result<Self, InferenceError> {
        let tree = MixtureFactors::from_table(&discrete_keys, &factors)?;
        Self::new(continuous_keys, discrete_keys, tree)
    }

    /// Continuous variables
    pub fn continuous_keys(&self) -> &[Key] {
        &self.continuous_keys
    }

    /// Discrete keys in canonical order
    pub fn discrete_keys(&self) -> &[DiscreteKey] {
        &self.discrete_keys
    }

    /// The underlying tree of (factor, scalar) leaves
    pub fn factors(&self) -> &MixtureFactors {
        &self.factors
    }

    /// The (factor, scalar) pair selected by one discrete assignment
    pub fn value(
        &self,
        assignment: &Assignment,
    ) -> Result<(Arc<JacobianFactor>, f64), InferenceError> {
        Ok(self.factors.evaluate(assignment)?.clone())
    }

    /// Per-branch error plus scalar, as a tree over the discrete keys
    pub fn error_tree(
        &self,
        values: &VectorValues,
    ) -> Result<AlgebraicDecisionTree, InferenceError> {
        self.factors
            .try_map(|(factor, scalar)| Ok(factor.error(values)? + scalar))
    }

    /// Error at the branch selected by the hybrid values' discrete part
    pub fn error(&self, values: &HybridValues) -> Result<f64, InferenceError> {
        let (factor, scalar) = self.value(values.discrete())?;
        Ok(factor.error(values.continuous())? + scalar)
    }
}
