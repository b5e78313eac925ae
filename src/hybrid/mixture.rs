//! Mixture conditionals (switching linear-Gaussian conditionals)
//!
//! A [`GaussianMixture`] is a conditional over continuous frontal variables
//! given continuous parents and discrete parents: a decision tree over the
//! discrete parents whose leaves are Gaussian conditionals. Every branch
//! models the same continuous variables and differs only in numeric
//! parameters; a pruned branch is an explicit `None` leaf, which is normal
//! data rather than an error.

use std::sync::Arc;

use crate::discrete::{
    AlgebraicDecisionTree, Assignment, DecisionTree, DiscreteKey, DiscretePotential, Key,
};
use crate::errors::InferenceError;
use crate::linear::{GaussianConditional, JacobianFactor, VectorValues};

use super::mixture_factor::GaussianMixtureFactor;

/// Error substituted for pruned branches in tree-valued results, large
/// enough that min/max searches never select them
pub const PRUNED_BRANCH_ERROR: f64 = 1e50;

/// Tree of per-mode Gaussian conditionals
pub type MixtureConditionals = DecisionTree<Option<Arc<GaussianConditional>>>;

/// A conditional whose Gaussian parameters switch on discrete parents
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixture {
    /// Continuous frontal variables, shared by every branch
    frontals: Vec<Key>,
    /// Continuous parent variables, shared by every branch
    parents: Vec<Key>,
    /// Discrete parents, canonical order
    discrete_parents: Vec<DiscreteKey>,
    conditionals: MixtureConditionals,
}

impl GaussianMixture {
    /// Create a mixture conditional from a tree of per-mode conditionals
    ///
    /// Every non-pruned leaf must model exactly the declared frontal and
    /// parent variables; a leaf that disagrees is an `InvalidLeaf` error.
    pub fn new(
        frontals: Vec<Key>,
        parents: Vec<Key>,
        discrete_parents: Vec<DiscreteKey>,
        conditionals: MixtureConditionals,
    ) -> Result<Self, InferenceError> {
        let mut discrete_parents = discrete_parents;
        discrete_parents.sort_by_key(|k| k.key);
        conditionals.check_cardinalities(&discrete_parents)?;

        let mut leaf_error: Option<InferenceError> = None;
        conditionals.visit_leaves(|leaf| {
            if leaf_error.is_some() {
                return;
            }
            if let Some(conditional) = leaf {
                let leaf_frontals: Vec<Key> = conditional.frontal_keys().collect();
                let leaf_parents: Vec<Key> = conditional.parent_keys().collect();
                if leaf_frontals != frontals || leaf_parents != parents {
                    leaf_error = Some(InferenceError::InvalidLeaf {
                        description: format!(
                            "branch models variables {:?}|{:?}, mixture declares {:?}|{:?}",
                            leaf_frontals, leaf_parents, frontals, parents
                        ),
                    });
                }
            }
        });
        if let Some(error) = leaf_error {
            return Err(error);
        }

        Ok(Self {
            frontals,
            parents,
            discrete_parents,
            conditionals,
        })
    }

    /// Create from a flat list of conditionals, one per discrete assignment
    ///
    /// The list is interpreted in the same nested order as
    /// [`Assignment::cartesian_product`] over `discrete_parents`.
    pub fn from_list(
        frontals: Vec<Key>,
        parents: Vec<Key>,
        discrete_parents: Vec<DiscreteKey>,
        conditionals: Vec<Arc<GaussianConditional>>,
    ) -> Result<Self, InferenceError> {
        let leaves: Vec<Option<Arc<GaussianConditional>>> =
            conditionals.into_iter().map(Some).collect();
        let tree = MixtureConditionals::from_table(&discrete_parents, &leaves)?;
        Self::new(frontals, parents, discrete_parents, tree)
    }

    /// Continuous frontal variables
    pub fn frontals(&self) -> &[Key] {
        &self.frontals
    }

    /// Continuous parent variables
    pub fn continuous_parents(&self) -> &[Key] {
        &self.parents
    }

    /// Discrete parents in canonical order
    pub fn discrete_parents(&self) -> &[DiscreteKey] {
        &self.discrete_parents
    }

    /// The underlying tree of conditionals
    pub fn conditionals(&self) -> &MixtureConditionals {
        &self.conditionals
    }

    /// Number of non-pruned components
    pub fn nr_components(&self) -> usize {
        let mut total = 0;
        self.conditionals.visit_leaves(|leaf| {
            if leaf.is_some() {
                total += 1;
            }
        });
        total
    }

    /// The Gaussian conditional selected by one discrete assignment
    ///
    /// `None` means that branch was pruned.
    pub fn component(
        &self,
        assignment: &Assignment,
    ) -> Result<Option<Arc<GaussianConditional>>, InferenceError> {
        Ok(self.conditionals.evaluate(assignment)?.clone())
    }

    /// Per-branch error as a tree over the discrete parents
    ///
    /// Pruned branches get [`PRUNED_BRANCH_ERROR`] so downstream searches
    /// avoid them without special-casing.
    pub fn error_tree(
        &self,
        values: &VectorValues,
    ) -> Result<AlgebraicDecisionTree, InferenceError> {
        self.conditionals.try_map(|leaf| match leaf {
            Some(conditional) => conditional.error(values),
            None => Ok(PRUNED_BRANCH_ERROR),
        })
    }

    /// Error of the single branch selected by `assignment`
    pub fn error(
        &self,
        values: &VectorValues,
        assignment: &Assignment,
    ) -> Result<f64, InferenceError> {
        match self.component(assignment)? {
            Some(conditional) => conditional.error(values),
            None => Err(InferenceError::PrunedBranch {
                context: "error query on a pruned mixture branch".to_string(),
            }),
        }
    }

    /// Decide whether the branch at `assignment` survives pruning
    fn branch_survives(
        &self,
        potential: &DiscretePotential,
        extra_keys: &[DiscreteKey],
        assignment: &Assignment,
    ) -> Result<bool, InferenceError> {
        if extra_keys.is_empty() {
            return Ok(potential.value(assignment)? != 0.0);
        }
        // the branch survives if any extension over the extra keys is
        // possible; it is pruned only when all extensions are zero
        for extension in Assignment::cartesian_product(extra_keys) {
            let mut augmented = assignment.clone();
            augmented.extend(&extension);
            if potential.value(&augmented)? > 0.0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Prune branches that the potential assigns zero probability
    ///
    /// Supported when the potential's key set equals the mixture's discrete
    /// parents, or is a strict superset of them (a branch then survives if
    /// any extension over the extra keys is nonzero). Any other key-set
    /// relation cannot prove a branch impossible, and the mixture is
    /// returned unchanged.
    pub fn prune(&self, potential: &DiscretePotential) -> Result<Self, InferenceError> {
        for key in &self.discrete_parents {
            if let Some(cardinality) = potential.cardinality(key.key) {
                if cardinality != key.cardinality {
                    return Err(InferenceError::DimensionMismatch {
                        expected: key.cardinality,
                        actual: cardinality,
                        context: format!("cardinality of shared key {}", key.key),
                    });
                }
            }
        }

        let covered = self
            .discrete_parents
            .iter()
            .all(|key| potential.cardinality(key.key).is_some());
        if !covered {
            return Ok(self.clone());
        }
        let extra_keys: Vec<DiscreteKey> = potential
            .keys()
            .iter()
            .filter(|key| !self.discrete_parents.iter().any(|k| k.key == key.key))
            .copied()
            .collect();

        // rebuilt per full assignment: a collapsed leaf may span assignments
        // the potential treats differently, so leaf-by-leaf transforms
        // cannot satisfy the "null exactly where zero" contract
        let pruned = MixtureConditionals::try_build(&self.discrete_parents, |assignment| {
            if self.branch_survives(potential, &extra_keys, assignment)? {
                self.conditionals.evaluate(assignment).map(|leaf| leaf.clone())
            } else {
                Ok(None)
            }
        })?;

        let before = self.nr_components();
        let result = Self {
            frontals: self.frontals.clone(),
            parents: self.parents.clone(),
            discrete_parents: self.discrete_parents.clone(),
            conditionals: pruned,
        };
        log::debug!(
            "pruned mixture over {} discrete parents: {} -> {} components",
            result.discrete_parents.len(),
            before,
            result.nr_components()
        );
        Ok(result)
    }

    /// The likelihood of observed frontal values, as a mixture factor over
    /// the continuous and discrete parents
    ///
    /// Each branch contributes its conditional's likelihood factor plus the
    /// branch's negative log-normalization constant as the leaf scalar, so
    /// branch weights stay comparable. Pruned branches become empty factors
    /// with [`PRUNED_BRANCH_ERROR`] as scalar.
    pub fn likelihood(
        &self,
        frontal_values: &VectorValues,
    ) -> Result<GaussianMixtureFactor, InferenceError> {
        let factors = self.conditionals.try_map(|leaf| match leaf {
            Some(conditional) => {
                let factor = conditional.likelihood(frontal_values)?;
                Ok((
                    Arc::new(factor),
                    -conditional.log_normalization_constant(),
                ))
            }
            None => Ok((
                Arc::new(JacobianFactor::constant(nalgebra::DVector::zeros(0))),
                PRUNED_BRANCH_ERROR,
            )),
        })?;
        GaussianMixtureFactor::new(self.parents.clone(), self.discrete_parents.clone(), factors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    fn binary_mixture() -> (GaussianMixture, DiscreteKey) {
        let mode = DiscreteKey::new(10, 2);
        let c0 = Arc::new(
            GaussianConditional::from_mean_and_stddev_with_parent(
                0,
                DMatrix::identity(2, 2),
                1,
                DVector::from_vec(vec![0.0, 0.0]),
                1.0,
            )
            .unwrap(),
        );
        let c1 = Arc::new(
            GaussianConditional::from_mean_and_stddev_with_parent(
                0,
                DMatrix::identity(2, 2),
                1,
                DVector::from_vec(vec![2.0, 2.0]),
                1.0,
            )
            .unwrap(),
        );
        let mixture =
            GaussianMixture::from_list(vec![0], vec![1], vec![mode], vec![c0, c1]).unwrap();
        (mixture, mode)
    }

    #[test]
    fn test_component_lookup() {
        let (mixture, mode) = binary_mixture();
        let assignment = Assignment::from_pairs([(mode.key, 1)]);
        let component = mixture.component(&assignment).unwrap().unwrap();
        let parents: Vec<Key> = component.parent_keys().collect();
        assert_eq!(parents, vec![1]);
        assert_eq!(mixture.nr_components(), 2);
    }

    #[test]
    fn test_error_matches_branch() {
        let (mixture, mode) = binary_mixture();
        let values = VectorValues::from_pairs([
            (0, DVector::from_vec(vec![1.0, 1.0])),
            (1, DVector::from_vec(vec![0.0, 0.0])),
        ]);
        // branch 0: x - y - 0 = [1,1]; branch 1: x - y - 2 = [-1,-1]
        let a0 = Assignment::from_pairs([(mode.key, 0)]);
        let a1 = Assignment::from_pairs([(mode.key, 1)]);
        assert!((mixture.error(&values, &a0).unwrap() - 1.0).abs() < 1e-12);
        assert!((mixture.error(&values, &a1).unwrap() - 1.0).abs() < 1e-12);

        let tree = mixture.error_tree(&values).unwrap();
        assert_eq!(
            *tree.evaluate(&a0).unwrap(),
            mixture.error(&values, &a0).unwrap()
        );
        assert_eq!(
            *tree.evaluate(&a1).unwrap(),
            mixture.error(&values, &a1).unwrap()
        );
    }

    #[test]
    fn test_invariant_rejects_mismatched_leaf() {
        let mode = DiscreteKey::new(10, 2);
        let good = Arc::new(
            GaussianConditional::from_mean_and_stddev(0, DVector::zeros(1), 1.0).unwrap(),
        );
        // models variable 5, not variable 0
        let bad = Arc::new(
            GaussianConditional::from_mean_and_stddev(5, DVector::zeros(1), 1.0).unwrap(),
        );
        let result = GaussianMixture::from_list(vec![0], vec![], vec![mode], vec![good, bad]);
        assert!(matches!(result, Err(InferenceError::InvalidLeaf { .. })));
    }

    #[test]
    fn test_prune_equal_keys() {
        let (mixture, mode) = binary_mixture();
        let potential = DiscretePotential::from_table(&[mode], &[0.0, 1.0]).unwrap();
        let pruned = mixture.prune(&potential).unwrap();

        let a0 = Assignment::from_pairs([(mode.key, 0)]);
        let a1 = Assignment::from_pairs([(mode.key, 1)]);
        assert!(pruned.component(&a0).unwrap().is_none());
        assert!(pruned.component(&a1).unwrap().is_some());
        assert_eq!(pruned.nr_components(), 1);

        // pruned branches answer point queries with an error
        let values = VectorValues::from_pairs([
            (0, DVector::zeros(2)),
            (1, DVector::zeros(2)),
        ]);
        assert!(matches!(
            pruned.error(&values, &a0),
            Err(InferenceError::PrunedBranch { .. })
        ));
        // and tree queries with the sentinel
        let tree = pruned.error_tree(&values).unwrap();
        assert_eq!(*tree.evaluate(&a0).unwrap(), PRUNED_BRANCH_ERROR);
    }

    #[test]
    fn test_prune_is_idempotent() {
        let (mixture, mode) = binary_mixture();
        let potential = DiscretePotential::from_table(&[mode], &[0.0, 1.0]).unwrap();
        let once = mixture.prune(&potential).unwrap();
        let twice = once.prune(&potential).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_prune_superset_keys() {
        let (mixture, mode) = binary_mixture();
        let extra = DiscreteKey::new(11, 2);
        // mode=0 is zero under both extensions; mode=1 has one live extension
        let potential =
            DiscretePotential::from_table(&[mode, extra], &[0.0, 0.0, 0.0, 0.3]).unwrap();
        let pruned = mixture.prune(&potential).unwrap();
        let a0 = Assignment::from_pairs([(mode.key, 0)]);
        let a1 = Assignment::from_pairs([(mode.key, 1)]);
        assert!(pruned.component(&a0).unwrap().is_none());
        assert!(pruned.component(&a1).unwrap().is_some());
    }

    #[test]
    fn test_prune_incomparable_keys_passes_through() {
        let (mixture, _) = binary_mixture();
        // potential over a different variable entirely
        let other = DiscreteKey::new(99, 2);
        let potential = DiscretePotential::from_table(&[other], &[0.0, 1.0]).unwrap();
        let pruned = mixture.prune(&potential).unwrap();
        assert_eq!(pruned, mixture);
    }

    #[test]
    fn test_likelihood_preserves_error() {
        let (mixture, mode) = binary_mixture();
        let frontal = VectorValues::from_pairs([(0, DVector::from_vec(vec![1.0, 1.0]))]);
        let factor = mixture.likelihood(&frontal).unwrap();

        let parent = VectorValues::from_pairs([(1, DVector::from_vec(vec![0.5, 0.5]))]);
        let mut all = parent.clone();
        all.extend(&frontal);

        for value in 0..2 {
            let assignment = Assignment::from_pairs([(mode.key, value)]);
            let (leaf, scalar) = factor.value(&assignment).unwrap();
            let component = mixture.component(&assignment).unwrap().unwrap();
            let expected =
                component.error(&all).unwrap() - component.log_normalization_constant();
            let actual = leaf.error(&parent).unwrap() + scalar;
            assert!((actual - expected).abs() < 1e-12);
        }
    }
}
