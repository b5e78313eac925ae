//! Hybrid factor graphs and hybrid elimination
//!
//! [`eliminate_hybrid`] generalizes variable elimination to mixed clusters:
//! eliminating a continuous variable whose cluster touches discrete keys
//! runs one Gaussian elimination per discrete assignment, producing a
//! mixture conditional and a residual mixture factor; eliminating a
//! discrete variable delegates to discrete elimination. The keys of one
//! cluster must be eliminated continuous-before-discrete; that ordering is
//! the caller's contract, made convenient by
//! [`HybridGaussianFactorGraph::hybrid_ordering`].

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::discrete::{
    eliminate_discrete, DecisionTree, DiscreteKey, DiscretePotential, Key, Reduction,
};
use crate::errors::InferenceError;
use crate::linear::elimination::eliminate_with_separator;
use crate::linear::{GaussianConditional, JacobianFactor, VectorValues};

use super::bayes_net::HybridBayesNet;
use super::conditional::HybridConditional;
use super::factor::HybridFactor;
use super::mixture::GaussianMixture;
use super::mixture_factor::GaussianMixtureFactor;

/// One discrete branch of a merged factor cluster
#[derive(Debug, Clone, PartialEq)]
struct GraphLeaf {
    factors: Vec<Arc<JacobianFactor>>,
    scalar: f64,
}

/// One discrete branch after Gaussian elimination
///
/// `conditional` is `None` for branches that were pruned upstream and never
/// constrained the frontal variables.
#[derive(Debug, Clone, PartialEq)]
struct EliminatedLeaf {
    conditional: Option<Arc<GaussianConditional>>,
    factor: Arc<JacobianFactor>,
    scalar: f64,
}

/// A container of hybrid factors
#[derive(Debug, Clone, Default)]
pub struct HybridGaussianFactorGraph {
    factors: Vec<HybridFactor>,
}

impl HybridGaussianFactorGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add any hybrid factor
    pub fn push(&mut self, factor: HybridFactor) {
        self.factors.push(factor);
    }

    /// Add a pure continuous factor
    pub fn add_jacobian(&mut self, factor: JacobianFactor) {
        self.push(HybridFactor::Gaussian(Arc::new(factor)));
    }

    /// Add a pure discrete factor
    pub fn add_potential(&mut self, potential: DiscretePotential) {
        self.push(HybridFactor::Discrete(potential));
    }

    /// Add a mixture factor
    pub fn add_mixture_factor(&mut self, factor: GaussianMixtureFactor) {
        self.push(HybridFactor::Mixture(factor));
    }

    /// Number of factors
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// Whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Factor at position `i`
    pub fn at(&self, i: usize) -> Option<&HybridFactor> {
        self.factors.get(i)
    }

    /// Iterate over the factors
    pub fn iter(&self) -> impl Iterator<Item = &HybridFactor> {
        self.factors.iter()
    }

    /// All continuous keys, ascending
    pub fn continuous_keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .factors
            .iter()
            .flat_map(|f| f.continuous_keys())
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// All discrete keys, ascending
    pub fn discrete_keys(&self) -> Vec<DiscreteKey> {
        let mut keys: Vec<DiscreteKey> = self
            .factors
            .iter()
            .flat_map(|f| f.discrete_keys())
            .collect();
        keys.sort_by_key(|k| k.key);
        keys.dedup_by_key(|k| k.key);
        keys
    }

    /// An ordering that eliminates every continuous key before any discrete
    /// key, ascending within each block
    pub fn hybrid_ordering(&self) -> Vec<Key> {
        let mut ordering = self.continuous_keys();
        ordering.extend(self.discrete_keys().iter().map(|k| k.key));
        ordering
    }

    /// Eliminate every key of `ordering` in turn, producing a Bayes net
    ///
    /// The naive sequential driver: gather the factors touching the key,
    /// eliminate, keep the conditional, put the residual factor back.
    pub fn eliminate_sequential(
        &self,
        ordering: &[Key],
        mode: Reduction,
    ) -> Result<HybridBayesNet, InferenceError> {
        let mut remaining = self.factors.clone();
        let mut net = HybridBayesNet::new();

        for &key in ordering {
            let (cluster, rest): (Vec<HybridFactor>, Vec<HybridFactor>) =
                remaining.into_iter().partition(|f| f.involves(key));
            if cluster.is_empty() {
                return Err(InferenceError::Construction {
                    description: format!("no factor involves eliminated key {}", key),
                });
            }
            debug!("eliminating key {} from {} factors", key, cluster.len());

            let (conditional, residual) = eliminate_hybrid(&cluster, &[key], mode)?;
            net.push(conditional);

            remaining = rest;
            let keep = match &residual {
                HybridFactor::Gaussian(f) => !f.keys().is_empty(),
                HybridFactor::Discrete(p) => !p.keys().is_empty(),
                HybridFactor::Mixture(m) => {
                    !m.continuous_keys().is_empty() || !m.discrete_keys().is_empty()
                }
            };
            if keep {
                remaining.push(residual);
            }
        }

        if !remaining.is_empty() {
            debug!("{} constant factors left after elimination", remaining.len());
        }
        Ok(net)
    }
}

/// Eliminate `keys` from a cluster of hybrid factors
///
/// The keys must be all-continuous or all-discrete. Continuous elimination
/// with discrete keys in the cluster produces a
/// ([`GaussianMixture`], [`GaussianMixtureFactor`]) pair; without discrete
/// keys, a plain Gaussian pair. Discrete elimination delegates to
/// [`eliminate_discrete`] with the requested `mode` (sum- or max-product)
/// and requires every continuous variable of the cluster to be eliminated
/// already.
pub fn eliminate_hybrid(
    factors: &[HybridFactor],
    keys: &[Key],
    mode: Reduction,
) -> Result<(HybridConditional, HybridFactor), InferenceError> {
    if factors.is_empty() {
        return Err(InferenceError::Construction {
            description: "eliminating from an empty cluster".to_string(),
        });
    }

    let discrete_keys = collect_discrete_keys(factors)?;
    let discrete_count = keys
        .iter()
        .filter(|key| discrete_keys.contains_key(*key))
        .count();
    if discrete_count == 0 {
        eliminate_continuous(factors, keys, &discrete_keys)
    } else if discrete_count == keys.len() {
        eliminate_discrete_cluster(factors, keys, &discrete_keys, mode)
    } else {
        Err(InferenceError::Construction {
            description: "cannot eliminate continuous and discrete keys together".to_string(),
        })
    }
}

/// Union of the cluster's discrete keys, with cardinality agreement checks
fn collect_discrete_keys(
    factors: &[HybridFactor],
) -> Result<BTreeMap<Key, usize>, InferenceError> {
    let mut keys = BTreeMap::new();
    for factor in factors {
        for key in factor.discrete_keys() {
            match keys.get(&key.key) {
                None => {
                    keys.insert(key.key, key.cardinality);
                }
                Some(&cardinality) if cardinality != key.cardinality => {
                    return Err(InferenceError::DimensionMismatch {
                        expected: cardinality,
                        actual: key.cardinality,
                        context: format!("cardinality of key {}", key.key),
                    });
                }
                _ => {}
            }
        }
    }
    Ok(keys)
}

/// Column dimensions of every continuous key across the whole cluster
fn collect_continuous_dims(
    factors: &[HybridFactor],
) -> Result<BTreeMap<Key, usize>, InferenceError> {
    let mut dims: BTreeMap<Key, usize> = BTreeMap::new();
    let mut record = |key: Key, ncols: usize| -> Result<(), InferenceError> {
        match dims.get(&key) {
            None => {
                dims.insert(key, ncols);
                Ok(())
            }
            Some(&dim) if dim != ncols => Err(InferenceError::DimensionMismatch {
                expected: dim,
                actual: ncols,
                context: format!("column dimension of key {}", key),
            }),
            _ => Ok(()),
        }
    };

    for factor in factors {
        match factor {
            HybridFactor::Gaussian(f) => {
                for (key, block) in f.terms() {
                    record(key, block.ncols())?;
                }
            }
            HybridFactor::Mixture(m) => {
                let mut leaf_error = None;
                m.factors().visit_leaves(|(f, _)| {
                    if leaf_error.is_some() {
                        return;
                    }
                    for (key, block) in f.terms() {
                        if let Err(error) = record(key, block.ncols()) {
                            leaf_error = Some(error);
                            return;
                        }
                    }
                });
                if let Some(error) = leaf_error {
                    return Err(error);
                }
            }
            HybridFactor::Discrete(_) => {}
        }
    }
    Ok(dims)
}

/// Stack a branch's factors into one factor over the separator, unchanged
///
/// Used for branches that do not constrain the eliminated variables: there
/// is nothing to eliminate, but their rows still weigh the branch.
fn stack_unchanged(
    factors: &[Arc<JacobianFactor>],
    separator: &[Key],
    dims: &BTreeMap<Key, usize>,
) -> Result<JacobianFactor, InferenceError> {
    let total_rows: usize = factors.iter().map(|f| f.rows()).sum();
    let mut terms: Vec<(Key, DMatrix<f64>)> = separator
        .iter()
        .map(|&key| {
            let dim = dims.get(&key).copied().unwrap_or(0);
            (key, DMatrix::zeros(total_rows, dim))
        })
        .collect();
    let mut b = DVector::zeros(total_rows);
    let mut row = 0;
    for factor in factors {
        for (key, block) in factor.terms() {
            let index = separator.iter().position(|&k| k == key).ok_or_else(|| {
                InferenceError::Construction {
                    description: format!("factor key {} missing from separator layout", key),
                }
            })?;
            terms[index]
                .1
                .view_mut((row, 0), (factor.rows(), block.ncols()))
                .copy_from(block);
        }
        b.rows_mut(row, factor.rows()).copy_from(factor.b());
        row += factor.rows();
    }
    JacobianFactor::new(terms, b)
}

/// Continuous elimination: one Gaussian elimination per discrete branch
fn eliminate_continuous(
    factors: &[HybridFactor],
    keys: &[Key],
    discrete_keys: &BTreeMap<Key, usize>,
) -> Result<(HybridConditional, HybridFactor), InferenceError> {
    let mut gaussians: Vec<Arc<JacobianFactor>> = Vec::new();
    let mut mixtures: Vec<&GaussianMixtureFactor> = Vec::new();
    for factor in factors {
        match factor {
            HybridFactor::Gaussian(f) => gaussians.push(f.clone()),
            HybridFactor::Mixture(m) => mixtures.push(m),
            HybridFactor::Discrete(_) => {
                return Err(InferenceError::Construction {
                    description: "discrete factor in a continuous elimination cluster"
                        .to_string(),
                })
            }
        }
    }

    let dims = collect_continuous_dims(factors)?;
    let separator: Vec<Key> = dims
        .keys()
        .copied()
        .filter(|key| !keys.contains(key))
        .collect();

    // merge all branch factor lists into one tree over the discrete keys;
    // each mixture leaf contributes a one-element collection
    let mut tree = DecisionTree::leaf(GraphLeaf {
        factors: gaussians,
        scalar: 0.0,
    });
    for mixture in &mixtures {
        let singleton = mixture.factors().map(|(factor, scalar)| GraphLeaf {
            factors: vec![factor.clone()],
            scalar: *scalar,
        });
        tree = tree.apply(&singleton, |a, b| {
            let mut merged = a.factors.clone();
            merged.extend(b.factors.iter().cloned());
            GraphLeaf {
                factors: merged,
                scalar: a.scalar + b.scalar,
            }
        })?;
    }

    // one Gaussian elimination per branch, all over the same separator
    let eliminated = tree.try_map(|leaf| {
        let constrains_frontal = leaf
            .factors
            .iter()
            .any(|f| keys.iter().any(|key| f.keys().contains(key)));
        if !constrains_frontal {
            // pruned upstream: nothing determines the frontal variables in
            // this branch, so it stays pruned through elimination
            let residual = stack_unchanged(&leaf.factors, &separator, &dims)?;
            return Ok(EliminatedLeaf {
                conditional: None,
                factor: Arc::new(residual),
                scalar: leaf.scalar,
            });
        }
        let (conditional, residual) =
            eliminate_with_separator(&leaf.factors, keys, &separator, &dims)?;
        let conditional = Arc::new(conditional);
        let scalar = leaf.scalar + conditional.log_normalization_constant();
        Ok::<_, InferenceError>(EliminatedLeaf {
            conditional: Some(conditional),
            factor: Arc::new(residual),
            scalar,
        })
    })?;

    let parent_keys: Vec<DiscreteKey> = discrete_keys
        .iter()
        .map(|(&key, &cardinality)| DiscreteKey::new(key, cardinality))
        .collect();

    if parent_keys.is_empty() {
        // pure continuous cluster: the tree is a single leaf
        let leaf = eliminated.evaluate(&crate::discrete::Assignment::new())?;
        let conditional = leaf
            .conditional
            .clone()
            .ok_or_else(|| InferenceError::Singular {
                context: "cluster does not constrain the eliminated variables".to_string(),
            })?;
        return Ok((
            HybridConditional::Gaussian(conditional),
            HybridFactor::Gaussian(leaf.factor.clone()),
        ));
    }

    let conditionals = eliminated.map(|leaf| leaf.conditional.clone());
    let mixture = GaussianMixture::new(
        keys.to_vec(),
        separator.clone(),
        parent_keys.clone(),
        conditionals,
    )?;

    let residuals = eliminated.map(|leaf| (leaf.factor.clone(), leaf.scalar));
    let residual = GaussianMixtureFactor::new(separator, parent_keys, residuals)?;

    Ok((
        HybridConditional::Mixture(mixture),
        HybridFactor::Mixture(residual),
    ))
}

/// Discrete elimination: fold fully-eliminated mixture branches into
/// potentials and delegate
fn eliminate_discrete_cluster(
    factors: &[HybridFactor],
    keys: &[Key],
    discrete_keys: &BTreeMap<Key, usize>,
    mode: Reduction,
) -> Result<(HybridConditional, HybridFactor), InferenceError> {
    let empty = VectorValues::new();
    let mut potentials: Vec<DiscretePotential> = Vec::new();
    for factor in factors {
        match factor {
            HybridFactor::Discrete(potential) => potentials.push(potential.clone()),
            HybridFactor::Mixture(mixture) if mixture.continuous_keys().is_empty() => {
                // each branch is a constant by now; its weight is the
                // exponentiated negative total error
                let tree = mixture
                    .factors()
                    .try_map(|(f, s)| Ok::<_, InferenceError>((-(f.error(&empty)? + s)).exp()))?;
                potentials.push(DiscretePotential::new(mixture.discrete_keys(), tree)?);
            }
            _ => {
                return Err(InferenceError::Construction {
                    description:
                        "cluster still has continuous variables; eliminate those first"
                            .to_string(),
                })
            }
        }
    }

    let frontals: Vec<DiscreteKey> = keys
        .iter()
        .map(|key| {
            discrete_keys
                .get(key)
                .map(|&cardinality| DiscreteKey::new(*key, cardinality))
                .ok_or_else(|| InferenceError::Construction {
                    description: format!("eliminated key {} is absent from the cluster", key),
                })
        })
        .collect::<Result<_, _>>()?;

    let (conditional, residual) = eliminate_discrete(&potentials, &frontals, mode)?;
    Ok((
        HybridConditional::Discrete(conditional),
        HybridFactor::Discrete(residual),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrete::Assignment;
    use nalgebra::{DMatrix, DVector};

    const X0: Key = 0;
    const C0: Key = 100;

    /// Graph with two unit-noise observations of x0 and a binary mixture
    /// factor selecting between them
    fn mixed_graph() -> (HybridGaussianFactorGraph, DiscreteKey) {
        let mode = DiscreteKey::new(C0, 2);
        let jf1 = JacobianFactor::new(
            vec![(X0, DMatrix::identity(3, 3))],
            DVector::zeros(3),
        )
        .unwrap();
        let jf2 = JacobianFactor::new(
            vec![(X0, DMatrix::identity(3, 3))],
            DVector::from_element(3, 1.0),
        )
        .unwrap();
        let mixture = GaussianMixtureFactor::from_list(
            vec![X0],
            vec![mode],
            vec![
                (Arc::new(jf1.clone()), 0.0),
                (Arc::new(jf2.clone()), 0.0),
            ],
        )
        .unwrap();

        let mut graph = HybridGaussianFactorGraph::new();
        graph.add_jacobian(jf1);
        graph.add_jacobian(jf2);
        graph.add_mixture_factor(mixture);
        (graph, mode)
    }

    #[test]
    fn test_eliminate_sequential_structure() {
        let (graph, _) = mixed_graph();
        let ordering = graph.hybrid_ordering();
        assert_eq!(ordering, vec![X0, C0]);

        let net = graph.eliminate_sequential(&ordering, Reduction::Sum).unwrap();
        assert_eq!(net.len(), 2);
        let mixture = net.at(0).unwrap().as_mixture().unwrap();
        assert_eq!(mixture.frontals(), &[X0]);
        assert!(mixture.continuous_parents().is_empty());
        assert!(net.at(1).unwrap().as_discrete().is_some());
    }

    #[test]
    fn test_optimize_follows_discrete_evidence() {
        let (mut graph, mode) = mixed_graph();
        // hard evidence: mode 0 is impossible
        graph.add_potential(DiscretePotential::from_table(&[mode], &[0.0, 1.0]).unwrap());

        let ordering = graph.hybrid_ordering();
        let net = graph.eliminate_sequential(&ordering, Reduction::Sum).unwrap();
        let solution = net.optimize().unwrap();
        assert_eq!(solution.discrete().get(C0), Some(1));
    }

    #[test]
    fn test_eliminate_continuous_keeps_branch_errors() {
        let (graph, mode) = mixed_graph();
        let cluster: Vec<HybridFactor> = graph.iter().cloned().collect();
        let (conditional, residual) =
            eliminate_hybrid(&cluster, &[X0], Reduction::Sum).unwrap();

        let mixture = conditional.as_mixture().unwrap();
        let residual = match residual {
            HybridFactor::Mixture(m) => m,
            other => panic!("expected mixture residual, got {:?}", other),
        };

        // per branch, conditional + residual error must reproduce the
        // cluster error at arbitrary values (scalars cancel per branch when
        // comparing against the raw cluster plus the branch constant)
        let values = VectorValues::from_pairs([(X0, DVector::from_vec(vec![0.3, 0.7, -0.1]))]);
        for value in 0..2 {
            let assignment = Assignment::from_pairs([(C0, value)]);
            let mut cluster_error = 0.0;
            for factor in graph.iter() {
                match factor {
                    HybridFactor::Gaussian(f) => cluster_error += f.error(&values).unwrap(),
                    HybridFactor::Mixture(m) => {
                        let (f, s) = m.value(&assignment).unwrap();
                        cluster_error += f.error(&values).unwrap() + s;
                    }
                    HybridFactor::Discrete(_) => {}
                }
            }

            let component = mixture.component(&assignment).unwrap().unwrap();
            let (res_factor, res_scalar) = residual.value(&assignment).unwrap();
            let factored = component.error(&values).unwrap()
                - component.log_normalization_constant()
                + res_factor.error(&values).unwrap()
                + res_scalar;
            // the conditional's own constant appears once in the residual
            // scalar and once negated above, so both sides agree
            assert!((cluster_error - factored).abs() < 1e-9);
        }
    }

    #[test]
    fn test_mixed_keys_rejected() {
        let (graph, _) = mixed_graph();
        let cluster: Vec<HybridFactor> = graph.iter().cloned().collect();
        assert!(matches!(
            eliminate_hybrid(&cluster, &[X0, C0], Reduction::Sum),
            Err(InferenceError::Construction { .. })
        ));
    }

    #[test]
    fn test_discrete_before_continuous_rejected() {
        let (graph, _) = mixed_graph();
        let cluster: Vec<HybridFactor> = graph.iter().cloned().collect();
        assert!(matches!(
            eliminate_hybrid(&cluster, &[C0], Reduction::Sum),
            Err(InferenceError::Construction { .. })
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let (graph, _) = mixed_graph();
        let ordering = vec![X0, C0, 999];
        assert!(matches!(
            graph.eliminate_sequential(&ordering, Reduction::Sum),
            Err(InferenceError::Construction { .. })
        ));
    }

    #[test]
    fn test_pruned_branch_survives_elimination() {
        // P(z | x, m): measurement of x under a binary mode, mode 0 pruned
        let mode = DiscreteKey::new(C0, 2);
        let z = 5;
        let c0 = Arc::new(
            GaussianConditional::from_mean_and_stddev_with_parent(
                z,
                DMatrix::identity(1, 1),
                X0,
                DVector::zeros(1),
                0.5,
            )
            .unwrap(),
        );
        let c1 = Arc::new(
            GaussianConditional::from_mean_and_stddev_with_parent(
                z,
                DMatrix::identity(1, 1),
                X0,
                DVector::zeros(1),
                3.0,
            )
            .unwrap(),
        );
        let mixture =
            GaussianMixture::from_list(vec![z], vec![X0], vec![mode], vec![c0, c1]).unwrap();
        let dead_mode = DiscretePotential::from_table(&[mode], &[0.0, 1.0]).unwrap();
        let pruned = mixture.prune(&dead_mode).unwrap();

        let measurement = VectorValues::from_pairs([(z, DVector::from_element(1, 1.0))]);
        let likelihood = pruned.likelihood(&measurement).unwrap();

        let mut graph = HybridGaussianFactorGraph::new();
        graph.add_mixture_factor(likelihood);

        let net = graph
            .eliminate_sequential(&[X0, C0], Reduction::Sum)
            .unwrap();
        let posterior = net.at(0).unwrap().as_mixture().unwrap();

        // the pruned branch stays pruned through elimination
        let dead = Assignment::from_pairs([(C0, 0)]);
        let alive = Assignment::from_pairs([(C0, 1)]);
        assert!(posterior.component(&dead).unwrap().is_none());
        assert!(posterior.component(&alive).unwrap().is_some());

        let solution = net.optimize().unwrap();
        assert_eq!(solution.discrete().get(C0), Some(1));
        assert!((solution.continuous().at(X0).unwrap()[0] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_pure_continuous_chain() {
        // x0 - x1 chain with a prior on x0, no discrete keys at all
        let prior = JacobianFactor::new(
            vec![(X0, DMatrix::identity(1, 1))],
            DVector::from_element(1, 1.0),
        )
        .unwrap();
        let between = JacobianFactor::new(
            vec![
                (X0, DMatrix::identity(1, 1) * -1.0),
                (1, DMatrix::identity(1, 1)),
            ],
            DVector::from_element(1, 2.0),
        )
        .unwrap();

        let mut graph = HybridGaussianFactorGraph::new();
        graph.add_jacobian(prior);
        graph.add_jacobian(between);

        let net = graph
            .eliminate_sequential(&[X0, 1], Reduction::Sum)
            .unwrap();
        assert_eq!(net.len(), 2);
        let solution = net.optimize().unwrap();
        assert!((solution.continuous().at(X0).unwrap()[0] - 1.0).abs() < 1e-10);
        assert!((solution.continuous().at(1).unwrap()[0] - 3.0).abs() < 1e-10);
    }
}
