/*!
# Hybrid discrete-continuous Gaussian inference

Estimation of unknown continuous and discrete quantities (poses, landmarks,
data-association or mode choices) from noisy measurements, via switching
linear-Gaussian models: decision trees select Gaussian parameters per
discrete assignment, and hybrid elimination turns a graph of such factors
into a usable posterior.

## Features

- Generic immutable decision trees with shared subtrees and a numeric ring
- Discrete potentials and conditionals with sum/max elimination
- Mixture conditionals and factors whose Gaussians switch on discrete keys
- Hybrid Bayes nets with pruning, mode selection, MAP solve and sampling
- Hybrid elimination: continuous variables branch-by-branch, discrete
  variables by table elimination

## Modules

- [`discrete`] - decision trees, potentials, discrete elimination
- [`linear`] - Gaussian factors, conditionals, QR elimination
- [`hybrid`] - mixture conditionals/factors, hybrid Bayes nets, elimination

## Example

```rust
use hybrid_bayes_rs::{
    DiscreteKey, DiscretePotential, GaussianMixtureFactor, HybridGaussianFactorGraph,
    JacobianFactor, Reduction,
};
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

# fn main() -> Result<(), hybrid_bayes_rs::InferenceError> {
// One continuous variable (key 0) observed as 1.0 under a binary mode
// (key 10) switching between a tight and a wide noise model.
let mode = DiscreteKey::new(10, 2);
let prior = JacobianFactor::new(vec![(0, DMatrix::identity(1, 1))], DVector::zeros(1))?;
let tight = JacobianFactor::isotropic(0, DMatrix::identity(1, 1), DVector::from_element(1, 1.0), 0.5)?;
let wide = JacobianFactor::isotropic(0, DMatrix::identity(1, 1), DVector::from_element(1, 1.0), 3.0)?;
let mixture = GaussianMixtureFactor::from_list(
    vec![0],
    vec![mode],
    vec![(Arc::new(tight), 0.0), (Arc::new(wide), 0.0)],
)?;

let mut graph = HybridGaussianFactorGraph::new();
graph.add_jacobian(prior);
graph.add_mixture_factor(mixture);
graph.add_potential(DiscretePotential::from_table(&[mode], &[0.5, 0.5])?);

// continuous before discrete, then MAP solve
let ordering = graph.hybrid_ordering();
let net = graph.eliminate_sequential(&ordering, Reduction::Sum)?;
let solution = net.optimize()?;
assert!(solution.discrete().get(10).is_some());
assert!(solution.continuous().contains(0));
# Ok(())
# }
```
*/

pub mod discrete;
pub mod errors;
pub mod hybrid;
pub mod linear;

// Core types
pub use discrete::{
    eliminate_discrete, AlgebraicDecisionTree, Assignment, DecisionTree, DiscreteConditional,
    DiscreteKey, DiscretePotential, Key, Reduction,
};

// Continuous collaborator layer
pub use linear::{
    eliminate_gaussian, GaussianBayesNet, GaussianConditional, JacobianFactor, VectorValues,
};

// Hybrid core
pub use hybrid::{
    eliminate_hybrid, GaussianMixture, GaussianMixtureFactor, HybridBayesNet, HybridConditional,
    HybridFactor, HybridGaussianFactorGraph, HybridValues, NonlinearFactor,
    NonlinearMixtureFactor, PRUNED_BRANCH_ERROR,
};

// Errors
pub use errors::InferenceError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
