//! Hybrid Bayes nets
//!
//! An ordered sequence of hybrid conditionals, first-eliminated first. The
//! net owns its conditionals. The central design choice is the two-stage
//! solve in [`HybridBayesNet::optimize`]: find the MAP discrete assignment
//! first, then solve the pure continuous sub-problem conditioned on it,
//! which avoids enumerating the joint discrete×continuous space.

use std::sync::Arc;

use log::debug;
use rand::Rng;

use crate::discrete::{Assignment, DiscreteConditional, DiscreteKey, DiscretePotential};
use crate::errors::InferenceError;
use crate::linear::{GaussianBayesNet, GaussianConditional, VectorValues};

use super::conditional::HybridConditional;
use super::mixture::GaussianMixture;
use super::values::HybridValues;

/// An ordered set of hybrid conditionals in elimination order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HybridBayesNet {
    conditionals: Vec<HybridConditional>,
}

impl HybridBayesNet {
    /// Create an empty net
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a conditional (elimination order)
    pub fn push(&mut self, conditional: HybridConditional) {
        self.conditionals.push(conditional);
    }

    /// Append a mixture conditional
    pub fn add_mixture(&mut self, mixture: GaussianMixture) {
        self.push(HybridConditional::Mixture(mixture));
    }

    /// Append a pure Gaussian conditional
    pub fn add_gaussian(&mut self, conditional: GaussianConditional) {
        self.push(HybridConditional::Gaussian(Arc::new(conditional)));
    }

    /// Append a pure discrete conditional
    pub fn add_discrete(&mut self, conditional: DiscreteConditional) {
        self.push(HybridConditional::Discrete(conditional));
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
    pub fn at(&self, i: usize) -> Option<&HybridConditional> {
        self.conditionals.get(i)
    }

    /// Iterate in elimination order
    pub fn iter(&self) -> impl Iterator<Item = &HybridConditional> {
        self.conditionals.iter()
    }

    /// Prune mixture branches against a discrete potential
    ///
    /// Mixtures whose discrete parents are covered by the potential's keys
    /// (equal or superset) are pruned per the mixture rule; every other
    /// conditional passes through verbatim. Returns a new, independent net.
    pub fn prune(&self, potential: &DiscretePotential) -> Result<Self, InferenceError> {
        let mut pruned = HybridBayesNet::new();
        for conditional in &self.conditionals {
            match conditional {
                HybridConditional::Mixture(mixture) => {
                    pruned.add_mixture(mixture.prune(potential)?);
                }
                other => pruned.push(other.clone()),
            }
        }
        debug!(
            "pruned hybrid Bayes net with {} conditionals",
            pruned.len()
        );
        Ok(pruned)
    }

    /// The pure continuous Bayes net selected by one discrete assignment
    ///
    /// Mixtures contribute the branch conditional for that assignment;
    /// discrete conditionals drop out. Selecting a pruned branch is a
    /// `PrunedBranch` error.
    pub fn choose(&self, assignment: &Assignment) -> Result<GaussianBayesNet, InferenceError> {
        let mut net = GaussianBayesNet::new();
        for conditional in &self.conditionals {
            match conditional {
                HybridConditional::Gaussian(gaussian) => net.push(gaussian.clone()),
                HybridConditional::Mixture(mixture) => {
                    let component = mixture.component(assignment)?.ok_or_else(|| {
                        InferenceError::PrunedBranch {
                            context: "choose() selected a pruned mixture branch".to_string(),
                        }
                    })?;
                    net.push(component);
                }
                HybridConditional::Discrete(_) => {}
            }
        }
        Ok(net)
    }

    /// Maximum-a-posteriori hybrid solution
    ///
    /// Walks the net in reverse elimination order, so every conditional's
    /// parents are decided before it is reached: discrete conditionals
    /// contribute their argmax, Gaussian conditionals back-substitute, and
    /// mixtures select the decided branch. A mixture whose discrete parent
    /// has no conditional in the net is decided locally, by the extension
    /// whose branch has the lowest negative log density at the branch's own
    /// continuous optimum.
    pub fn optimize(&self) -> Result<HybridValues, InferenceError> {
        let mut discrete = Assignment::new();
        let mut continuous = VectorValues::new();

        for conditional in self.conditionals.iter().rev() {
            match conditional {
                HybridConditional::Discrete(dc) => {
                    let frontal = dc.argmax(&discrete)?;
                    discrete.extend(&frontal);
                }
                HybridConditional::Gaussian(gc) => {
                    let solution = gc.solve(&continuous)?;
                    continuous.extend(&solution);
                }
                HybridConditional::Mixture(mixture) => {
                    let missing: Vec<DiscreteKey> = mixture
                        .discrete_parents()
                        .iter()
                        .filter(|key| !discrete.contains(key.key))
                        .copied()
                        .collect();
                    if missing.is_empty() {
                        let component = mixture.component(&discrete)?.ok_or_else(|| {
                            InferenceError::PrunedBranch {
                                context: "MAP assignment selected a pruned branch".to_string(),
                            }
                        })?;
                        let solution = component.solve(&continuous)?;
                        continuous.extend(&solution);
                    } else {
                        let (extension, solution) =
                            self.best_branch(mixture, &missing, &discrete, &continuous)?;
                        discrete.extend(&extension);
                        continuous.extend(&solution);
                    }
                }
            }
        }
        Ok(HybridValues::from_parts(discrete, continuous))
    }

    /// Pick the undecided-mode extension with the best branch optimum
    fn best_branch(
        &self,
        mixture: &GaussianMixture,
        missing: &[DiscreteKey],
        discrete: &Assignment,
        continuous: &VectorValues,
    ) -> Result<(Assignment, VectorValues), InferenceError> {
        let mut best: Option<(Assignment, VectorValues, f64)> = None;
        for extension in Assignment::cartesian_product(missing) {
            let mut candidate = discrete.clone();
            candidate.extend(&extension);
            let component = match mixture.component(&candidate)? {
                Some(component) => component,
                None => continue,
            };
            let solution = component.solve(continuous)?;
            let mut all = continuous.clone();
            all.extend(&solution);
            let score = component.error(&all)? - component.log_normalization_constant();
            let better = match &best {
                None => true,
                Some((_, _, best_score)) => score < *best_score,
            };
            if better {
                best = Some((extension, solution, score));
            }
        }
        best.map(|(extension, solution, _)| (extension, solution))
            .ok_or_else(|| InferenceError::PrunedBranch {
                context: "every branch of a mixture was pruned".to_string(),
            })
    }

    /// Ancestral sampling of a full hybrid solution
    ///
    /// Requires a complete net: every mixture's discrete parents must have
    /// discrete conditionals later in the ordering.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<HybridValues, InferenceError> {
        let mut discrete = Assignment::new();
        let mut continuous = VectorValues::new();

        for conditional in self.conditionals.iter().rev() {
            match conditional {
                HybridConditional::Discrete(dc) => {
                    let frontal = dc.sample(&discrete, rng)?;
                    discrete.extend(&frontal);
                }
                HybridConditional::Gaussian(gc) => {
                    let sampled = gc.sample(&continuous, rng)?;
                    continuous.extend(&sampled);
                }
                HybridConditional::Mixture(mixture) => {
                    for key in mixture.discrete_parents() {
                        if !discrete.contains(key.key) {
                            return Err(InferenceError::Construction {
                                description: format!(
                                    "sampling requires a conditional for discrete parent {}",
                                    key.key
                                ),
                            });
                        }
                    }
                    let component = mixture.component(&discrete)?.ok_or_else(|| {
                        InferenceError::PrunedBranch {
                            context: "sampled discrete assignment selects a pruned branch"
                                .to_string(),
                        }
                    })?;
                    let sampled = component.sample(&continuous, rng)?;
                    continuous.extend(&sampled);
                }
            }
        }
        Ok(HybridValues::from_parts(discrete, continuous))
    }

    /// Total negative log density of a full hybrid assignment, up to
    /// normalization constants
    pub fn error(&self, values: &HybridValues) -> Result<f64, InferenceError> {
        let mut total = 0.0;
        for conditional in &self.conditionals {
            match conditional {
                HybridConditional::Gaussian(gc) => {
                    total += gc.error(values.continuous())?;
                }
                HybridConditional::Discrete(dc) => {
                    total += -dc.value(values.discrete())?.ln();
                }
                HybridConditional::Mixture(mixture) => {
                    total += mixture.error(values.continuous(), values.discrete())?;
                }
            }
        }
        Ok(total)
    }
}
