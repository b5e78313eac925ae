//! Hybrid conditionals
//!
//! A conditional produced by hybrid elimination is one of three statically
//! tagged kinds; the kind is known at the point of use, so there is no
//! downcast failure path.

use std::sync::Arc;

use crate::discrete::{DiscreteConditional, DiscreteKey, Key};
use crate::linear::GaussianConditional;

use super::mixture::GaussianMixture;

/// A conditional in a hybrid Bayes net
#[derive(Debug, Clone, PartialEq)]
pub enum HybridConditional {
    /// Pure continuous conditional
    Gaussian(Arc<GaussianConditional>),
    /// Pure discrete conditional
    Discrete(DiscreteConditional),
    /// Continuous conditional switching on discrete parents
    Mixture(GaussianMixture),
}

impl HybridConditional {
    /// The mixture conditional, if this is one
    pub fn as_mixture(&self) -> Option<&GaussianMixture> {
        match self {
            HybridConditional::Mixture(mixture) => Some(mixture),
            _ => None,
        }
    }

    /// The discrete conditional, if this is one
    pub fn as_discrete(&self) -> Option<&DiscreteConditional> {
        match self {
            HybridConditional::Discrete(conditional) => Some(conditional),
            _ => None,
        }
    }

    /// The Gaussian conditional, if this is one
    pub fn as_gaussian(&self) -> Option<&Arc<GaussianConditional>> {
        match self {
            HybridConditional::Gaussian(conditional) => Some(conditional),
            _ => None,
        }
    }

    /// Discrete keys this conditional involves
    pub fn discrete_keys(&self) -> Vec<DiscreteKey> {
        match self {
            HybridConditional::Gaussian(_) => Vec::new(),
            HybridConditional::Discrete(conditional) => conditional.discrete_keys(),
            HybridConditional::Mixture(mixture) => mixture.discrete_parents().to_vec(),
        }
    }

    /// Continuous keys this conditional involves (frontals then parents)
    pub fn continuous_keys(&self) -> Vec<Key> {
        match self {
            HybridConditional::Gaussian(conditional) => conditional
                .frontal_keys()
                .chain(conditional.parent_keys())
                .collect(),
            HybridConditional::Discrete(_) => Vec::new(),
            HybridConditional::Mixture(mixture) => {
                let mut keys = mixture.frontals().to_vec();
                keys.extend_from_slice(mixture.continuous_parents());
                keys
            }
        }
    }
}

impl From<GaussianConditional> for HybridConditional {
    fn from(conditional: GaussianConditional) -> Self {
        HybridConditional::Gaussian(Arc::new(conditional))
    }
}

impl From<DiscreteConditional> for HybridConditional {
    fn from(conditional: DiscreteConditional) -> Self {
        HybridConditional::Discrete(conditional)
    }
}

impl From<GaussianMixture> for HybridConditional {
    fn from(mixture: GaussianMixture) -> Self {
        HybridConditional::Mixture(mixture)
    }
}
