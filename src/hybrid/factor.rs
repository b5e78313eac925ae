//! Hybrid factors
//!
//! A factor in a hybrid Gaussian factor graph is one of three statically
//! tagged kinds. Nonlinear mixture factors are linearized into
//! [`super::mixture_factor::GaussianMixtureFactor`]s before they enter a
//! graph.

use std::sync::Arc;

use crate::discrete::{DiscreteKey, DiscretePotential, Key};
use crate::linear::JacobianFactor;

use super::mixture_factor::GaussianMixtureFactor;

/// A factor in a hybrid Gaussian factor graph
#[derive(Debug, Clone, PartialEq)]
pub enum HybridFactor {
    /// Pure continuous factor
    Gaussian(Arc<JacobianFactor>),
    /// Pure discrete factor
    Discrete(DiscretePotential),
    /// Continuous factor switching on discrete keys
    Mixture(GaussianMixtureFactor),
}

impl HybridFactor {
    /// Continuous keys this factor involves
    pub fn continuous_keys(&self) -> Vec<Key> {
        match self {
            HybridFactor::Gaussian(factor) => factor.keys().to_vec(),
            HybridFactor::Discrete(_) => Vec::new(),
            HybridFactor::Mixture(mixture) => mixture.continuous_keys().to_vec(),
        }
    }

    /// Discrete keys this factor involves
    pub fn discrete_keys(&self) -> Vec<DiscreteKey> {
        match self {
            HybridFactor::Gaussian(_) => Vec::new(),
            HybridFactor::Discrete(potential) => potential.keys().to_vec(),
            HybridFactor::Mixture(mixture) => mixture.discrete_keys().to_vec(),
        }
    }

    /// Whether this factor mentions the variable
    pub fn involves(&self, key: Key) -> bool {
        match self {
            HybridFactor::Gaussian(factor) => factor.keys().contains(&key),
            HybridFactor::Discrete(potential) => potential.cardinality(key).is_some(),
            HybridFactor::Mixture(mixture) => {
                mixture.continuous_keys().contains(&key)
                    || mixture.discrete_keys().iter().any(|k| k.key == key)
            }
        }
    }
}

impl From<JacobianFactor> for HybridFactor {
    fn from(factor: JacobianFactor) -> Self {
        HybridFactor::Gaussian(Arc::new(factor))
    }
}

impl From<DiscretePotential> for HybridFactor {
    fn from(potential: DiscretePotential) -> Self {
        HybridFactor::Discrete(potential)
    }
}

impl From<GaussianMixtureFactor> for HybridFactor {
    fn from(mixture: GaussianMixtureFactor) -> Self {
        HybridFactor::Mixture(mixture)
    }
}
