//! Discrete conditional distributions
//!
//! A [`DiscreteConditional`] is a potential over frontal and parent keys,
//! normalized so that for every parent assignment the frontal values sum
//! to one (pruned rows may sum to zero instead).

use rand::Rng;

use super::assignment::Assignment;
use super::key::DiscreteKey;
use super::potential::{DiscretePotential, Reduction};
use crate::errors::InferenceError;

/// P(frontals | parents) as a normalized discrete potential
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteConditional {
    frontals: Vec<DiscreteKey>,
    parents: Vec<DiscreteKey>,
    potential: DiscretePotential,
}

impl DiscreteConditional {
    /// Create a conditional from a potential over exactly frontals ∪ parents
    pub fn new(
        frontals: &[DiscreteKey],
        parents: &[DiscreteKey],
        potential: DiscretePotential,
    ) -> Result<Self, InferenceError> {
        let mut frontals = frontals.to_vec();
        frontals.sort_by_key(|k| k.key);
        let mut parents = parents.to_vec();
        parents.sort_by_key(|k| k.key);

        for frontal in &frontals {
            if parents.iter().any(|p| p.key == frontal.key) {
                return Err(InferenceError::Construction {
                    description: format!("key {} is both frontal and parent", frontal.key),
                });
            }
        }
        let declared = frontals.len() + parents.len();
        if declared != potential.keys().len() {
            return Err(InferenceError::Construction {
                description: format!(
                    "conditional declares {} keys but potential has {}",
                    declared,
                    potential.keys().len()
                ),
            });
        }
        for key in frontals.iter().chain(parents.iter()) {
            match potential.cardinality(key.key) {
                None => {
                    return Err(InferenceError::Construction {
                        description: format!("declared key {} is not in the potential", key.key),
                    })
                }
                Some(cardinality) if cardinality != key.cardinality => {
                    return Err(InferenceError::DimensionMismatch {
                        expected: key.cardinality,
                        actual: cardinality,
                        context: format!("cardinality of key {}", key.key),
                    })
                }
                _ => {}
            }
        }
        Ok(Self {
            frontals,
            parents,
            potential,
        })
    }

    /// Build P(frontal | parents) from a weight table and normalize it
    ///
    /// The table is over `[frontal] ++ parents` in declared order (frontal
    /// varies slowest). Rows are normalized per parent assignment by
    /// dividing through the frontal sum; all-zero rows stay zero.
    pub fn from_table(
        frontal: DiscreteKey,
        parents: &[DiscreteKey],
        values: &[f64],
    ) -> Result<Self, InferenceError> {
        let mut keys = vec![frontal];
        keys.extend_from_slice(parents);
        let joint = DiscretePotential::from_table(&keys, values)?;
        let row_sums = joint.marginalize(&[frontal.key], Reduction::Sum)?;
        let normalized = joint.divide(&row_sums)?;
        Self::new(&[frontal], parents, normalized)
    }

    /// Frontal keys in canonical order
    pub fn frontals(&self) -> &[DiscreteKey] {
        &self.frontals
    }

    /// Parent keys in canonical order
    pub fn parents(&self) -> &[DiscreteKey] {
        &self.parents
    }

    /// The normalized potential over frontals ∪ parents
    pub fn potential(&self) -> &DiscretePotential {
        &self.potential
    }

    /// All keys of this conditional
    pub fn discrete_keys(&self) -> Vec<DiscreteKey> {
        let mut keys = self.frontals.clone();
        keys.extend_from_slice(&self.parents);
        keys.sort_by_key(|k| k.key);
        keys
    }

    /// Conditional probability of one full assignment
    pub fn value(&self, assignment: &Assignment) -> Result<f64, InferenceError> {
        self.potential.value(assignment)
    }

    /// Most probable frontal assignment given assigned parents
    ///
    /// Ties break toward the first (lowest-index) combination, keeping
    /// optimization deterministic.
    pub fn argmax(&self, parents: &Assignment) -> Result<Assignment, InferenceError> {
        let mut best: Option<(Assignment, f64)> = None;
        for frontal in Assignment::cartesian_product(&self.frontals) {
            let mut full = parents.clone();
            full.extend(&frontal);
            let value = self.potential.value(&full)?;
            let better = match &best {
                None => true,
                Some((_, best_value)) => value > *best_value,
            };
            if better {
                best = Some((frontal, value));
            }
        }
        best.map(|(assignment, _)| assignment)
            .ok_or_else(|| InferenceError::Construction {
                description: "conditional has no frontal combinations".to_string(),
            })
    }

    /// Sample a frontal assignment given assigned parents
    pub fn sample<R: Rng + ?Sized>(
        &self,
        parents: &Assignment,
        rng: &mut R,
    ) -> Result<Assignment, InferenceError> {
        let combinations = Assignment::cartesian_product(&self.frontals);
        let mut weights = Vec::with_capacity(combinations.len());
        let mut total = 0.0;
        for frontal in &combinations {
            let mut full = parents.clone();
            full.extend(frontal);
            let weight = self.potential.value(&full)?;
            total += weight;
            weights.push(weight);
        }
        if total <= 0.0 {
            return Err(InferenceError::PrunedBranch {
                context: "sampling a conditional whose row is all zero".to_string(),
            });
        }
        let target = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        for (frontal, weight) in combinations.iter().zip(&weights) {
            cumulative += weight;
            if target < cumulative {
                return Ok(frontal.clone());
            }
        }
        // floating-point round-off: fall back to the last combination
        Ok(combinations
            .last()
            .cloned()
            .unwrap_or_else(Assignment::new))
    }
}
