//! Discrete-factor elimination
//!
//! Eliminating discrete variables from a cluster of potentials: multiply
//! the cluster, reduce the frontal variables away (sum or max), and divide
//! back to obtain the conditional.

use super::conditional::DiscreteConditional;
use super::key::DiscreteKey;
use super::potential::{DiscretePotential, Reduction};
use crate::errors::InferenceError;

/// Eliminate `frontals` from a cluster of discrete potentials
///
/// Returns the conditional `P(frontals | separator)` and the residual
/// potential over the separator. `Reduction::Sum` yields the marginal
/// (sum-product); `Reduction::Max` yields the max-marginal used by
/// max-product (MPE) queries.
pub fn eliminate_discrete(
    potentials: &[DiscretePotential],
    frontals: &[DiscreteKey],
    mode: Reduction,
) -> Result<(DiscreteConditional, DiscretePotential), InferenceError> {
    let mut iter = potentials.iter();
    let first = iter.next().ok_or_else(|| InferenceError::Construction {
        description: "eliminating from an empty cluster".to_string(),
    })?;
    let mut product = first.clone();
    for potential in iter {
        product = product.multiply(potential)?;
    }

    for frontal in frontals {
        if product.cardinality(frontal.key).is_none() {
            return Err(InferenceError::Construction {
                description: format!("eliminated key {} is not in the cluster", frontal.key),
            });
        }
    }

    let frontal_ids: Vec<_> = frontals.iter().map(|k| k.key).collect();
    let separator = product.marginalize(&frontal_ids, mode)?;
    let conditional_potential = product.divide(&separator)?;
    let conditional =
        DiscreteConditional::new(frontals, separator.keys(), conditional_potential)?;
    Ok((conditional, separator))
}
