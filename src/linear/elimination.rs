//! Gaussian variable elimination
//!
//! Eliminating continuous variables from a cluster of whitened Jacobian
//! factors: stack the cluster into one dense system `[A | b]`, QR it, and
//! split the triangular result into a conditional over the frontal
//! variables and a residual factor over the separator. Rows past the last
//! column carry the constant part of the error; they are kept so that
//! per-branch elimination inside hybrid factors loses nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use super::conditional::GaussianConditional;
use super::factor::JacobianFactor;
use crate::discrete::Key;
use crate::errors::InferenceError;

/// Diagonal entries below this are treated as structurally zero
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Eliminate `keys` from a cluster of Gaussian factors
///
/// The separator is every other key mentioned by the cluster, in ascending
/// order. Returns `(P(keys | separator), residual factor over separator)`.
pub fn eliminate_gaussian(
    factors: &[Arc<JacobianFactor>],
    keys: &[Key],
) -> Result<(GaussianConditional, JacobianFactor), InferenceError> {
    let dims = cluster_dimensions(factors)?;
    let separator: Vec<Key> = dims
        .keys()
        .copied()
        .filter(|key| !keys.contains(key))
        .collect();
    eliminate_with_separator(factors, keys, &separator, &dims)
}

/// Collect the column dimension of every key in the cluster
pub(crate) fn cluster_dimensions(
    factors: &[Arc<JacobianFactor>],
) -> Result<BTreeMap<Key, usize>, InferenceError> {
    let mut dims = BTreeMap::new();
    for factor in factors {
        for (key, block) in factor.terms() {
            match dims.get(&key) {
                None => {
                    dims.insert(key, block.ncols());
                }
                Some(&dim) if dim != block.ncols() => {
                    return Err(InferenceError::DimensionMismatch {
                        expected: dim,
                        actual: block.ncols(),
                        context: format!("column dimension of key {}", key),
                    });
                }
                _ => {}
            }
        }
    }
    Ok(dims)
}

/// Eliminate with an explicitly chosen separator
///
/// Hybrid elimination runs one Gaussian elimination per discrete branch and
/// needs every branch to produce a conditional over the *same* parents, so
/// the separator is fixed across branches even when an individual branch
/// does not mention some of its keys (those columns are simply zero).
pub(crate) fn eliminate_with_separator(
    factors: &[Arc<JacobianFactor>],
    frontals: &[Key],
    separator: &[Key],
    dims: &BTreeMap<Key, usize>,
) -> Result<(GaussianConditional, JacobianFactor), InferenceError> {
    for key in frontals {
        if !dims.contains_key(key) {
            return Err(InferenceError::Construction {
                description: format!("eliminated key {} is absent from the cluster", key),
            });
        }
    }

    // column layout: frontals first (given order), then separator
    let mut column_of: BTreeMap<Key, usize> = BTreeMap::new();
    let mut offset = 0;
    for &key in frontals.iter().chain(separator.iter()) {
        let dim = dims.get(&key).copied().unwrap_or(0);
        column_of.insert(key, offset);
        offset += dim;
    }
    let total_cols = offset;
    let frontal_dim: usize = frontals
        .iter()
        .map(|key| dims.get(key).copied().unwrap_or(0))
        .sum();

    let total_rows: usize = factors.iter().map(|f| f.rows()).sum();
    if total_rows < frontal_dim {
        return Err(InferenceError::Singular {
            context: format!(
                "cluster has {} rows for {} frontal dimensions",
                total_rows, frontal_dim
            ),
        });
    }

    // stack the whitened system [A | b]
    let mut system = DMatrix::zeros(total_rows, total_cols + 1);
    let mut row = 0;
    for factor in factors {
        let rows = factor.rows();
        for (key, block) in factor.terms() {
            let column = *column_of.get(&key).ok_or_else(|| {
                InferenceError::Construction {
                    description: format!("factor key {} missing from separator layout", key),
                }
            })?;
            system
                .view_mut((row, column), (rows, block.ncols()))
                .copy_from(block);
        }
        system
            .view_mut((row, total_cols), (rows, 1))
            .copy_from(factor.b());
        row += rows;
    }

    let r = system.qr().r();
    if r.nrows() < frontal_dim {
        return Err(InferenceError::Singular {
            context: "rank-deficient cluster".to_string(),
        });
    }
    for i in 0..frontal_dim {
        if r[(i, i)].abs() < SINGULAR_TOLERANCE {
            return Err(InferenceError::Singular {
                context: format!("zero pivot at frontal column {}", i),
            });
        }
    }

    // rows 0..frontal_dim become the conditional
    let r_block = r.view((0, 0), (frontal_dim, frontal_dim)).into_owned();
    let d = r
        .view((0, total_cols), (frontal_dim, 1))
        .column(0)
        .into_owned();
    let frontal_list: Vec<(Key, usize)> = frontals
        .iter()
        .map(|&key| (key, dims.get(&key).copied().unwrap_or(0)))
        .collect();
    let parent_blocks: Vec<(Key, DMatrix<f64>)> = separator
        .iter()
        .map(|&key| {
            let column = column_of[&key];
            let dim = dims.get(&key).copied().unwrap_or(0);
            (key, r.view((0, column), (frontal_dim, dim)).into_owned())
        })
        .collect();
    let conditional = GaussianConditional::new(frontal_list, r_block, parent_blocks, d)?;

    // remaining rows become the residual factor over the separator,
    // including constant rows with no columns at all
    let residual_rows = r.nrows() - frontal_dim;
    let residual_terms: Vec<(Key, DMatrix<f64>)> = separator
        .iter()
        .map(|&key| {
            let column = column_of[&key];
            let dim = dims.get(&key).copied().unwrap_or(0);
            (
                key,
                r.view((frontal_dim, column), (residual_rows, dim)).into_owned(),
            )
        })
        .collect();
    let residual_b = r
        .view((frontal_dim, total_cols), (residual_rows, 1))
        .column(0)
        .into_owned();
    let residual = JacobianFactor::new(residual_terms, residual_b)?;

    Ok((conditional, residual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::vector_values::VectorValues;

    #[test]
    fn test_eliminate_single_variable() {
        // two unit-noise observations of x: 1.0 and 3.0
        let f1 = Arc::new(
            JacobianFactor::new(
                vec![(0, DMatrix::identity(1, 1))],
                DVector::from_element(1, 1.0),
            )
            .unwrap(),
        );
        let f2 = Arc::new(
            JacobianFactor::new(
                vec![(0, DMatrix::identity(1, 1))],
                DVector::from_element(1, 3.0),
            )
            .unwrap(),
        );

        let (conditional, residual) = eliminate_gaussian(&[f1, f2], &[0]).unwrap();

        // posterior mean is the average
        let solution = conditional.solve(&VectorValues::new()).unwrap();
        assert!((solution.at(0).unwrap()[0] - 2.0).abs() < 1e-10);

        // residual is a pure constant carrying the leftover error:
        // min error = 0.5 * ((2-1)^2 + (2-3)^2) = 1.0
        assert!(residual.keys().is_empty());
        assert!((residual.error(&VectorValues::new()).unwrap() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_eliminate_preserves_total_error() {
        let f1 = Arc::new(
            JacobianFactor::new(
                vec![
                    (0, DMatrix::identity(2, 2)),
                    (1, DMatrix::identity(2, 2) * -1.0),
                ],
                DVector::from_vec(vec![1.0, 0.5]),
            )
            .unwrap(),
        );
        let f2 = Arc::new(
            JacobianFactor::new(
                vec![(0, DMatrix::identity(2, 2))],
                DVector::from_vec(vec![0.0, 0.0]),
            )
            .unwrap(),
        );

        let (conditional, residual) = eliminate_gaussian(&[f1.clone(), f2.clone()], &[0]).unwrap();

        // at arbitrary values, factored error must equal stacked error
        let values = VectorValues::from_pairs([
            (0, DVector::from_vec(vec![0.3, -0.2])),
            (1, DVector::from_vec(vec![1.1, 0.7])),
        ]);
        let original = f1.error(&values).unwrap() + f2.error(&values).unwrap();
        let factored =
            conditional.error(&values).unwrap() + residual.error(&values).unwrap();
        assert!((original - factored).abs() < 1e-10);
    }

    #[test]
    fn test_eliminate_separator_ordering() {
        let f = Arc::new(
            JacobianFactor::new(
                vec![
                    (2, DMatrix::identity(1, 1)),
                    (7, DMatrix::identity(1, 1)),
                    (5, DMatrix::identity(1, 1)),
                ],
                DVector::from_element(1, 1.0),
            )
            .unwrap(),
        );
        let (conditional, _) = eliminate_gaussian(&[f], &[5]).unwrap();
        let parents: Vec<Key> = conditional.parent_keys().collect();
        assert_eq!(parents, vec![2, 7]);
    }

    #[test]
    fn test_underconstrained_cluster() {
        // one row cannot determine a 2-D variable
        let f = Arc::new(
            JacobianFactor::new(
                vec![(0, DMatrix::from_row_slice(1, 2, &[1.0, 1.0]))],
                DVector::from_element(1, 1.0),
            )
            .unwrap(),
        );
        assert!(matches!(
            eliminate_gaussian(&[f], &[0]),
            Err(InferenceError::Singular { .. })
        ));
    }
}
