//! Error types for hybrid inference
//!
//! All failures surface immediately to the caller; elimination and pruning
//! are pure functions that either complete or fail fast.

use std::fmt;

use crate::discrete::Key;

/// Errors that can occur during tree operations, elimination and pruning
#[derive(Debug, Clone)]
pub enum InferenceError {
    /// An assignment or value map is missing a variable that a tree branch
    /// or conditional requires
    MissingVariable {
        /// The variable that was not assigned
        key: Key,
    },

    /// Conflicting sizes: cardinalities of a shared discrete key, or row/
    /// column counts of matrix blocks
    DimensionMismatch {
        /// What was expected
        expected: usize,
        /// What was received
        actual: usize,
        /// Context (e.g., "cardinality of key 3", "rows of block for key 1")
        context: String,
    },

    /// A decision-tree leaf holds content that violates an invariant
    /// (e.g., mixture branches modeling different continuous variables)
    InvalidLeaf {
        /// Description of the violated invariant
        description: String,
    },

    /// Count or key mismatches while building a factor or conditional
    Construction {
        /// Description of the construction issue
        description: String,
    },

    /// A triangular or least-squares system could not be solved
    Singular {
        /// Description of which system failed
        context: String,
    },

    /// A point query selected a discrete mode that was pruned away
    PrunedBranch {
        /// Description of the query
        context: String,
    },
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceError::MissingVariable { key } => {
                write!(f, "Variable {} is not assigned", key)
            }
            InferenceError::DimensionMismatch {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "Dimension mismatch for {}: expected {}, got {}",
                    context, expected, actual
                )
            }
            InferenceError::InvalidLeaf { description } => {
                write!(f, "Invalid tree leaf: {}", description)
            }
            InferenceError::Construction { description } => {
                write!(f, "Construction error: {}", description)
            }
            InferenceError::Singular { context } => {
                write!(f, "Singular system: {}", context)
            }
            InferenceError::PrunedBranch { context } => {
                write!(f, "Selected a pruned branch: {}", context)
            }
        }
    }
}

impl std::error::Error for InferenceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = InferenceError::MissingVariable { key: 7 };
        assert!(err.to_string().contains("7"));

        let err = InferenceError::DimensionMismatch {
            expected: 2,
            actual: 3,
            context: "cardinality of key 1".to_string(),
        };
        assert!(err.to_string().contains("2"));
        assert!(err.to_string().contains("3"));
        assert!(err.to_string().contains("key 1"));

        let err = InferenceError::PrunedBranch {
            context: "mixture lookup".to_string(),
        };
        assert!(err.to_string().contains("pruned"));
    }
}
