//! Continuous variable assignments
//!
//! A [`VectorValues`] maps variable identifiers to vector values. It is the
//! continuous counterpart of a discrete assignment.

use std::collections::BTreeMap;

use nalgebra::DVector;

use crate::discrete::Key;
use crate::errors::InferenceError;

/// A mapping from variable identifiers to vector values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorValues {
    values: BTreeMap<Key, DVector<f64>>,
}

impl VectorValues {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from (key, vector) pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Key, DVector<f64>)>) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    /// Set the value for a variable, replacing any previous value
    pub fn insert(&mut self, key: Key, value: DVector<f64>) {
        self.values.insert(key, value);
    }

    /// Get the value for a variable, if present
    pub fn get(&self, key: Key) -> Option<&DVector<f64>> {
        self.values.get(&key)
    }

    /// Get the value for a variable or fail with `MissingVariable`
    pub fn at(&self, key: Key) -> Result<&DVector<f64>, InferenceError> {
        self.values
            .get(&key)
            .ok_or(InferenceError::MissingVariable { key })
    }

    /// Whether a variable is present
    pub fn contains(&self, key: Key) -> bool {
        self.values.contains_key(&key)
    }

    /// Merge another map into this one (other wins on conflicts)
    pub fn extend(&mut self, other: &VectorValues) {
        for (&key, value) in &other.values {
            self.values.insert(key, value.clone());
        }
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no variable is present
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over (key, value) pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (Key, &DVector<f64>)> {
        self.values.iter().map(|(&k, v)| (k, v))
    }
}
