//! Assignments of discrete variables to values
//!
//! An [`Assignment`] maps discrete-variable identifiers to their chosen
//! integer value. It is used both as a decision-tree traversal path and as
//! a lookup key. Keys are unique; insertion order is irrelevant (the map is
//! a `BTreeMap`, so iteration order is deterministic by key id).

use std::collections::BTreeMap;

use super::key::{DiscreteKey, Key};

/// A mapping from discrete-variable identifiers to chosen values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    values: BTreeMap<Key, usize>,
}

impl Assignment {
    /// Create an empty assignment
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an assignment from (key, value) pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Key, usize)>) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    /// Set the value for a variable, replacing any previous value
    pub fn insert(&mut self, key: Key, value: usize) {
        self.values.insert(key, value);
    }

    /// Remove a variable from the assignment
    pub fn remove(&mut self, key: Key) {
        self.values.remove(&key);
    }

    /// Get the value assigned to a variable, if any
    pub fn get(&self, key: Key) -> Option<usize> {
        self.values.get(&key).copied()
    }

    /// Whether a variable is assigned
    pub fn contains(&self, key: Key) -> bool {
        self.values.contains_key(&key)
    }

    /// Merge another assignment into this one (other wins on conflicts)
    pub fn extend(&mut self, other: &Assignment) {
        for (&key, &value) in &other.values {
            self.values.insert(key, value);
        }
    }

    /// Number of assigned variables
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no variable is assigned
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over (key, value) pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (Key, usize)> + '_ {
        self.values.iter().map(|(&k, &v)| (k, v))
    }

    /// Every combination of values across the given keys
    ///
    /// The first key varies slowest, the last key varies fastest, so the
    /// result order is reproducible and matches the flat-table leaf order
    /// used by tree constructors. The product over an empty key list is the
    /// single empty assignment.
    pub fn cartesian_product(keys: &[DiscreteKey]) -> Vec<Assignment> {
        let total: usize = keys.iter().map(|k| k.cardinality).product();
        let mut result = Vec::with_capacity(total);
        let mut counters = vec![0usize; keys.len()];
        for _ in 0..total {
            let mut assignment = Assignment::new();
            for (key, &value) in keys.iter().zip(&counters) {
                assignment.insert(key.key, value);
            }
            result.push(assignment);
            for i in (0..keys.len()).rev() {
                counters[i] += 1;
                if counters[i] < keys[i].cardinality {
                    break;
                }
                counters[i] = 0;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get() {
        let mut a = Assignment::new();
        a.insert(1, 0);
        a.insert(2, 1);
        assert_eq!(a.get(1), Some(0));
        assert_eq!(a.get(2), Some(1));
        assert_eq!(a.get(3), None);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_cartesian_product_order() {
        let keys = [DiscreteKey::new(0, 2), DiscreteKey::new(1, 3)];
        let product = Assignment::cartesian_product(&keys);
        assert_eq!(product.len(), 6);

        // First key slowest: (0,0) (0,1) (0,2) (1,0) (1,1) (1,2)
        assert_eq!(product[0], Assignment::from_pairs([(0, 0), (1, 0)]));
        assert_eq!(product[1], Assignment::from_pairs([(0, 0), (1, 1)]));
        assert_eq!(product[3], Assignment::from_pairs([(0, 1), (1, 0)]));
        assert_eq!(product[5], Assignment::from_pairs([(0, 1), (1, 2)]));
    }

    #[test]
    fn test_cartesian_product_empty() {
        let product = Assignment::cartesian_product(&[]);
        assert_eq!(product.len(), 1);
        assert!(product[0].is_empty());
    }

    #[test]
    fn test_extend_overwrites() {
        let mut a = Assignment::from_pairs([(1, 0)]);
        let b = Assignment::from_pairs([(1, 1), (2, 0)]);
        a.extend(&b);
        assert_eq!(a.get(1), Some(1));
        assert_eq!(a.get(2), Some(0));
    }
}
