//! Full hybrid solution points
//!
//! A [`HybridValues`] pairs a discrete assignment with a continuous vector
//! assignment: one complete answer to a hybrid inference query, as returned
//! by optimization and consumed by error evaluation.

use nalgebra::DVector;

use crate::discrete::{Assignment, Key};
use crate::linear::VectorValues;

/// A discrete assignment together with a continuous assignment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HybridValues {
    discrete: Assignment,
    continuous: VectorValues,
}

impl HybridValues {
    /// Create empty hybrid values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from both parts
    pub fn from_parts(discrete: Assignment, continuous: VectorValues) -> Self {
        Self {
            discrete,
            continuous,
        }
    }

    /// The discrete part
    pub fn discrete(&self) -> &Assignment {
        &self.discrete
    }

    /// The continuous part
    pub fn continuous(&self) -> &VectorValues {
        &self.continuous
    }

    /// Set a discrete value
    pub fn insert_discrete(&mut self, key: Key, value: usize) {
        self.discrete.insert(key, value);
    }

    /// Set a continuous value
    pub fn insert_vector(&mut self, key: Key, value: DVector<f64>) {
        self.continuous.insert(key, value);
    }

    /// Whether a variable exists in either part
    pub fn exists(&self, key: Key) -> bool {
        self.discrete.contains(key) || self.continuous.contains(key)
    }
}
