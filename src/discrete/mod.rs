//! Discrete variables, decision trees and discrete potentials
//!
//! This module holds the discrete half of hybrid inference:
//!
//! - [`DecisionTree`] - generic immutable tree with shared subtrees
//! - [`AlgebraicDecisionTree`] - real-valued trees with a ring of ops
//! - [`DiscretePotential`] - weight tables with explicit cardinalities
//! - [`DiscreteConditional`] - normalized conditional tables
//! - [`eliminate_discrete`] - discrete variable elimination

pub mod algebra;
pub mod assignment;
pub mod conditional;
pub mod decision_tree;
pub mod elimination;
pub mod key;
pub mod potential;

pub use algebra::{safe_divide, AlgebraicDecisionTree};
pub use assignment::Assignment;
pub use conditional::DiscreteConditional;
pub use decision_tree::DecisionTree;
pub use elimination::eliminate_discrete;
pub use key::{DiscreteKey, Key};
pub use potential::{DiscretePotential, Reduction};
