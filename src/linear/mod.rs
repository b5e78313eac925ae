//! Linear-Gaussian machinery
//!
//! The continuous collaborator consumed by hybrid elimination:
//!
//! - [`VectorValues`] - continuous variable assignments
//! - [`JacobianFactor`] - whitened linear factors
//! - [`GaussianConditional`] - square-root-form conditionals
//! - [`GaussianBayesNet`] - back-substitution over eliminated conditionals
//! - [`eliminate_gaussian`] - dense QR elimination

pub mod bayes_net;
pub mod conditional;
pub mod elimination;
pub mod factor;
pub mod vector_values;

pub use bayes_net::GaussianBayesNet;
pub use conditional::GaussianConditional;
pub use elimination::eliminate_gaussian;
pub use factor::JacobianFactor;
pub use vector_values::VectorValues;
