//! Hybrid discrete-continuous inference core
//!
//! Switching linear-Gaussian models: conditionals and factors whose
//! Gaussian parameters are selected by discrete variables, the Bayes net
//! that elimination produces, and the hybrid elimination entry point.
//!
//! - [`GaussianMixture`] - mixture conditionals
//! - [`GaussianMixtureFactor`] - unnormalized mixture factors
//! - [`NonlinearMixtureFactor`] - pre-linearization mixture factors
//! - [`HybridBayesNet`] - prune / choose / optimize / sample
//! - [`HybridGaussianFactorGraph`] / [`eliminate_hybrid`] - elimination

pub mod bayes_net;
pub mod conditional;
pub mod factor;
pub mod graph;
pub mod mixture;
pub mod mixture_factor;
pub mod nonlinear;
pub mod values;

pub use bayes_net::HybridBayesNet;
pub use conditional::HybridConditional;
pub use factor::HybridFactor;
pub use graph::{eliminate_hybrid, HybridGaussianFactorGraph};
pub use mixture::{GaussianMixture, MixtureConditionals, PRUNED_BRANCH_ERROR};
pub use mixture_factor::{GaussianMixtureFactor, MixtureFactors};
pub use nonlinear::{NonlinearFactor, NonlinearMixtureFactor, NonlinearPair};
pub use values::HybridValues;
