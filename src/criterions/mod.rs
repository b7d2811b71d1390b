//! Objective functions paired with each component

pub mod bce;
pub mod cross_entropy;
pub mod mse;
pub mod reinforce;

pub use bce::WeightedBce;
pub use cross_entropy::TokenCrossEntropy;
pub use mse::WeightedMse;
pub use reinforce::Reinforce;
