//! Torch components
pub mod initializers;
pub mod modules;

pub use initializers::{Initializer, VarianceScale};
pub use modules::{Activation, BuildModule, FeedForwardModule, Module};
