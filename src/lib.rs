//! Actor, critic, and feature extraction networks for reinforcement learning.
//!
//! Networks are built on [`tch`]. Each network registers its parameters in a
//! [`tch::nn::VarStore`] path on construction so they can be trained with any `tch` optimizer
//! and saved or loaded with the var store.
#![warn(clippy::cast_lossless)]
#![warn(clippy::doc_markdown)]
#![warn(clippy::explicit_iter_loop)]
#![warn(clippy::missing_const_for_fn)] // has some false positives
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::redundant_closure_for_method_calls)]
#![warn(clippy::use_self)] // also triggered by macro expansions
pub mod config;
mod error;
pub mod models;
pub mod torch;

pub use config::ModelConfig;
pub use error::ModelError;
pub use models::{
    Actor, CnnStem, Critic, Network, PpoActor, PpoCritic, SplitCritic, StateActionModule,
};
