//! Activation functions.
use super::{FeedForwardModule, Module};
use crate::error::ModelError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::iter;
use tch::Tensor;

/// Activation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// No transformation
    Identity,
    /// Rectified linear
    Relu,
    /// Sigmoid function
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
}

impl Default for Activation {
    #[inline]
    fn default() -> Self {
        Self::Relu
    }
}

impl Activation {
    /// Apply to an owned tensor
    #[inline]
    pub fn f_forward_owned(&self, tensor: Tensor) -> Result<Tensor, ModelError> {
        match self {
            Self::Identity => Ok(tensor),
            _ => self.f_forward(&tensor),
        }
    }
}

impl Module for Activation {
    #[inline]
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(iter::empty())
    }
}

impl FeedForwardModule for Activation {
    #[inline]
    fn f_forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        Ok(match self {
            Self::Identity => input.shallow_clone(),
            Self::Relu => input.f_relu()?,
            Self::Sigmoid => input.f_sigmoid()?,
            Self::Tanh => input.f_tanh()?,
        })
    }
}
