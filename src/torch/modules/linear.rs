//! Linear layer
use super::{BuildModule, FeedForwardModule, Module};
use crate::error::ModelError;
use crate::torch::initializers::Initializer;
use serde::{Deserialize, Serialize};
use std::iter;
use tch::{nn::Path, Tensor};

/// Configuration for the [`Linear`] module.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearConfig {
    /// Initializer for the kernel (weight) matrix.
    pub kernel_init: Initializer,
    /// Initializer for the bias vector, if one exists.
    pub bias_init: Option<Initializer>,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            kernel_init: Initializer::default(),
            bias_init: Some(Initializer::default()),
        }
    }
}

impl BuildModule for LinearConfig {
    type Module = Linear;

    fn build_module(&self, vs: &Path, in_dim: usize, out_dim: usize) -> Self::Module {
        Linear::new(vs, in_dim, out_dim, self)
    }
}

/// Linear fully-connected layer module.
#[derive(Debug)]
pub struct Linear {
    kernel: Tensor,
    bias: Option<Tensor>,
}

impl Linear {
    pub fn new(vs: &Path, in_dim: usize, out_dim: usize, config: &LinearConfig) -> Self {
        // Total fan_in is the weights in_dim + 1 for the bias.
        let fan_in = Some(in_dim + 1);
        Self {
            kernel: config
                .kernel_init
                .add_var(vs, "kernel", &[out_dim, in_dim], fan_in),
            bias: config
                .bias_init
                .map(|init| init.add_var(vs, "bias", &[out_dim], fan_in)),
        }
    }

    /// Number of input features.
    pub fn in_dim(&self) -> i64 {
        self.kernel.size()[1]
    }

    /// Number of output features.
    pub fn out_dim(&self) -> i64 {
        self.kernel.size()[0]
    }
}

impl Module for Linear {
    #[inline]
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(iter::once(&self.kernel).chain(self.bias.iter()))
    }
}

impl FeedForwardModule for Linear {
    #[inline]
    fn f_forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        Ok(input.f_linear(&self.kernel, self.bias.as_ref())?)
    }
}
