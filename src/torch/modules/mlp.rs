//! Multi-layer perceptron
use super::{
    Activation, BuildModule, FeedForwardModule, LayerNorm, LayerNormConfig, Linear, LinearConfig,
    Module,
};
use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::iter;
use tch::{nn::Path, Tensor};

/// Configuration for the [`Mlp`] module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    /// Sizes of the hidden layers
    pub hidden_sizes: Vec<usize>,
    /// Activation function between hidden layers.
    pub activation: Activation,
    /// Activation function on the output.
    pub output_activation: Activation,
    /// Normalize each hidden layer (after its activation).
    pub layer_norm: Option<LayerNormConfig>,
    /// Configuration for the linear layers
    pub linear_config: LinearConfig,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![128],
            activation: Activation::Relu,
            output_activation: Activation::Identity,
            layer_norm: None,
            linear_config: LinearConfig::default(),
        }
    }
}

impl BuildModule for MlpConfig {
    type Module = Mlp;

    fn build_module(&self, vs: &Path, in_dim: usize, out_dim: usize) -> Self::Module {
        Mlp::new(vs, in_dim, out_dim, self)
    }
}

/// Multi-layer perceptron
#[derive(Debug)]
pub struct Mlp {
    hidden: Vec<Linear>,
    norms: Vec<LayerNorm>,
    output: Linear,
    activation: Activation,
    output_activation: Activation,
}

impl Mlp {
    pub fn new(vs: &Path, in_dim: usize, out_dim: usize, config: &MlpConfig) -> Self {
        let in_dims = iter::once(&in_dim).chain(&config.hidden_sizes);
        let hidden = in_dims
            .clone()
            .zip(&config.hidden_sizes)
            .enumerate()
            .map(|(i, (in_, out_))| {
                Linear::new(&(vs / format!("layer_{}", i)), *in_, *out_, &config.linear_config)
            })
            .collect();
        let norms = match &config.layer_norm {
            Some(norm_config) => config
                .hidden_sizes
                .iter()
                .enumerate()
                .map(|(i, size)| LayerNorm::new(&(vs / format!("norm_{}", i)), *size, norm_config))
                .collect(),
            None => Vec::new(),
        };
        let last_dim = *in_dims.last().unwrap_or(&in_dim);
        let output = Linear::new(
            &(vs / format!("layer_{}", config.hidden_sizes.len())),
            last_dim,
            out_dim,
            &config.linear_config,
        );

        Self {
            hidden,
            norms,
            output,
            activation: config.activation,
            output_activation: config.output_activation,
        }
    }

    /// Number of input features.
    pub fn in_dim(&self) -> i64 {
        self.hidden.first().unwrap_or(&self.output).in_dim()
    }

    /// Number of output features.
    pub fn out_dim(&self) -> i64 {
        self.output.out_dim()
    }
}

impl Module for Mlp {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(
            self.hidden
                .variables()
                .chain(self.norms.variables())
                .chain(self.output.variables()),
        )
    }
}

impl FeedForwardModule for Mlp {
    fn f_forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        let mut hidden = input.shallow_clone();
        for (i, layer) in self.hidden.iter().enumerate() {
            hidden = self.activation.f_forward_owned(layer.f_forward(&hidden)?)?;
            if let Some(norm) = self.norms.get(i) {
                hidden = norm.f_forward(&hidden)?;
            }
        }
        self.output_activation
            .f_forward_owned(self.output.f_forward(&hidden)?)
    }
}
