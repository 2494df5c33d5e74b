//! Layer normalization
use super::{FeedForwardModule, Module};
use crate::error::ModelError;
use crate::torch::initializers::Initializer;
use serde::{Deserialize, Serialize};
use std::iter;
use tch::{nn::Path, Tensor};

/// Configuration for the [`LayerNorm`] module.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerNormConfig {
    /// Added to the variance for numerical stability.
    pub eps: f64,
    /// Whether to learn an elementwise gain and bias.
    pub elementwise_affine: bool,
}

impl Default for LayerNormConfig {
    fn default() -> Self {
        Self {
            eps: 1e-5,
            elementwise_affine: true,
        }
    }
}

/// Normalizes the trailing feature dimension to zero mean and unit variance.
#[derive(Debug)]
pub struct LayerNorm {
    /// Gain and bias
    affine: Option<(Tensor, Tensor)>,
    dim: i64,
    eps: f64,
}

impl LayerNorm {
    pub fn new(vs: &Path, dim: usize, config: &LayerNormConfig) -> Self {
        let affine = if config.elementwise_affine {
            Some((
                Initializer::Constant(1.0).add_var(vs, "gain", &[dim], None),
                Initializer::Zeros.add_var(vs, "bias", &[dim], None),
            ))
        } else {
            None
        };
        Self {
            affine,
            dim: dim as i64,
            eps: config.eps,
        }
    }
}

impl Module for LayerNorm {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(
            self.affine
                .iter()
                .flat_map(|(gain, bias)| iter::once(gain).chain(iter::once(bias))),
        )
    }
}

impl FeedForwardModule for LayerNorm {
    fn f_forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        let (gain, bias) = match &self.affine {
            Some((gain, bias)) => (Some(gain), Some(bias)),
            None => (None, None),
        };
        Ok(input.f_layer_norm(&[self.dim], gain, bias, self.eps, false)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    #[test]
    fn normalizes_features() {
        let vs = VarStore::new(Device::Cpu);
        let norm = LayerNorm::new(&vs.root(), 4, &LayerNormConfig::default());
        let input = Tensor::of_slice(&[1.0_f32, 2.0, 3.0, 4.0, -5.0, 0.0, 5.0, 10.0]).view(&[2, 4]);
        let output = norm.forward(&input);
        assert_eq!(output.size(), vec![2, 4]);

        let mean = output.mean_dim(&[-1], false, Kind::Float);
        assert!(mean.allclose(&Tensor::zeros(&[2], (Kind::Float, Device::Cpu)), 1e-5, 1e-5, false));
        let var = output.var_dim(&[-1], false, false);
        assert!(var.allclose(&Tensor::ones(&[2], (Kind::Float, Device::Cpu)), 1e-3, 1e-3, false));
    }

    #[test]
    fn affine_variables() {
        let vs = VarStore::new(Device::Cpu);
        let norm = LayerNorm::new(&vs.root(), 5, &LayerNormConfig::default());
        assert_eq!(norm.variables().count(), 2);
        assert_eq!(norm.num_parameters(), 10);
    }

    #[test]
    fn no_affine_variables() {
        let vs = VarStore::new(Device::Cpu);
        let config = LayerNormConfig {
            elementwise_affine: false,
            ..LayerNormConfig::default()
        };
        let norm = LayerNorm::new(&vs.root(), 5, &config);
        assert_eq!(norm.variables().count(), 0);
        assert_eq!(norm.forward(&Tensor::ones(&[3, 5], (Kind::Float, Device::Cpu))).size(), vec![3, 5]);
    }

    #[test]
    fn wrong_feature_dim() {
        let vs = VarStore::new(Device::Cpu);
        let norm = LayerNorm::new(&vs.root(), 5, &LayerNormConfig::default());
        let input = Tensor::ones(&[3, 4], (Kind::Float, Device::Cpu));
        assert!(norm.f_forward(&input).is_err());
    }
}
