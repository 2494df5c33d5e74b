//! Two-dimensional convolution layer
use super::{BuildModule, FeedForwardModule, Module};
use crate::error::{check_rank, ModelError};
use crate::torch::initializers::Initializer;
use serde::{Deserialize, Serialize};
use std::iter;
use tch::{nn::Path, Tensor};

/// Configuration for the [`Conv2d`] module.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conv2dConfig {
    /// Height and width of the (square) kernel.
    pub kernel_size: usize,
    pub stride: usize,
    /// Zero padding added to each side of the input.
    pub padding: usize,
    pub kernel_init: Initializer,
    pub bias_init: Option<Initializer>,
}

impl Default for Conv2dConfig {
    fn default() -> Self {
        Self {
            kernel_size: 3,
            stride: 1,
            padding: 0,
            kernel_init: Initializer::default(),
            bias_init: Some(Initializer::default()),
        }
    }
}

impl Conv2dConfig {
    /// Output spatial size `(height, width)` for an input of the given spatial size.
    ///
    /// Fails with [`ModelError::Config`] if the kernel size or stride is zero.
    pub fn output_size(&self, height: usize, width: usize) -> Result<(usize, usize), ModelError> {
        if self.kernel_size == 0 || self.stride == 0 {
            return Err(ModelError::Config(format!(
                "convolution kernel size and stride must be nonzero; got {} and {}",
                self.kernel_size, self.stride
            )));
        }
        let too_small = || ModelError::InputTooSmall {
            height,
            width,
            kernel_size: self.kernel_size,
            padding: self.padding,
        };
        let out = |x: usize| {
            (x + 2 * self.padding)
                .checked_sub(self.kernel_size)
                .map(|span| span / self.stride + 1)
        };
        Ok((out(height).ok_or_else(too_small)?, out(width).ok_or_else(too_small)?))
    }
}

/// Builds a layer mapping `in_dim` input channels to `out_dim` output channels.
impl BuildModule for Conv2dConfig {
    type Module = Conv2d;

    fn build_module(&self, vs: &Path, in_dim: usize, out_dim: usize) -> Self::Module {
        Conv2d::new(vs, in_dim, out_dim, self)
    }
}

/// 2D convolution over inputs of shape `[BATCH, CHANNELS, HEIGHT, WIDTH]`.
#[derive(Debug)]
pub struct Conv2d {
    kernel: Tensor,
    bias: Option<Tensor>,
    stride: i64,
    padding: i64,
}

impl Conv2d {
    pub fn new(vs: &Path, in_channels: usize, out_channels: usize, config: &Conv2dConfig) -> Self {
        let k = config.kernel_size;
        let fan_in = Some(in_channels * k * k + 1);
        Self {
            kernel: config
                .kernel_init
                .add_var(vs, "kernel", &[out_channels, in_channels, k, k], fan_in),
            bias: config
                .bias_init
                .map(|init| init.add_var(vs, "bias", &[out_channels], fan_in)),
            stride: config.stride as i64,
            padding: config.padding as i64,
        }
    }
}

impl Module for Conv2d {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(iter::once(&self.kernel).chain(self.bias.iter()))
    }
}

impl FeedForwardModule for Conv2d {
    fn f_forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        check_rank(&input.size(), &[4])?;
        Ok(input.f_conv2d(
            &self.kernel,
            self.bias.as_ref(),
            &[self.stride, self.stride],
            &[self.padding, self.padding],
            &[1, 1],
            1,
        )?)
    }
}
