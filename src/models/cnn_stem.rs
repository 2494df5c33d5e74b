//! Convolutional feature extraction for image observations.
use super::Network;
use crate::error::{check_features, check_rank, ModelError};
use crate::torch::modules::{
    f_fold_leading, f_unfold_leading, Activation, Conv2d, Conv2dConfig, FeedForwardModule,
    Linear, LinearConfig, Module,
};
use log::debug;
use serde::{Deserialize, Serialize};
use tch::{nn::Path, Tensor};

/// A single convolution layer of a [`CnnStem`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConvLayerConfig {
    /// Number of output channels.
    pub channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    #[serde(default)]
    pub padding: usize,
}

impl ConvLayerConfig {
    fn conv_config(&self, init: &LinearConfig) -> Conv2dConfig {
        Conv2dConfig {
            kernel_size: self.kernel_size,
            stride: self.stride,
            padding: self.padding,
            kernel_init: init.kernel_init,
            bias_init: init.bias_init,
        }
    }
}

/// Configuration for [`CnnStem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CnnStemConfig {
    /// Convolution layers, applied in order.
    pub conv_layers: Vec<ConvLayerConfig>,
    /// Activation function after each convolution.
    pub activation: Activation,
    /// Activation function on the output features.
    pub output_activation: Activation,
    /// Initializers for the convolution and projection layers.
    pub linear_config: LinearConfig,
}

impl Default for CnnStemConfig {
    fn default() -> Self {
        Self {
            conv_layers: vec![
                ConvLayerConfig {
                    channels: 16,
                    kernel_size: 8,
                    stride: 4,
                    padding: 0,
                },
                ConvLayerConfig {
                    channels: 32,
                    kernel_size: 4,
                    stride: 2,
                    padding: 0,
                },
            ],
            activation: Activation::Relu,
            output_activation: Activation::Relu,
            linear_config: LinearConfig::default(),
        }
    }
}

/// Reduces image observations to a flat feature vector.
///
/// A stack of convolutions (each followed by an activation), flattened and projected by a linear
/// layer to `out_dim` features.
/// Accepts `[BATCH, C, H, W]` inputs or `[BATCH, TIME, C, H, W]` sequences of frames.
#[derive(Debug)]
pub struct CnnStem {
    convs: Vec<Conv2d>,
    activation: Activation,
    output: Linear,
    output_activation: Activation,
    obs_shape: [i64; 3],
    out_dim: usize,
}

impl CnnStem {
    /// Create a new stem.
    ///
    /// # Args
    /// * `vs` - Variable store and namespace.
    /// * `obs_shape` - Observation shape `[CHANNELS, HEIGHT, WIDTH]`.
    /// * `out_dim` - Number of output features.
    /// * `config` - Layer configuration.
    ///
    /// Fails if the observation is too small for the convolution layers.
    pub fn new(
        vs: &Path,
        obs_shape: [usize; 3],
        out_dim: usize,
        config: &CnnStemConfig,
    ) -> Result<Self, ModelError> {
        let [in_channels, mut height, mut width] = obs_shape;
        let mut channels = in_channels;
        let mut convs = Vec::with_capacity(config.conv_layers.len());
        for (i, layer) in config.conv_layers.iter().enumerate() {
            let conv_config = layer.conv_config(&config.linear_config);
            (height, width) = conv_config.output_size(height, width)?;
            convs.push(Conv2d::new(
                &(vs / format!("conv_{}", i)),
                channels,
                layer.channels,
                &conv_config,
            ));
            channels = layer.channels;
        }
        let flat_dim = channels * height * width;
        let output = Linear::new(&(vs / "output"), flat_dim, out_dim, &config.linear_config);

        let stem = Self {
            convs,
            activation: config.activation,
            output,
            output_activation: config.output_activation,
            obs_shape: obs_shape.map(|d| d as i64),
            out_dim,
        };
        debug!(
            "built CnnStem {:?} -> [{}] via {} features; {} parameters",
            obs_shape,
            out_dim,
            flat_dim,
            stem.num_parameters()
        );
        Ok(stem)
    }

    /// Observation shape `[CHANNELS, HEIGHT, WIDTH]`.
    pub const fn obs_shape(&self) -> [i64; 3] {
        self.obs_shape
    }

    /// Number of output features.
    pub const fn out_dim(&self) -> usize {
        self.out_dim
    }
}

impl Module for CnnStem {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(self.convs.variables().chain(self.output.variables()))
    }
}

impl FeedForwardModule for CnnStem {
    fn f_forward(&self, input: &Tensor) -> Result<Tensor, ModelError> {
        let shape = input.size();
        check_rank(&shape, &[4, 5])?;
        check_features(&shape, &self.obs_shape)?;

        let (mut hidden, leading) = f_fold_leading(input, 3)?;
        for conv in &self.convs {
            hidden = self.activation.f_forward_owned(conv.f_forward(&hidden)?)?;
        }
        let features = self
            .output_activation
            .f_forward_owned(self.output.f_forward(&hidden.f_flatten(1, -1)?)?)?;
        f_unfold_leading(&features, &leading)
    }
}

impl Network for CnnStem {
    fn name(&self) -> &'static str {
        "cnn_stem"
    }

    fn input_shapes(&self) -> Vec<Vec<i64>> {
        vec![self.obs_shape.to_vec()]
    }

    fn output_dim(&self) -> usize {
        self.out_dim
    }

    fn f_evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ModelError> {
        let [obs] = super::unpack_inputs(inputs)?;
        self.f_forward(obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tch::{nn::VarStore, Device, Kind};

    const OBS_SHAPE: [usize; 3] = [3, 84, 84];
    const OUT_DIM: usize = 32;

    #[fixture]
    fn stem() -> CnnStem {
        let vs = VarStore::new(Device::Cpu);
        CnnStem::new(&vs.root(), OBS_SHAPE, OUT_DIM, &CnnStemConfig::default()).unwrap()
    }

    fn obs(leading: &[i64]) -> Tensor {
        let shape: Vec<i64> = leading
            .iter()
            .copied()
            .chain(OBS_SHAPE.iter().map(|&d| d as i64))
            .collect();
        Tensor::rand(&shape, (Kind::Float, Device::Cpu))
    }

    #[rstest]
    fn forward_batch(stem: CnnStem) {
        let _no_grad = tch::no_grad_guard();
        assert_eq!(stem.forward(&obs(&[4])).size(), vec![4, OUT_DIM as i64]);
    }

    #[rstest]
    fn forward_time_batch(stem: CnnStem) {
        let _no_grad = tch::no_grad_guard();
        assert_eq!(
            stem.forward(&obs(&[2, 3])).size(),
            vec![2, 3, OUT_DIM as i64]
        );
    }

    #[rstest]
    fn time_batch_matches_steps(stem: CnnStem) {
        let _no_grad = tch::no_grad_guard();
        let input = obs(&[2, 3]);
        let output = stem.forward(&input);
        for b in 0..2 {
            let step_output = stem.forward(&input.get(b));
            assert!(step_output.allclose(&output.get(b), 1e-5, 1e-6, false));
        }
    }

    #[rstest]
    fn output_nonnegative(stem: CnnStem) {
        let _no_grad = tch::no_grad_guard();
        let output = stem.forward(&obs(&[4]));
        assert!(bool::from(output.greater_equal(0.0).all()));
    }

    #[rstest]
    #[case(&[3, 84, 84])]
    #[case(&[1, 1, 2, 3, 84, 84])]
    fn forward_invalid_rank(stem: CnnStem, #[case] shape: &[i64]) {
        let input = Tensor::zeros(shape, (Kind::Float, Device::Cpu));
        assert!(matches!(
            stem.f_forward(&input),
            Err(ModelError::InvalidRank { .. })
        ));
    }

    #[rstest]
    fn forward_wrong_obs_shape(stem: CnnStem) {
        let input = Tensor::zeros(&[4, 3, 64, 64], (Kind::Float, Device::Cpu));
        assert!(matches!(
            stem.f_forward(&input),
            Err(ModelError::FeatureDim { .. })
        ));
    }

    #[test]
    fn obs_too_small() {
        let vs = VarStore::new(Device::Cpu);
        let result = CnnStem::new(&vs.root(), [3, 10, 10], OUT_DIM, &CnnStemConfig::default());
        assert!(matches!(result, Err(ModelError::InputTooSmall { .. })));
    }

    #[test]
    fn zero_stride() {
        let config = CnnStemConfig {
            conv_layers: vec![ConvLayerConfig {
                channels: 4,
                kernel_size: 3,
                stride: 0,
                padding: 0,
            }],
            ..CnnStemConfig::default()
        };
        let vs = VarStore::new(Device::Cpu);
        let result = CnnStem::new(&vs.root(), [1, 8, 8], OUT_DIM, &config);
        assert!(matches!(result, Err(ModelError::Config(_))));
    }

    #[rstest]
    fn parameter_count(stem: CnnStem) {
        // 84 -> 20 -> 9
        let conv1 = 16 * 3 * 8 * 8 + 16;
        let conv2 = 32 * 16 * 4 * 4 + 32;
        let linear = 32 * 9 * 9 * OUT_DIM + OUT_DIM;
        assert_eq!(stem.num_parameters(), conv1 + conv2 + linear);
    }

    #[test]
    fn no_conv_layers() {
        let config = CnnStemConfig {
            conv_layers: vec![],
            ..CnnStemConfig::default()
        };
        let vs = VarStore::new(Device::Cpu);
        let stem = CnnStem::new(&vs.root(), [1, 4, 4], 5, &config).unwrap();
        let input = Tensor::rand(&[2, 1, 4, 4], (Kind::Float, Device::Cpu));
        assert_eq!(stem.forward(&input).size(), vec![2, 5]);
    }

    #[test]
    fn config_deserialize_partial() {
        let config: CnnStemConfig =
            serde_json::from_str(r#"{"conv_layers": [{"channels": 8, "kernel_size": 3, "stride": 1}]}"#)
                .unwrap();
        assert_eq!(config.conv_layers[0].padding, 0);
        assert_eq!(config.output_activation, Activation::Relu);
    }
}
