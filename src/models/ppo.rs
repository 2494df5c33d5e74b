//! Actor and critic networks for proximal policy optimization.
use super::{check_flat_input, unpack_inputs, Network};
use crate::error::ModelError;
use crate::torch::initializers::Initializer;
use crate::torch::modules::{
    f_fold_leading, f_unfold_leading, Activation, BuildModule, FeedForwardModule, LinearConfig,
    Mlp, MlpConfig, Module,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::iter;
use tch::{nn::Path, Tensor};

/// Configuration for [`PpoActor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PpoActorConfig {
    pub hidden_sizes: Vec<usize>,
    pub activation: Activation,
    /// Initial value of each element of the log standard deviation parameter.
    pub init_log_sig: f64,
    pub linear_config: LinearConfig,
}

impl Default for PpoActorConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![64, 64],
            activation: Activation::Tanh,
            init_log_sig: 0.0,
            linear_config: LinearConfig::default(),
        }
    }
}

/// Gaussian policy network for PPO.
///
/// The output is the concatenation `[mean, std]` of the action distribution parameters
/// so it has `2 * action_dim` features.
/// The mean is a function of the observation while the standard deviation is a learned
/// parameter shared by all observations.
#[derive(Debug)]
pub struct PpoActor {
    mlp: Mlp,
    /// Log standard deviation; shape `[1, action_dim]`
    log_var: Tensor,
    obs_dim: usize,
    action_dim: usize,
}

impl PpoActor {
    pub fn new(vs: &Path, obs_dim: usize, action_dim: usize, config: &PpoActorConfig) -> Self {
        let mlp_config = MlpConfig {
            hidden_sizes: config.hidden_sizes.clone(),
            activation: config.activation,
            output_activation: Activation::Identity,
            layer_norm: None,
            linear_config: config.linear_config,
        };
        let mlp = mlp_config.build_module(&(vs / "mean"), obs_dim, action_dim);
        let log_var =
            Initializer::Constant(config.init_log_sig).add_var(vs, "log_var", &[1, action_dim], None);
        let actor = Self {
            mlp,
            log_var,
            obs_dim,
            action_dim,
        };
        debug!(
            "built PpoActor [{}] -> [2 x {}]; {} parameters",
            obs_dim,
            action_dim,
            actor.num_parameters()
        );
        actor
    }

    /// Standard deviation of the action distribution; shape `[1, action_dim]`.
    pub fn std(&self) -> Tensor {
        self.log_var.exp()
    }

    /// The learned log standard deviation parameter; shape `[1, action_dim]`.
    pub const fn log_var(&self) -> &Tensor {
        &self.log_var
    }

    /// Split a [`PpoActor`] output into its `(mean, std)` halves along the last dimension.
    pub fn f_split_output(&self, output: &Tensor) -> Result<(Tensor, Tensor), ModelError> {
        let shape = output.size();
        let dim = self.action_dim as i64;
        if shape.last() != Some(&(2 * dim)) {
            return Err(ModelError::FeatureDim {
                expected: vec![2 * dim],
                actual: shape.last().copied().into_iter().collect(),
            });
        }
        Ok((output.f_narrow(-1, 0, dim)?, output.f_narrow(-1, dim, dim)?))
    }
}

impl Module for PpoActor {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(self.mlp.variables().chain(iter::once(&self.log_var)))
    }
}

impl FeedForwardModule for PpoActor {
    fn f_forward(&self, obs: &Tensor) -> Result<Tensor, ModelError> {
        check_flat_input(obs, self.obs_dim)?;
        let (obs, leading) = f_fold_leading(obs, 1)?;
        let mean = self.mlp.f_forward(&obs)?;
        let std = self.log_var.f_exp()?.f_expand_as(&mean)?;
        let output = Tensor::f_cat(&[&mean, &std], 1)?;
        f_unfold_leading(&output, &leading)
    }
}

impl Network for PpoActor {
    fn name(&self) -> &'static str {
        "ppo_actor"
    }

    fn input_shapes(&self) -> Vec<Vec<i64>> {
        vec![vec![self.obs_dim as i64]]
    }

    fn output_dim(&self) -> usize {
        2 * self.action_dim
    }

    fn f_evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ModelError> {
        let [obs] = unpack_inputs(inputs)?;
        self.f_forward(obs)
    }
}

/// Configuration for [`PpoCritic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PpoCriticConfig {
    pub hidden_sizes: Vec<usize>,
    pub activation: Activation,
    pub linear_config: LinearConfig,
}

impl Default for PpoCriticConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![64, 64],
            activation: Activation::Tanh,
            linear_config: LinearConfig::default(),
        }
    }
}

/// State-value network for PPO.
#[derive(Debug)]
pub struct PpoCritic {
    mlp: Mlp,
    obs_dim: usize,
}

impl PpoCritic {
    pub fn new(vs: &Path, obs_dim: usize, config: &PpoCriticConfig) -> Self {
        let mlp_config = MlpConfig {
            hidden_sizes: config.hidden_sizes.clone(),
            activation: config.activation,
            output_activation: Activation::Identity,
            layer_norm: None,
            linear_config: config.linear_config,
        };
        let mlp = mlp_config.build_module(vs, obs_dim, 1);
        debug!(
            "built PpoCritic [{}] -> [1]; {} parameters",
            obs_dim,
            mlp.num_parameters()
        );
        Self { mlp, obs_dim }
    }
}

impl Module for PpoCritic {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        self.mlp.variables()
    }
}

impl FeedForwardModule for PpoCritic {
    fn f_forward(&self, obs: &Tensor) -> Result<Tensor, ModelError> {
        check_flat_input(obs, self.obs_dim)?;
        let (obs, leading) = f_fold_leading(obs, 1)?;
        f_unfold_leading(&self.mlp.f_forward(&obs)?, &leading)
    }
}

impl Network for PpoCritic {
    fn name(&self) -> &'static str {
        "ppo_critic"
    }

    fn input_shapes(&self) -> Vec<Vec<i64>> {
        vec![vec![self.obs_dim as i64]]
    }

    fn output_dim(&self) -> usize {
        1
    }

    fn f_evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ModelError> {
        let [obs] = unpack_inputs(inputs)?;
        self.f_forward(obs)
    }
}
