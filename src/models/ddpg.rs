//! Deterministic actor and critic networks for continuous control.
use super::{check_flat_input, unpack_inputs, Network, StateActionModule};
use crate::error::ModelError;
use crate::torch::modules::{
    Activation, BuildModule, FeedForwardModule, LayerNormConfig, Linear, LinearConfig, Mlp,
    MlpConfig, Module,
};
use log::debug;
use serde::{Deserialize, Serialize};
use tch::{nn::Path, Tensor};

/// Configuration for [`Actor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActorConfig {
    pub hidden_sizes: Vec<usize>,
    /// Activation function of the hidden layers.
    pub activation: Activation,
    /// Layer normalization after each hidden layer.
    pub layer_norm: bool,
    pub linear_config: LinearConfig,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![64, 64],
            activation: Activation::Relu,
            layer_norm: false,
            linear_config: LinearConfig::default(),
        }
    }
}

impl ActorConfig {
    /// A single layer-normalized hidden layer of the given size (commonly 200).
    pub fn layer_norm(hidden_size: usize) -> Self {
        Self {
            hidden_sizes: vec![hidden_size],
            layer_norm: true,
            ..Self::default()
        }
    }

    fn mlp_config(&self) -> MlpConfig {
        MlpConfig {
            hidden_sizes: self.hidden_sizes.clone(),
            activation: self.activation,
            output_activation: Activation::Tanh,
            layer_norm: self.layer_norm.then(LayerNormConfig::default),
            linear_config: self.linear_config,
        }
    }
}

/// Deterministic policy network mapping observations to actions in `[-1, 1]`.
#[derive(Debug)]
pub struct Actor {
    mlp: Mlp,
    obs_dim: usize,
    action_dim: usize,
}

impl Actor {
    pub fn new(vs: &Path, obs_dim: usize, action_dim: usize, config: &ActorConfig) -> Self {
        let mlp = config.mlp_config().build_module(vs, obs_dim, action_dim);
        debug!(
            "built Actor [{}] -> [{}]; {} parameters",
            obs_dim,
            action_dim,
            mlp.num_parameters()
        );
        Self {
            mlp,
            obs_dim,
            action_dim,
        }
    }
}

impl Module for Actor {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        self.mlp.variables()
    }
}

impl FeedForwardModule for Actor {
    fn f_forward(&self, obs: &Tensor) -> Result<Tensor, ModelError> {
        check_flat_input(obs, self.obs_dim)?;
        self.mlp.f_forward(obs)
    }
}

impl Network for Actor {
    fn name(&self) -> &'static str {
        "actor"
    }

    fn input_shapes(&self) -> Vec<Vec<i64>> {
        vec![vec![self.obs_dim as i64]]
    }

    fn output_dim(&self) -> usize {
        self.action_dim
    }

    fn f_evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ModelError> {
        let [obs] = unpack_inputs(inputs)?;
        self.f_forward(obs)
    }
}

/// Check that an (observation, action) pair have matching batch shapes and feature dims.
fn check_obs_action(
    obs: &Tensor,
    obs_dim: usize,
    action: &Tensor,
    action_dim: usize,
) -> Result<(), ModelError> {
    let obs_shape = check_flat_input(obs, obs_dim)?;
    let action_shape = check_flat_input(action, action_dim)?;
    let obs_batch = &obs_shape[..obs_shape.len() - 1];
    let action_batch = &action_shape[..action_shape.len() - 1];
    if obs_batch == action_batch {
        Ok(())
    } else {
        Err(ModelError::BatchMismatch {
            left: obs_batch.to_vec(),
            right: action_batch.to_vec(),
        })
    }
}

/// Configuration for [`Critic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CriticConfig {
    pub hidden_sizes: Vec<usize>,
    pub activation: Activation,
    /// Layer normalization after each hidden layer.
    pub layer_norm: bool,
    pub linear_config: LinearConfig,
}

impl Default for CriticConfig {
    fn default() -> Self {
        Self {
            hidden_sizes: vec![300],
            activation: Activation::Relu,
            layer_norm: true,
            linear_config: LinearConfig::default(),
        }
    }
}

/// Action-value network of the concatenated observation and action.
#[derive(Debug)]
pub struct Critic {
    mlp: Mlp,
    obs_dim: usize,
    action_dim: usize,
}

impl Critic {
    pub fn new(vs: &Path, obs_dim: usize, action_dim: usize, config: &CriticConfig) -> Self {
        let mlp_config = MlpConfig {
            hidden_sizes: config.hidden_sizes.clone(),
            activation: config.activation,
            output_activation: Activation::Identity,
            layer_norm: config.layer_norm.then(LayerNormConfig::default),
            linear_config: config.linear_config,
        };
        let mlp = mlp_config.build_module(vs, obs_dim + action_dim, 1);
        debug!(
            "built Critic [{}] x [{}] -> [1]; {} parameters",
            obs_dim,
            action_dim,
            mlp.num_parameters()
        );
        Self {
            mlp,
            obs_dim,
            action_dim,
        }
    }
}

impl Module for Critic {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        self.mlp.variables()
    }
}

impl StateActionModule for Critic {
    fn f_forward(&self, obs: &Tensor, action: &Tensor) -> Result<Tensor, ModelError> {
        check_obs_action(obs, self.obs_dim, action, self.action_dim)?;
        self.mlp.f_forward(&Tensor::f_cat(&[obs, action], -1)?)
    }
}

impl Network for Critic {
    fn name(&self) -> &'static str {
        "critic"
    }

    fn input_shapes(&self) -> Vec<Vec<i64>> {
        vec![vec![self.obs_dim as i64], vec![self.action_dim as i64]]
    }

    fn output_dim(&self) -> usize {
        1
    }

    fn f_evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ModelError> {
        let [obs, action] = unpack_inputs(inputs)?;
        StateActionModule::f_forward(self, obs, action)
    }
}

/// Configuration for [`SplitCritic`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitCriticConfig {
    /// Size of the observation-only hidden layer.
    pub obs_hidden_size: usize,
    /// Size of the hidden layer over the observation features and the action.
    pub hidden_size: usize,
    pub activation: Activation,
    pub linear_config: LinearConfig,
}

impl Default for SplitCriticConfig {
    fn default() -> Self {
        Self {
            obs_hidden_size: 64,
            hidden_size: 64,
            activation: Activation::Relu,
            linear_config: LinearConfig::default(),
        }
    }
}

/// Action-value network that embeds the observation before joining it with the action.
///
/// `obs -> Linear -> act`, concatenated with `action`, then `Linear -> act -> Linear(1)`.
#[derive(Debug)]
pub struct SplitCritic {
    obs_layer: Linear,
    activation: Activation,
    joint: Mlp,
    obs_dim: usize,
    action_dim: usize,
}

impl SplitCritic {
    pub fn new(vs: &Path, obs_dim: usize, action_dim: usize, config: &SplitCriticConfig) -> Self {
        let obs_layer = config
            .linear_config
            .build_module(&(vs / "obs"), obs_dim, config.obs_hidden_size);
        let joint_config = MlpConfig {
            hidden_sizes: vec![config.hidden_size],
            activation: config.activation,
            output_activation: Activation::Identity,
            layer_norm: None,
            linear_config: config.linear_config,
        };
        let joint =
            joint_config.build_module(&(vs / "joint"), config.obs_hidden_size + action_dim, 1);
        debug!(
            "built SplitCritic [{}] x [{}] -> [1]; {} parameters",
            obs_dim,
            action_dim,
            obs_layer.num_parameters() + joint.num_parameters()
        );
        Self {
            obs_layer,
            activation: config.activation,
            joint,
            obs_dim,
            action_dim,
        }
    }
}

impl Module for SplitCritic {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(self.obs_layer.variables().chain(self.joint.variables()))
    }
}

impl StateActionModule for SplitCritic {
    fn f_forward(&self, obs: &Tensor, action: &Tensor) -> Result<Tensor, ModelError> {
        check_obs_action(obs, self.obs_dim, action, self.action_dim)?;
        let obs_features = self
            .activation
            .f_forward_owned(self.obs_layer.f_forward(obs)?)?;
        self.joint
            .f_forward(&Tensor::f_cat(&[&obs_features, action], -1)?)
    }
}

impl Network for SplitCritic {
    fn name(&self) -> &'static str {
        "split_critic"
    }

    fn input_shapes(&self) -> Vec<Vec<i64>> {
        vec![vec![self.obs_dim as i64], vec![self.action_dim as i64]]
    }

    fn output_dim(&self) -> usize {
        1
    }

    fn f_evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ModelError> {
        let [obs, action] = unpack_inputs(inputs)?;
        StateActionModule::f_forward(self, obs, action)
    }
}
