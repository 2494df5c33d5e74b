//! Actor, critic, and feature extraction networks.
//!
//! Every network accepts either a batch of inputs `[BATCH, *FEATURES]`
//! or a batch of sequences `[BATCH, TIME, *FEATURES]` and preserves the leading dimensions.
mod cnn_stem;
mod ddpg;
mod ppo;

pub use cnn_stem::{CnnStem, CnnStemConfig, ConvLayerConfig};
pub use ddpg::{Actor, ActorConfig, Critic, CriticConfig, SplitCritic, SplitCriticConfig};
pub use ppo::{PpoActor, PpoActorConfig, PpoCritic, PpoCriticConfig};

use crate::error::{check_features, check_rank, ModelError};
use crate::torch::Module;
use tch::Tensor;

/// A module evaluated on an (observation, action) pair.
pub trait StateActionModule: Module {
    /// Evaluate on a batch of observations and the corresponding actions.
    ///
    /// `obs` and `action` must share their leading (batch) dimensions.
    fn f_forward(&self, obs: &Tensor, action: &Tensor) -> Result<Tensor, ModelError>;

    /// Evaluate on a batch of observations and the corresponding actions.
    ///
    /// # Panics
    /// If the inputs are not accepted by the module. See [`StateActionModule::f_forward`].
    fn forward(&self, obs: &Tensor, action: &Tensor) -> Tensor {
        self.f_forward(obs, action)
            .unwrap_or_else(|err| panic!("forward failed: {}", err))
    }
}

/// Type-erased view of a network for inspection and generic evaluation.
pub trait Network: Module + Send {
    /// Short descriptive name.
    fn name(&self) -> &'static str;

    /// Trailing feature shape of each input tensor.
    fn input_shapes(&self) -> Vec<Vec<i64>>;

    /// Size of the trailing output dimension.
    fn output_dim(&self) -> usize;

    /// Evaluate the network on its input tensors (in the order of [`Network::input_shapes`]).
    fn f_evaluate(&self, inputs: &[Tensor]) -> Result<Tensor, ModelError>;
}

/// Check a flat feature input: shape `[BATCH, dim]` or `[BATCH, TIME, dim]`.
fn check_flat_input(input: &Tensor, dim: usize) -> Result<Vec<i64>, ModelError> {
    let shape = input.size();
    check_rank(&shape, &[2, 3])?;
    check_features(&shape, &[dim as i64])?;
    Ok(shape)
}

/// Unpack a slice of exactly `N` input tensors.
fn unpack_inputs<const N: usize>(inputs: &[Tensor]) -> Result<&[Tensor; N], ModelError> {
    inputs.try_into().map_err(|_| ModelError::InputCount {
        expected: N,
        actual: inputs.len(),
    })
}
