//! Torch modules
mod activation;
mod conv;
mod fold;
mod layer_norm;
mod linear;
mod mlp;
#[cfg(test)]
pub mod testing;

pub use activation::Activation;
pub use conv::{Conv2d, Conv2dConfig};
pub use fold::{f_fold_leading, f_unfold_leading, LeadingShape};
pub use layer_norm::{LayerNorm, LayerNormConfig};
pub use linear::{Linear, LinearConfig};
pub use mlp::{Mlp, MlpConfig};

use crate::error::ModelError;
use tch::{nn::Path, Tensor};

/// A neural network module holding (possibly zero) parameter tensors.
pub trait Module {
    /// All variables used by this module.
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_>;

    /// All trainable variables used by this module.
    fn trainable_variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(self.variables().filter(|t| t.requires_grad()))
    }

    /// Total number of scalar parameters.
    fn num_parameters(&self) -> usize {
        self.variables().map(Tensor::numel).sum()
    }
}

/// A feed-forward neural network module.
pub trait FeedForwardModule: Module {
    /// Apply the module to a batch of inputs.
    ///
    /// Returns an error if the input shape is not accepted by the module.
    fn f_forward(&self, input: &Tensor) -> Result<Tensor, ModelError>;

    /// Apply the module to a batch of inputs.
    ///
    /// # Panics
    /// If the input shape is not accepted by the module. See [`FeedForwardModule::f_forward`].
    fn forward(&self, input: &Tensor) -> Tensor {
        self.f_forward(input)
            .unwrap_or_else(|err| panic!("forward failed: {}", err))
    }
}

/// Build a [`FeedForwardModule`] from a configuration.
pub trait BuildModule {
    type Module: FeedForwardModule;

    /// Build a new module instance.
    ///
    /// # Args
    /// * `vs` - Variable store and namespace.
    /// * `in_dim` - Number of input feature dimensions.
    /// * `out_dim` - Number of output feature dimensions.
    fn build_module(&self, vs: &Path, in_dim: usize, out_dim: usize) -> Self::Module;
}

impl<M: Module + ?Sized> Module for Box<M> {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        self.as_ref().variables()
    }

    fn trainable_variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        self.as_ref().trainable_variables()
    }
}

impl<M: Module> Module for [M] {
    fn variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(self.iter().flat_map(Module::variables))
    }

    fn trainable_variables(&self) -> Box<dyn Iterator<Item = &Tensor> + '_> {
        Box::new(self.iter().flat_map(Module::trainable_variables))
    }
}
