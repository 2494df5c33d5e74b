//! Serializable model definitions.
use crate::error::ModelError;
use crate::models::{
    Actor, ActorConfig, CnnStem, CnnStemConfig, Critic, CriticConfig, Network, PpoActor,
    PpoActorConfig, PpoCritic, PpoCriticConfig, SplitCritic, SplitCriticConfig,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use tch::nn;

/// A network type along with its dimensions and configuration.
///
/// Serialized in the externally tagged form, for example
/// `{"ppo_actor": {"obs_dim": 8, "action_dim": 2, "config": {"init_log_sig": -0.5}}}`.
/// The `config` field may be omitted to use the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ModelConfig {
    CnnStem {
        /// Observation shape `[CHANNELS, HEIGHT, WIDTH]`.
        obs_shape: [usize; 3],
        out_dim: usize,
        #[serde(default)]
        config: CnnStemConfig,
    },
    Actor {
        obs_dim: usize,
        action_dim: usize,
        #[serde(default)]
        config: ActorConfig,
    },
    Critic {
        obs_dim: usize,
        action_dim: usize,
        #[serde(default)]
        config: CriticConfig,
    },
    SplitCritic {
        obs_dim: usize,
        action_dim: usize,
        #[serde(default)]
        config: SplitCriticConfig,
    },
    PpoActor {
        obs_dim: usize,
        action_dim: usize,
        #[serde(default)]
        config: PpoActorConfig,
    },
    PpoCritic {
        obs_dim: usize,
        #[serde(default)]
        config: PpoCriticConfig,
    },
}

impl ModelConfig {
    /// Parse from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, ModelError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read from a JSON file.
    pub fn from_json_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ModelError> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all dimensions and layer sizes are nonzero.
    pub fn validate(&self) -> Result<(), ModelError> {
        let (dims, hidden_sizes): (Vec<(&str, usize)>, &[usize]) = match self {
            Self::CnnStem {
                obs_shape,
                out_dim,
                config,
            } => {
                if let Some(layer) = config
                    .conv_layers
                    .iter()
                    .find(|l| l.channels == 0 || l.kernel_size == 0 || l.stride == 0)
                {
                    return Err(ModelError::Config(format!(
                        "invalid convolution layer {:?}",
                        layer
                    )));
                }
                (
                    vec![
                        ("channels", obs_shape[0]),
                        ("height", obs_shape[1]),
                        ("width", obs_shape[2]),
                        ("out_dim", *out_dim),
                    ],
                    &[] as &[usize],
                )
            }
            Self::Actor {
                obs_dim,
                action_dim,
                config,
            } => (
                vec![("obs_dim", *obs_dim), ("action_dim", *action_dim)],
                config.hidden_sizes.as_slice(),
            ),
            Self::Critic {
                obs_dim,
                action_dim,
                config,
            } => (
                vec![("obs_dim", *obs_dim), ("action_dim", *action_dim)],
                config.hidden_sizes.as_slice(),
            ),
            Self::SplitCritic {
                obs_dim,
                action_dim,
                config,
            } => (
                vec![
                    ("obs_dim", *obs_dim),
                    ("action_dim", *action_dim),
                    ("obs_hidden_size", config.obs_hidden_size),
                    ("hidden_size", config.hidden_size),
                ],
                &[] as &[usize],
            ),
            Self::PpoActor {
                obs_dim,
                action_dim,
                config,
            } => (
                vec![("obs_dim", *obs_dim), ("action_dim", *action_dim)],
                config.hidden_sizes.as_slice(),
            ),
            Self::PpoCritic { obs_dim, config } => {
                (vec![("obs_dim", *obs_dim)], config.hidden_sizes.as_slice())
            }
        };
        if let Some((name, _)) = dims.iter().find(|(_, d)| *d == 0) {
            return Err(ModelError::Config(format!("{} must be nonzero", name)));
        }
        if hidden_sizes.contains(&0) {
            return Err(ModelError::Config(format!(
                "hidden sizes must be nonzero; got {:?}",
                hidden_sizes
            )));
        }
        Ok(())
    }

    /// Build the network with its parameters in `vs`.
    pub fn build(&self, vs: &nn::Path) -> Result<Box<dyn Network>, ModelError> {
        self.validate()?;
        let network: Box<dyn Network> = match self {
            Self::CnnStem {
                obs_shape,
                out_dim,
                config,
            } => Box::new(CnnStem::new(vs, *obs_shape, *out_dim, config)?),
            Self::Actor {
                obs_dim,
                action_dim,
                config,
            } => Box::new(Actor::new(vs, *obs_dim, *action_dim, config)),
            Self::Critic {
                obs_dim,
                action_dim,
                config,
            } => Box::new(Critic::new(vs, *obs_dim, *action_dim, config)),
            Self::SplitCritic {
                obs_dim,
                action_dim,
                config,
            } => Box::new(SplitCritic::new(vs, *obs_dim, *action_dim, config)),
            Self::PpoActor {
                obs_dim,
                action_dim,
                config,
            } => Box::new(PpoActor::new(vs, *obs_dim, *action_dim, config)),
            Self::PpoCritic { obs_dim, config } => Box::new(PpoCritic::new(vs, *obs_dim, config)),
        };
        Ok(network)
    }
}
