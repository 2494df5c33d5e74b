use clap::{Args, Parser, Subcommand};
use log::info;
use rlnets::models::{
    ActorConfig, CnnStemConfig, CriticConfig, PpoActorConfig, PpoCriticConfig, SplitCriticConfig,
};
use rlnets::torch::Activation;
use rlnets::{ModelConfig, ModelError};
use std::error::Error;
use std::iter;
use std::path::PathBuf;
use tch::{nn::VarStore, Device, Kind, Tensor};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    version,
    author,
    about,
    after_help = "Evaluates the network on zero inputs and reports the input and output shapes."
)]
struct Options {
    #[command(subcommand)]
    model: ModelCommand,

    /// Batch size of the evaluation inputs
    #[arg(long, default_value_t = 4)]
    batch_size: i64,

    /// Evaluate on a batch of sequences of this length
    #[arg(long)]
    seq_len: Option<i64>,

    /// Save the initialized parameters to this file
    #[arg(long)]
    save: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ModelCommand {
    /// Read the model definition from a JSON file
    FromConfig { path: PathBuf },
    /// Convolutional feature extractor for image observations
    CnnStem {
        /// Observation shape
        #[arg(long, num_args = 3, value_names = ["CHANNELS", "HEIGHT", "WIDTH"], required = true)]
        obs_shape: Vec<usize>,
        /// Number of output features
        #[arg(long)]
        out_dim: usize,
    },
    /// Deterministic actor
    Actor {
        #[command(flatten)]
        dims: ObsActionDims,
        #[command(flatten)]
        mlp: MlpOptions,
        /// Single layer-normalized hidden layer of this size
        #[arg(long, conflicts_with = "hidden_sizes")]
        layer_norm: Option<usize>,
    },
    /// Critic of the concatenated observation and action
    Critic {
        #[command(flatten)]
        dims: ObsActionDims,
        #[command(flatten)]
        mlp: MlpOptions,
        /// Disable layer normalization
        #[arg(long)]
        no_layer_norm: bool,
    },
    /// Critic that embeds the observation before joining the action
    SplitCritic {
        #[command(flatten)]
        dims: ObsActionDims,
        /// Size of the observation-only hidden layer
        #[arg(long)]
        obs_hidden_size: Option<usize>,
        /// Size of the joint hidden layer
        #[arg(long)]
        hidden_size: Option<usize>,
    },
    /// PPO Gaussian policy
    PpoActor {
        #[command(flatten)]
        dims: ObsActionDims,
        #[command(flatten)]
        mlp: MlpOptions,
        /// Initial log standard deviation
        #[arg(long, allow_hyphen_values = true)]
        init_log_sig: Option<f64>,
    },
    /// PPO state-value function
    PpoCritic {
        /// Number of observation features
        #[arg(long)]
        obs_dim: usize,
        #[command(flatten)]
        mlp: MlpOptions,
    },
}

#[derive(Args, Debug)]
struct ObsActionDims {
    /// Number of observation features
    #[arg(long)]
    obs_dim: usize,
    /// Number of action features
    #[arg(long)]
    action_dim: usize,
}

#[derive(Args, Debug)]
struct MlpOptions {
    /// Hidden layer sizes
    #[arg(long, value_delimiter = ',')]
    hidden_sizes: Option<Vec<usize>>,
    /// Hidden layer activation function
    #[arg(long, value_enum)]
    activation: Option<Activation>,
}

impl MlpOptions {
    fn apply(&self, hidden_sizes: &mut Vec<usize>, activation: &mut Activation) {
        if let Some(sizes) = &self.hidden_sizes {
            *hidden_sizes = sizes.clone();
        }
        if let Some(act) = self.activation {
            *activation = act;
        }
    }
}

impl ModelCommand {
    fn model_config(&self) -> Result<ModelConfig, ModelError> {
        use ModelCommand::*;
        Ok(match self {
            FromConfig { path } => ModelConfig::from_json_file(path)?,
            CnnStem { obs_shape, out_dim } => ModelConfig::CnnStem {
                obs_shape: obs_shape.as_slice().try_into().map_err(|_| {
                    ModelError::Config(format!("expected 3 obs_shape values, got {:?}", obs_shape))
                })?,
                out_dim: *out_dim,
                config: CnnStemConfig::default(),
            },
            Actor {
                dims,
                mlp,
                layer_norm,
            } => {
                let mut config = layer_norm.map_or_else(ActorConfig::default, ActorConfig::layer_norm);
                mlp.apply(&mut config.hidden_sizes, &mut config.activation);
                ModelConfig::Actor {
                    obs_dim: dims.obs_dim,
                    action_dim: dims.action_dim,
                    config,
                }
            }
            Critic {
                dims,
                mlp,
                no_layer_norm,
            } => {
                let mut config = CriticConfig {
                    layer_norm: !no_layer_norm,
                    ..CriticConfig::default()
                };
                mlp.apply(&mut config.hidden_sizes, &mut config.activation);
                ModelConfig::Critic {
                    obs_dim: dims.obs_dim,
                    action_dim: dims.action_dim,
                    config,
                }
            }
            SplitCritic {
                dims,
                obs_hidden_size,
                hidden_size,
            } => {
                let mut config = SplitCriticConfig::default();
                if let Some(size) = obs_hidden_size {
                    config.obs_hidden_size = *size;
                }
                if let Some(size) = hidden_size {
                    config.hidden_size = *size;
                }
                ModelConfig::SplitCritic {
                    obs_dim: dims.obs_dim,
                    action_dim: dims.action_dim,
                    config,
                }
            }
            PpoActor {
                dims,
                mlp,
                init_log_sig,
            } => {
                let mut config = PpoActorConfig::default();
                mlp.apply(&mut config.hidden_sizes, &mut config.activation);
                if let Some(init_log_sig) = init_log_sig {
                    config.init_log_sig = *init_log_sig;
                }
                ModelConfig::PpoActor {
                    obs_dim: dims.obs_dim,
                    action_dim: dims.action_dim,
                    config,
                }
            }
            PpoCritic { obs_dim, mlp } => {
                let mut config = PpoCriticConfig::default();
                mlp.apply(&mut config.hidden_sizes, &mut config.activation);
                ModelConfig::PpoCritic {
                    obs_dim: *obs_dim,
                    config,
                }
            }
        })
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = Options::parse();
    let config = opts.model.model_config()?;
    info!("model config: {:?}", config);

    let vs = VarStore::new(Device::Cpu);
    let network = config.build(&vs.root())?;

    let leading: Vec<i64> = iter::once(opts.batch_size).chain(opts.seq_len).collect();
    let inputs: Vec<Tensor> = network
        .input_shapes()
        .iter()
        .map(|features| {
            let shape: Vec<i64> = leading.iter().chain(features).copied().collect();
            Tensor::zeros(&shape, (Kind::Float, Device::Cpu))
        })
        .collect();
    let output = tch::no_grad(|| network.f_evaluate(&inputs))?;

    println!("Network: {}", network.name());
    for (i, input) in inputs.iter().enumerate() {
        println!("Input {}: {:?}", i, input.size());
    }
    println!("Output: {:?}", output.size());
    println!("Parameters: {}", network.num_parameters());

    if let Some(path) = &opts.save {
        vs.save(path)?;
        info!("saved parameters to {}", path.display());
    }
    Ok(())
}
