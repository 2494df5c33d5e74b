//! Tensor initializers
#![allow(clippy::use_self)] // false positive with serde derives
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tch::{nn::Path, Device, Kind, Tensor};
use thiserror::Error;

/// Tensor initializers.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    /// Initialize to all zeros
    Zeros,
    /// Initialize all elements to the given constant value.
    Constant(f64),
    /// Uniform distribution with variance scaled by the tensor dimensions.
    Uniform(VarianceScale),
    /// Normal distribution with variance scaled by the tensor dimensions.
    Normal(VarianceScale),
    /// Initialize as a (semi-)orthogonal matrix over the first and remaining dimensions.
    ///
    /// A tensor with fewer than 2 dimensions is treated as a single row.
    Orthogonal,
}

/// Defaults to `Uniform(FanAvg)` a.k.a. Glorot or Xavier initialization.
///
/// This samples from `Unif(±√(6 / (fan_in + fan_out)))`.
/// PyTorch layers use `Unif(±√(1 / fan_in))` instead, which is `Uniform(FanIn)` up to a
/// constant factor.
impl Default for Initializer {
    fn default() -> Self {
        Self::Uniform(VarianceScale::FanAvg)
    }
}

/// Variance scaling mode.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarianceScale {
    /// The initializer sampling variance is set to the given constant.
    Constant(f64),
    /// Sampling variance of `1 / fan_in`. Also known as Kaiming or He initialization.
    FanIn,
    /// Sampling variance of `1 / fan_out`.
    FanOut,
    /// Sampling variance of `2 / (fan_in + fan_out)`. Also known as Xavier or Glorot.
    FanAvg,
}

impl Default for VarianceScale {
    fn default() -> Self {
        Self::FanIn
    }
}

impl VarianceScale {
    /// Element sampling variance for the given fan in and fan out.
    fn variance(self, fan_in: usize, fan_out: usize) -> f64 {
        match self {
            Self::Constant(v) => v,
            Self::FanIn => (fan_in as f64).recip(),
            Self::FanOut => (fan_out as f64).recip(),
            Self::FanAvg => 2.0 / (fan_in as f64 + fan_out as f64),
        }
    }
}

/// Fan in and fan out of a tensor with the given shape.
///
/// Matches `torch.nn.init._calculate_fan_in_and_fan_out`: dimension 0 is the output features,
/// dimension 1 the input features, and any remaining dimensions form the receptive field
/// (as for a convolution kernel).
fn fan_in_and_fan_out(shape: &[usize]) -> (usize, usize) {
    let num_output_fmaps = shape.first().copied().unwrap_or(1);
    let num_input_fmaps = shape.get(1).copied().unwrap_or(1);
    let receptive_field_size: usize = shape.iter().skip(2).product();
    (
        num_input_fmaps * receptive_field_size,
        num_output_fmaps * receptive_field_size,
    )
}

impl Initializer {
    /// Start building a new [`Tensor`] using this initializer.
    #[must_use]
    #[inline]
    pub const fn tensor<'a>(&'a self, shape: &'a [usize]) -> TensorBuilder<'a> {
        TensorBuilder::new(self, shape)
    }

    /// Create a new trainable variable in the var store.
    ///
    /// # Args
    /// * `vs` - Var store path in which to register the variable.
    /// * `name` - Variable name within `vs`.
    /// * `shape` - Variable shape.
    /// * `fan_in` - Overrides the number of input features calculated from `shape`.
    pub fn add_var(&self, vs: &Path, name: &str, shape: &[usize], fan_in: Option<usize>) -> Tensor {
        let mut builder = self.tensor(shape).device(vs.device());
        if let Some(fan_in) = fan_in {
            builder = builder.fan_in(fan_in);
        }
        let _no_grad = tch::no_grad_guard();
        vs.var_copy(name, &builder.requires_grad(false).build())
    }
}

/// Sample a (semi-)orthogonal matrix with `shape[0]` rows, reshaped to `shape`.
fn init_orthogonal(shape: &[i64], gain: f64, options: (Kind, Device)) -> Tensor {
    let _no_grad = tch::no_grad_guard();
    let (num_rows, num_cols) = match shape {
        [rows, rest @ ..] if !rest.is_empty() => (*rows, rest.iter().product::<i64>()),
        _ => (1, shape.iter().product::<i64>()),
    };
    let mut flattened = Tensor::empty(&[num_rows, num_cols], options).normal_(0.0, 1.0);
    if num_rows < num_cols {
        let _ = flattened.t_();
    }

    // Sign correction makes the decomposition unique
    let (mut q, r) = Tensor::linalg_qr(&flattened, "reduced");
    q *= r.diag(0).sign();
    if num_rows < num_cols {
        let _ = q.t_();
    }
    q *= gain;

    // Copy for a contiguous layout
    let mut out = Tensor::empty(shape, options);
    out.copy_(&q.reshape(shape));
    out
}

/// Builder for initializing a new tensor.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TensorBuilder<'a> {
    initializer: &'a Initializer,
    shape: &'a [usize],
    gain: f64,
    fan_in: Option<usize>,
    fan_out: Option<usize>,
    requires_grad: bool,
    kind: Kind,
    device: Device,
}

impl<'a> TensorBuilder<'a> {
    #[must_use]
    #[inline]
    pub const fn new(initializer: &'a Initializer, shape: &'a [usize]) -> Self {
        Self {
            initializer,
            shape,
            gain: 1.0,
            fan_in: None,
            fan_out: None,
            requires_grad: true,
            kind: Kind::Float,
            device: Device::Cpu,
        }
    }

    /// Build the [`Tensor`].
    pub fn build(&self) -> Tensor {
        let options = (self.kind, self.device);
        let shape: SmallVec<[i64; 8]> = self.shape.iter().map(|&d| d as i64).collect();
        let (fan_in, fan_out) = fan_in_and_fan_out(self.shape);
        let fan_in = self.fan_in.unwrap_or(fan_in);
        let fan_out = self.fan_out.unwrap_or(fan_out);

        let tensor = match self.initializer {
            Initializer::Zeros => Tensor::zeros(&shape[..], options),
            Initializer::Constant(v) => Tensor::full(&shape[..], *v, options),
            Initializer::Uniform(scaling) => {
                let lim = self.gain * (3.0 * scaling.variance(fan_in, fan_out)).sqrt();
                Tensor::empty(&shape[..], options).uniform_(-lim, lim)
            }
            Initializer::Normal(scaling) => {
                let stddev = self.gain * scaling.variance(fan_in, fan_out).sqrt();
                Tensor::empty(&shape[..], options).normal_(0.0, stddev)
            }
            Initializer::Orthogonal => init_orthogonal(&shape, self.gain, options),
        };
        tensor.set_requires_grad(self.requires_grad)
    }

    /// Set the gain (scaling factor) on the initialized values.
    #[must_use]
    #[inline]
    pub const fn gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    /// Override the `fan_in` value (number of input features) calculated from `shape`.
    ///
    /// A kernel and its bias act together on `in_dim + 1` features
    /// so both are initialized with that `fan_in`.
    #[must_use]
    #[inline]
    pub const fn fan_in(mut self, fan_in: usize) -> Self {
        self.fan_in = Some(fan_in);
        self
    }

    /// Override the `fan_out` value (number of output features) calculated from `shape`.
    #[must_use]
    #[inline]
    pub const fn fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = Some(fan_out);
        self
    }

    /// Set whether the tensor requires gradient tracking. Defaults to true.
    #[must_use]
    #[inline]
    pub const fn requires_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    /// Set the data type [`Kind`] of the tensor to build. Defaults to 32-bit float.
    ///
    /// Only floating-point kinds are allowed.
    #[inline]
    pub const fn kind(mut self, kind: Kind) -> Result<Self, InitializeTensorError> {
        match kind {
            Kind::Half | Kind::Float | Kind::Double | Kind::BFloat16 => {}
            _ => return Err(InitializeTensorError::InvalidKind(kind)),
        }
        self.kind = kind;
        Ok(self)
    }

    /// Set the [`Device`] on which the tensor will be created. Defaults to CPU.
    #[must_use]
    #[inline]
    pub const fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }
}

/// Error initializing a [`Tensor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum InitializeTensorError {
    #[error("unsupported kind {0:?}; expected a float type")]
    InvalidKind(Kind),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tch::nn::VarStore;

    #[test]
    fn zeros() {
        let a = Initializer::Zeros.tensor(&[5]).build();
        assert_eq!(a, Tensor::zeros(&[5], (Kind::Float, Device::Cpu)));
    }

    #[test]
    fn constant() {
        let a = Initializer::Constant(2.0).tensor(&[5]).build();
        assert_eq!(a, Tensor::full(&[5], 2.0, (Kind::Float, Device::Cpu)));
    }

    #[test]
    fn shape() {
        let a = Initializer::default().tensor(&[2, 3]).build();
        assert_eq!(a.size(), [2, 3]);
    }

    #[rstest]
    #[case(VarianceScale::FanIn)]
    #[case(VarianceScale::FanOut)]
    #[case(VarianceScale::FanAvg)]
    fn uniform_within_limit(#[case] scale: VarianceScale) {
        let a = Initializer::Uniform(scale).tensor(&[20, 10]).build();
        let lim = (3.0 * scale.variance(10, 20)).sqrt();
        assert!(bool::from(a.abs().less_equal(lim).all()));
    }

    #[rstest]
    #[case(5, 5)]
    #[case(3, 7)]
    #[case(7, 3)]
    fn orthogonal_rows_or_cols_orthonormal(#[case] rows: usize, #[case] cols: usize) {
        let q = Initializer::Orthogonal.tensor(&[rows, cols]).build();
        assert_eq!(q.size(), [rows as i64, cols as i64]);
        // Q Q^T = I for wide matrices and Q^T Q = I for tall ones
        let (gram, n) = if rows <= cols {
            (q.matmul(&q.tr()), rows)
        } else {
            (q.tr().matmul(&q), cols)
        };
        assert!(gram.allclose(
            &Tensor::eye(n as i64, (Kind::Float, Device::Cpu)),
            1e-4,
            1e-4,
            false
        ));
    }

    #[test]
    fn orthogonal_conv_kernel_gain() {
        let q = Initializer::Orthogonal
            .tensor(&[4, 2, 3, 3])
            .gain(2.0)
            .build();
        assert_eq!(q.size(), [4, 2, 3, 3]);
        let flat = q.reshape(&[4, 18]);
        assert!(flat.matmul(&flat.tr()).allclose(
            &(Tensor::eye(4, (Kind::Float, Device::Cpu)) * 4.0),
            1e-4,
            1e-4,
            false
        ));
    }

    #[test]
    fn orthogonal_vector_unit_norm() {
        let v = Initializer::Orthogonal.tensor(&[6]).build();
        assert_eq!(v.size(), [6]);
        assert!((f64::from(v.norm()) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn conv_kernel_fan() {
        assert_eq!(fan_in_and_fan_out(&[16, 3, 8, 8]), (3 * 64, 16 * 64));
    }

    #[test]
    fn zero_gain_builds_zeros() {
        let a = Initializer::Uniform(VarianceScale::Constant(1.0))
            .tensor(&[100])
            .gain(0.0)
            .build();
        assert_eq!(a, Tensor::zeros(&[100], (Kind::Float, Device::Cpu)));
    }

    #[test]
    fn requires_grad_default() {
        assert!(Initializer::default().tensor(&[3]).build().requires_grad());
    }

    #[test]
    fn invalid_kind() {
        let init = Initializer::default();
        let result = init.tensor(&[3]).kind(Kind::Int64);
        assert_eq!(
            result.unwrap_err(),
            InitializeTensorError::InvalidKind(Kind::Int64)
        );
    }

    #[test]
    fn add_var_is_trainable() {
        let vs = VarStore::new(Device::Cpu);
        let var = Initializer::Constant(0.5).add_var(&vs.root(), "w", &[2, 3], None);
        assert!(var.requires_grad());
        assert_eq!(vs.trainable_variables().len(), 1);
        assert_eq!(var, Tensor::full(&[2, 3], 0.5, (Kind::Float, Device::Cpu)));
    }
}
