//! Module test utilities.
use super::{BuildModule, FeedForwardModule};
use std::iter;
use tch::{
    self,
    kind::Kind,
    nn::{OptimizerConfig, Sgd, VarStore},
    Device, Reduction, Tensor,
};

/// Basic structural check of [`FeedForwardModule::forward`].
pub fn check_forward<M: FeedForwardModule>(
    module: &M,
    in_dim: usize,
    out_dim: usize,
    batch_shape: &[usize],
    kind: Kind,
) {
    let _no_grad_guard = tch::no_grad_guard();
    let input_shape: Vec<_> = batch_shape
        .iter()
        .chain(iter::once(&in_dim))
        .map(|&d| d as i64)
        .collect();
    let input = Tensor::ones(&input_shape, (kind, Device::Cpu));
    let output = module.forward(&input);
    let mut output_shape = input_shape;
    *output_shape.last_mut().unwrap() = out_dim as i64;
    assert_eq!(output.size(), output_shape);
}

/// Check that a few steps of gradient descent reduce the loss of a squared-error regression.
///
/// `loss_fn` maps the variable store to a scalar loss; it is evaluated once before and once
/// after the updates.
pub fn check_gradient_descent<F>(vs: &VarStore, loss_fn: F)
where
    F: Fn() -> Tensor,
{
    let mut optimizer = Sgd::default().build(vs, 1e-1).unwrap();

    let initial_loss = f64::from(loss_fn());
    for _ in 0..10 {
        optimizer.backward_step(&loss_fn());
    }
    let final_loss = f64::from(loss_fn());
    assert!(
        final_loss < initial_loss,
        "loss did not decrease: {} >= {}",
        final_loss,
        initial_loss
    );
}

/// Check that gradient descent improves the output of a forward model.
pub fn check_config_forward_gradient_descent<MC>(config: &MC)
where
    MC: BuildModule,
{
    let in_dim: usize = 3;
    let out_dim: usize = 2;
    let batch_size: i64 = 8;

    let vs = VarStore::new(Device::Cpu);
    let module = config.build_module(&vs.root(), in_dim, out_dim);

    let input = Tensor::rand(&[batch_size, in_dim as i64], (Kind::Float, Device::Cpu));
    let target = Tensor::rand(&[batch_size, out_dim as i64], (Kind::Float, Device::Cpu)) * 0.5;

    check_gradient_descent(&vs, || {
        module
            .forward(&input)
            .mse_loss(&target, Reduction::Mean)
    });
}
