//! Gradient isolation between components
//!
//! burn tracks gradients per tensor rather than through a global switch, so a
//! "no-grad scope" is a frozen forward: the module is lowered with
//! `AutodiffModule::valid`, its inputs with `Tensor::inner`, and the outputs
//! are lifted back as constants. Nothing computed on the frozen path can ever
//! reach the gradients of the autodiff graph.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// Cut `tensor` out of the autodiff graph where it crosses from one component
/// into another.
pub fn detach<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Tensor<B, D> {
    tensor.detach()
}

/// Re-enter the autodiff backend with a tensor that carries no history.
pub fn lift<B: AutodiffBackend, const D: usize>(
    tensor: Tensor<B::InnerBackend, D>,
) -> Tensor<B, D> {
    Tensor::from_inner(tensor)
}

pub fn lift_int<B: AutodiffBackend, const D: usize>(
    tensor: Tensor<B::InnerBackend, D, Int>,
) -> Tensor<B, D, Int> {
    Tensor::from_inner(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::AutodiffModule;
    use burn::nn::{Linear, LinearConfig};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_detach_blocks_gradient() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0], &device).require_grad();
        let y = x.clone() * 2.0;
        let loss = (detach(y) * x.clone()).sum();
        let grads = loss.backward();
        // Only the direct path contributes: d/dx (c * x) = c = 2x
        let grad: Vec<f32> = x.grad(&grads).unwrap().to_data().iter::<f32>().collect();
        assert_eq!(grad, vec![2.0, 4.0]);
    }

    #[test]
    fn test_frozen_forward_leaves_no_gradient() {
        let device = Default::default();
        let layer: Linear<TestBackend> = LinearConfig::new(2, 1).init(&device);
        let input = Tensor::<TestBackend, 2>::ones([3, 2], &device);

        let out: Tensor<TestBackend, 2> = lift(layer.valid().forward(input.clone().inner()));
        let tracked = layer.forward(input);
        let loss = (out + tracked).sum();
        let grads = loss.backward();

        // The frozen output contributes nothing; gradients come only from `tracked`.
        let weight_grad = layer.weight.val().grad(&grads).unwrap();
        let values: Vec<f32> = weight_grad.to_data().iter::<f32>().collect();
        assert_eq!(values, vec![3.0, 3.0]);
    }
}
