use burn::prelude::*;
use burn::tensor::activation::log_sigmoid;

/// Binary cross-entropy on logits, averaged over the weighted positions.
#[derive(Debug, Clone, Default)]
pub struct WeightedBce;

impl WeightedBce {
    pub fn new() -> Self {
        Self
    }

    /// `Σ w·ℓ(x, y) / Σ w`, zero when every weight is zero.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        logits: Tensor<B, D>,
        target: Tensor<B, D>,
        weight: Tensor<B, D>,
    ) -> Tensor<B, 1> {
        let positive = log_sigmoid(logits.clone());
        let negative = log_sigmoid(-logits);
        let losses = -(target.clone() * positive + (target.ones_like() - target) * negative);

        (losses * weight.clone()).sum() / weight.sum().clamp_min(1e-8)
    }
}
