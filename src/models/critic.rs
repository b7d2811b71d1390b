//! Baseline network: estimates the cumulative reward at every position

use burn::module::{AutodiffModule, Module};
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use super::encoder::SequenceEncoder;
use crate::config::ModelConfig;
use crate::isolation::lift;

#[derive(Module, Debug)]
pub struct Critic<B: Backend> {
    encoder: SequenceEncoder<B>,
    hidden: Linear<B>,
    /// Output layer (single value)
    output: Linear<B>,
    activation: Relu,
}

impl<B: Backend> Critic<B> {
    pub fn new(device: &B::Device, vocab_size: usize, config: &ModelConfig) -> Self {
        Self {
            encoder: SequenceEncoder::new(device, vocab_size, config),
            hidden: LinearConfig::new(config.d_model, config.d_model).init(device),
            output: LinearConfig::new(config.d_model, 1).init(device),
            activation: Relu::new(),
        }
    }

    /// Returns the baseline [batch, seq, 1] and, as auxiliary output, the
    /// encoder attention.
    pub fn forward(
        &self,
        masked: Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
        sequence: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let (x, attn) = self.encoder.forward(masked, lengths, sequence);
        let x = self.activation.forward(self.hidden.forward(x));
        (self.output.forward(x), attn)
    }
}

impl<B: AutodiffBackend> Critic<B> {
    pub fn forward_frozen(
        &self,
        masked: Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
        sequence: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let (baseline, attn) =
            self.valid()
                .forward(masked.inner(), lengths.inner(), sequence.inner());
        (lift(baseline), lift(attn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_frozen_baseline_matches_tracked() {
        let device = Default::default();
        let config = ModelConfig::new()
            .with_d_model(8)
            .with_n_heads(2)
            .with_dropout(0.0);
        let model = Critic::<TestBackend>::new(&device, 7, &config);

        let tokens = Tensor::<TestBackend, 2, Int>::full([2, 4], 5, &device);
        let lengths = Tensor::<TestBackend, 1, Int>::full([2], 4, &device);
        let (tracked, _) = model.forward(tokens.clone(), lengths.clone(), tokens.clone());
        let (frozen, _) = model.forward_frozen(tokens.clone(), lengths, tokens);

        assert_eq!(frozen.dims(), [2, 4, 1]);
        let diff: f32 = (tracked - frozen)
            .abs()
            .sum()
            .into_scalar()
            .elem::<f32>();
        assert!(diff < 1e-5);
    }
}
