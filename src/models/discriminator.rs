//! Per-position real/fake classifier

use burn::module::{AutodiffModule, Module};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use super::encoder::SequenceEncoder;
use crate::config::ModelConfig;
use crate::isolation::lift;

#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    encoder: SequenceEncoder<B>,
    /// One logit per position
    head: Linear<B>,
}

impl<B: Backend> Discriminator<B> {
    pub fn new(device: &B::Device, vocab_size: usize, config: &ModelConfig) -> Self {
        Self {
            encoder: SequenceEncoder::new(device, vocab_size, config),
            head: LinearConfig::new(config.d_model, 1).init(device),
        }
    }

    /// Returns logits [batch, seq, 1] (positive = real) and attention scores.
    pub fn forward(
        &self,
        masked: Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
        sequence: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let (hidden, attn) = self.encoder.forward(masked, lengths, sequence);
        (self.head.forward(hidden), attn)
    }
}

impl<B: AutodiffBackend> Discriminator<B> {
    pub fn forward_frozen(
        &self,
        masked: Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
        sequence: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let (logits, attn) =
            self.valid()
                .forward(masked.inner(), lengths.inner(), sequence.inner());
        (lift(logits), lift(attn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn test_discriminator_forward_shape() {
        let device = Default::default();
        let config = ModelConfig::new().with_d_model(16).with_n_heads(4);
        let model = Discriminator::<B>::new(&device, 9, &config);

        let tokens = Tensor::<B, 2, Int>::full([3, 6], 5, &device);
        let lengths = Tensor::<B, 1, Int>::full([3], 6, &device);
        let (logits, attn) = model.forward(tokens.clone(), lengths, tokens);

        assert_eq!(logits.dims(), [3, 6, 1]);
        assert_eq!(attn.dims(), [3, 4, 6, 6]);
    }
}
