//! Self-attention encoder shared by the discriminator and the critic

use burn::module::Module;
use burn::nn::attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig};
use burn::nn::{Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig};
use burn::prelude::*;

use crate::config::ModelConfig;

/// Key-padding mask [batch, seq]: true at positions past each example's length.
pub fn padding_mask<B: Backend>(lengths: Tensor<B, 1, Int>, seq_len: usize) -> Tensor<B, 2, Bool> {
    let batch_size = lengths.dims()[0];
    let device = lengths.device();
    let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
        .unsqueeze::<2>()
        .repeat_dim(0, batch_size);
    let lengths = lengths.unsqueeze_dim::<2>(1).repeat_dim(1, seq_len);
    positions.greater_equal(lengths)
}

/// Causal mask [batch, seq, seq]: true above the diagonal (may not attend).
pub fn causal_mask<B: Backend>(
    batch_size: usize,
    seq_len: usize,
    device: &B::Device,
) -> Tensor<B, 3, Bool> {
    Tensor::<B, 2>::ones([seq_len, seq_len], device)
        .triu(1)
        .greater_elem(0.5)
        .unsqueeze::<3>()
        .repeat_dim(0, batch_size)
}

/// Position indices [batch, seq]
pub fn positions<B: Backend>(
    batch_size: usize,
    seq_len: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    Tensor::<B, 1, Int>::arange(0..seq_len as i64, device)
        .unsqueeze::<2>()
        .repeat_dim(0, batch_size)
}

/// Embeds the masked context alongside a candidate sequence and mixes them
/// with one self-attention block.
#[derive(Module, Debug)]
pub struct SequenceEncoder<B: Backend> {
    context_embed: Embedding<B>,
    sequence_embed: Embedding<B>,
    pos_embed: Embedding<B>,
    attention: MultiHeadAttention<B>,
    norm: LayerNorm<B>,
}

impl<B: Backend> SequenceEncoder<B> {
    pub fn new(device: &B::Device, vocab_size: usize, config: &ModelConfig) -> Self {
        Self {
            context_embed: EmbeddingConfig::new(vocab_size, config.d_model).init(device),
            sequence_embed: EmbeddingConfig::new(vocab_size, config.d_model).init(device),
            pos_embed: EmbeddingConfig::new(config.max_seq_len, config.d_model).init(device),
            attention: MultiHeadAttentionConfig::new(config.d_model, config.n_heads)
                .with_dropout(config.dropout)
                .init(device),
            norm: LayerNormConfig::new(config.d_model).init(device),
        }
    }

    /// Returns hidden states [batch, seq, d_model] and attention weights
    /// [batch, heads, seq, seq].
    pub fn forward(
        &self,
        masked: Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
        sequence: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let [batch_size, seq_len] = masked.dims();
        let device = masked.device();

        let x = self.context_embed.forward(masked)
            + self.sequence_embed.forward(sequence)
            + self
                .pos_embed
                .forward(positions(batch_size, seq_len, &device));

        let input = MhaInput::self_attn(x.clone()).mask_pad(padding_mask(lengths, seq_len));
        let attn = self.attention.forward(input);

        (self.norm.forward(x + attn.context), attn.weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn test_padding_mask() {
        let device = Default::default();
        let lengths = Tensor::<B, 1, Int>::from_data(TensorData::new(vec![2i64, 4], [2]), &device);
        let mask: Vec<bool> = padding_mask(lengths, 4).to_data().iter::<bool>().collect();
        assert_eq!(
            mask,
            vec![false, false, true, true, false, false, false, false]
        );
    }

    #[test]
    fn test_causal_mask() {
        let device = Default::default();
        let mask = causal_mask::<B>(1, 3, &device);
        assert_eq!(mask.dims(), [1, 3, 3]);
        let values: Vec<bool> = mask.to_data().iter::<bool>().collect();
        assert_eq!(
            values,
            vec![false, true, true, false, false, true, false, false, false]
        );
    }

    #[test]
    fn test_encoder_forward_shape() {
        let device = Default::default();
        let config = ModelConfig::new().with_d_model(16).with_n_heads(2).with_dropout(0.0);
        let encoder = SequenceEncoder::<B>::new(&device, 10, &config);

        let tokens = Tensor::<B, 2, Int>::ones([2, 5], &device);
        let lengths = Tensor::<B, 1, Int>::from_data(TensorData::new(vec![5i64, 3], [2]), &device);
        let (hidden, weights) = encoder.forward(tokens.clone(), lengths, tokens);

        assert_eq!(hidden.dims(), [2, 5, 16]);
        assert_eq!(weights.dims(), [2, 2, 5, 5]);
    }
}
