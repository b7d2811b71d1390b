//! Fill-in generator
//!
//! Each position sees the masked context up to itself and the ground-truth
//! token before it (`<s>` at the start). The same network serves teacher
//! forcing (full logits) and the adversarial policy (one sampled token per
//! fill position).

use burn::module::{AutodiffModule, Module};
use burn::nn::attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig};
use burn::nn::{Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::AutodiffBackend;

use super::encoder::{causal_mask, padding_mask, positions};
use crate::config::ModelConfig;
use crate::isolation::{lift, lift_int};

#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    /// Masked context tokens
    context_embed: Embedding<B>,
    /// Previous ground-truth token
    target_embed: Embedding<B>,
    pos_embed: Embedding<B>,
    attention: MultiHeadAttention<B>,
    norm: LayerNorm<B>,
    /// Projection to vocabulary logits
    output: Linear<B>,
    bos_index: usize,
}

impl<B: Backend> Generator<B> {
    pub fn new(
        device: &B::Device,
        vocab_size: usize,
        bos_index: usize,
        config: &ModelConfig,
    ) -> Self {
        Self {
            context_embed: EmbeddingConfig::new(vocab_size, config.d_model).init(device),
            target_embed: EmbeddingConfig::new(vocab_size, config.d_model).init(device),
            pos_embed: EmbeddingConfig::new(config.max_seq_len, config.d_model).init(device),
            attention: MultiHeadAttentionConfig::new(config.d_model, config.n_heads)
                .with_dropout(config.dropout)
                .init(device),
            norm: LayerNormConfig::new(config.d_model).init(device),
            output: LinearConfig::new(config.d_model, vocab_size).init(device),
            bos_index,
        }
    }

    /// Teacher-forced pass.
    ///
    /// Returns logits [batch, seq, vocab] and attention [batch, heads, seq, seq].
    pub fn forward_teacher_forced(
        &self,
        masked: Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
        unmasked: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let [batch_size, seq_len] = masked.dims();
        let device = masked.device();

        let x = self.context_embed.forward(masked)
            + self.target_embed.forward(self.shift_right(unmasked))
            + self
                .pos_embed
                .forward(positions(batch_size, seq_len, &device));

        let input = MhaInput::self_attn(x.clone())
            .mask_pad(padding_mask(lengths, seq_len))
            .mask_attn(causal_mask(batch_size, seq_len, &device));
        let attn = self.attention.forward(input);

        let hidden = self.norm.forward(x + attn.context);
        (self.output.forward(hidden), attn.weights)
    }

    /// Raw distribution over the vocabulary, aligned with `unmasked`.
    pub fn logits(
        &self,
        masked: Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
        unmasked: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        self.forward_teacher_forced(masked, lengths, unmasked).0
    }

    /// Policy pass.
    ///
    /// Draws a token at every fill position (Gumbel-max over the log-softmax),
    /// keeps the ground truth elsewhere, and returns
    /// (sample [batch, seq], log-prob of each chosen token [batch, seq], attention).
    pub fn forward(
        &self,
        masked: Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
        unmasked: Tensor<B, 2, Int>,
        mask: Tensor<B, 2>,
    ) -> (Tensor<B, 2, Int>, Tensor<B, 2>, Tensor<B, 4>) {
        let (logits, attn) = self.forward_teacher_forced(masked, lengths, unmasked.clone());
        let log_probs = log_softmax(logits, 2);

        let uniform = Tensor::<B, 3>::random(
            log_probs.shape(),
            burn::tensor::Distribution::Uniform(1e-6, 1.0 - 1e-6),
            &log_probs.device(),
        );
        let gumbel = -(-uniform.log()).log();
        let drawn: Tensor<B, 2, Int> = (log_probs.clone().detach() + gumbel)
            .argmax(2)
            .squeeze::<2>(2);

        let sample = unmasked.mask_where(mask.greater_elem(0.5), drawn);
        let chosen = log_probs
            .gather(2, sample.clone().unsqueeze_dim::<3>(2))
            .squeeze::<2>(2);

        (sample, chosen, attn)
    }

    /// `<s>` followed by all but the last token
    fn shift_right(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2, Int> {
        let [batch_size, seq_len] = tokens.dims();
        let bos = Tensor::<B, 2, Int>::full(
            [batch_size, 1],
            self.bos_index as i64,
            &tokens.device(),
        );
        if seq_len == 1 {
            return bos;
        }
        Tensor::cat(vec![bos, tokens.slice([0..batch_size, 0..seq_len - 1])], 1)
    }
}

impl<B: AutodiffBackend> Generator<B> {
    /// [`Generator::forward`] without recording anything for backpropagation.
    pub fn forward_frozen(
        &self,
        masked: Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
        unmasked: Tensor<B, 2, Int>,
        mask: Tensor<B, 2>,
    ) -> (Tensor<B, 2, Int>, Tensor<B, 2>, Tensor<B, 4>) {
        let (sample, log_probs, attn) = self.valid().forward(
            masked.inner(),
            lengths.inner(),
            unmasked.inner(),
            mask.inner(),
        );
        (lift_int(sample), lift(log_probs), lift(attn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    const VOCAB: usize = 12;

    fn generator(device: &<B as Backend>::Device) -> Generator<B> {
        let config = ModelConfig::new()
            .with_d_model(16)
            .with_n_heads(2)
            .with_dropout(0.0);
        Generator::new(device, VOCAB, 1, &config)
    }

    fn tokens(values: Vec<i64>, device: &<B as Backend>::Device) -> Tensor<B, 2, Int> {
        let len = values.len();
        Tensor::from_data(TensorData::new(values, [1, len]), device)
    }

    #[test]
    fn test_teacher_forced_shapes() {
        let device = Default::default();
        let model = generator(&device);
        let masked = Tensor::<B, 2, Int>::full([2, 5], 4, &device);
        let unmasked = Tensor::<B, 2, Int>::full([2, 5], 7, &device);
        let lengths = Tensor::<B, 1, Int>::full([2], 5, &device);

        let (logits, attn) = model.forward_teacher_forced(masked, lengths, unmasked);
        assert_eq!(logits.dims(), [2, 5, VOCAB]);
        assert_eq!(attn.dims(), [2, 2, 5, 5]);
    }

    #[test]
    fn test_shift_right_prepends_bos() {
        let device = Default::default();
        let model = generator(&device);
        let shifted = model.shift_right(tokens(vec![5, 6, 7], &device));
        let values: Vec<i64> = shifted.to_data().iter::<i64>().collect();
        assert_eq!(values, vec![1, 5, 6]);

        let single = model.shift_right(tokens(vec![5], &device));
        assert_eq!(single.to_data().iter::<i64>().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_sample_keeps_context_positions() {
        let device = Default::default();
        let model = generator(&device);
        let unmasked = tokens(vec![5, 6, 7, 8, 9], &device);
        let masked = tokens(vec![5, 6, 4, 4, 9], &device);
        let mask = Tensor::<B, 2>::from_data(
            TensorData::new(vec![0.0f32, 0.0, 1.0, 1.0, 0.0], [1, 5]),
            &device,
        );
        let lengths = Tensor::<B, 1, Int>::full([1], 5, &device);

        let (sample, log_probs, _) = model.forward(masked, lengths, unmasked, mask);
        let values: Vec<i64> = sample.to_data().iter::<i64>().collect();
        assert_eq!(values[0], 5);
        assert_eq!(values[1], 6);
        assert_eq!(values[4], 9);
        assert!(values.iter().all(|&v| (0..VOCAB as i64).contains(&v)));

        let log_probs: Vec<f32> = log_probs.to_data().iter::<f32>().collect();
        assert!(log_probs.iter().all(|&p| p.is_finite() && p <= 0.0));
    }
}
