//! Decoding helpers, perplexity and running training statistics

use std::collections::VecDeque;
use std::time::Instant;

use burn::prelude::*;

use crate::models::encoder::padding_mask;

/// Highest-scoring token at every position: [batch, seq, vocab] -> [batch, seq]
pub fn greedy_sample<B: Backend>(logits: Tensor<B, 3>) -> Tensor<B, 2, Int> {
    logits.argmax(2).squeeze::<2>(2)
}

/// `exp(-mean log p(target))` under `log_probs` [batch, seq, vocab], averaged
/// over the positions inside each example's length.
pub fn perplexity<B: Backend>(
    target: Tensor<B, 2, Int>,
    log_probs: Tensor<B, 3>,
    lengths: Tensor<B, 1, Int>,
) -> f32 {
    let [_, seq_len] = target.dims();
    let valid = padding_mask(lengths, seq_len).bool_not().float();
    let nll = -log_probs
        .gather(2, target.unsqueeze_dim::<3>(2))
        .squeeze::<2>(2);
    let mean_nll = (nll * valid.clone()).sum() / valid.sum().clamp_min(1.0);
    mean_nll.exp().into_scalar().elem::<f32>()
}

/// Mean of the last `window` values pushed.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: VecDeque<f32>,
    capacity: usize,
}

impl MovingAverage {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    /// 0.0 until something has been pushed
    pub fn average(&self) -> f32 {
        match self.window.len() {
            0 => 0.0,
            n => self.window.iter().sum::<f32>() / n as f32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

/// Training metrics tracker
#[derive(Debug)]
pub struct TrainingMetrics {
    pub generator_loss: MovingAverage,
    pub critic_loss: MovingAverage,
    /// Discriminator loss on ground truth
    pub real_loss: MovingAverage,
    /// Discriminator loss on generated samples
    pub fake_loss: MovingAverage,
    pub perplexity: MovingAverage,
    /// Current iteration
    pub iteration: usize,
    /// Examples seen so far
    pub total_examples: usize,
    start_time: Instant,
}

impl TrainingMetrics {
    pub fn new(window_size: usize) -> Self {
        Self {
            generator_loss: MovingAverage::new(window_size),
            critic_loss: MovingAverage::new(window_size),
            real_loss: MovingAverage::new(window_size),
            fake_loss: MovingAverage::new(window_size),
            perplexity: MovingAverage::new(window_size),
            iteration: 0,
            total_examples: 0,
            start_time: Instant::now(),
        }
    }

    pub fn update_iteration(&mut self, iteration: usize, examples: usize) {
        self.iteration = iteration;
        self.total_examples += examples;
    }

    pub fn examples_per_second(&self) -> f64 {
        let duration = self.start_time.elapsed().as_secs_f64();
        if duration > 0.0 {
            self.total_examples as f64 / duration
        } else {
            0.0
        }
    }

    pub fn log_to_console(&self) {
        tracing::info!(
            "Iteration {} | Examples {} | {:.1} ex/s",
            self.iteration,
            self.total_examples,
            self.examples_per_second()
        );
        tracing::info!(
            "  Losses: generator={:.4}, critic={:.4}, real={:.4}, fake={:.4}",
            self.generator_loss.average(),
            self.critic_loss.average(),
            self.real_loss.average(),
            self.fake_loss.average()
        );
        if !self.perplexity.is_empty() {
            tracing::info!("  Perplexity: {:.2}", self.perplexity.average());
        }
    }
}

impl Default for TrainingMetrics {
    fn default() -> Self {
        Self::new(100)
    }
}
