//! REINFORCE with a learned baseline
//!
//! Per position the reward is `log σ(d_t)` at fill positions, the discounted
//! return is `R_t = Σ_{s≥t} γ^(s-t) r_s`, and the advantage `R_t - b_t` is
//! clipped to `[-clip, clip]`. The returned scalar carries gradient only
//! through the generator log-probabilities.

use burn::prelude::*;
use burn::tensor::activation::log_sigmoid;

use crate::isolation::detach;

#[derive(Debug, Clone, PartialEq)]
pub struct Reinforce {
    /// Discount factor
    pub gamma: f32,
    /// Advantage clipping bound
    pub clip_value: f32,
}

impl Reinforce {
    pub fn new(gamma: f32, clip_value: f32) -> Self {
        Self { gamma, clip_value }
    }

    /// - `log_probs`: [batch, seq] log-probability of each sampled token
    /// - `logits`: [batch, seq, 1] discriminator logits on the sample
    /// - `mask`: [batch, seq] fill positions
    /// - `baselines`: [batch, seq, 1] critic estimate
    ///
    /// Returns (expected reward [1], cumulative rewards [batch, seq]).
    pub fn forward<B: Backend>(
        &self,
        log_probs: Tensor<B, 2>,
        logits: Tensor<B, 3>,
        mask: Tensor<B, 2>,
        baselines: Option<Tensor<B, 3>>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let [_, seq_len] = log_probs.dims();
        let device = log_probs.device();

        let rewards = log_sigmoid(detach(logits).squeeze::<2>(2)) * mask.clone();
        let cumulative_rewards = rewards.matmul(self.discount_matrix(seq_len, &device));

        let advantages = match baselines {
            Some(baselines) => cumulative_rewards.clone() - detach(baselines).squeeze::<2>(2),
            None => cumulative_rewards.clone(),
        };
        let advantages = detach(advantages.clamp(-self.clip_value, self.clip_value));

        let reward = (advantages * log_probs * mask).sum_dim(1).mean();
        (reward, cumulative_rewards)
    }

    /// [seq, seq] matrix with `γ^(s-t)` at row `s`, column `t` for `s >= t`.
    pub fn discount_matrix<B: Backend>(&self, seq_len: usize, device: &B::Device) -> Tensor<B, 2> {
        let mut weights = vec![0.0f32; seq_len * seq_len];
        for s in 0..seq_len {
            for t in 0..=s {
                weights[s * seq_len + t] = self.gamma.powi((s - t) as i32);
            }
        }
        Tensor::from_data(TensorData::new(weights, [seq_len, seq_len]), device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_discount_matrix() {
        let device = Default::default();
        let criterion = Reinforce::new(0.5, 5.0);
        let matrix: Vec<f32> = criterion
            .discount_matrix::<NdArray>(3, &device)
            .to_data()
            .iter::<f32>()
            .collect();
        assert_close(&matrix, &[1.0, 0.0, 0.0, 0.5, 1.0, 0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_cumulative_rewards_follow_mask() {
        let device = Default::default();
        let criterion = Reinforce::new(0.5, 5.0);
        let log_probs = Tensor::<NdArray, 2>::zeros([1, 5], &device);
        // σ(0) = 0.5 everywhere
        let logits = Tensor::<NdArray, 3>::zeros([1, 5, 1], &device);
        let mask = Tensor::<NdArray, 2>::from_data(
            TensorData::new(vec![1.0f32, 1.0, 0.0, 0.0, 1.0], [1, 5]),
            &device,
        );

        let (_, cumulative) = criterion.forward(log_probs, logits, mask, None);
        let values: Vec<f32> = cumulative.to_data().iter::<f32>().collect();

        let r = -std::f32::consts::LN_2;
        let r4 = r;
        let r3 = 0.5 * r4;
        let r2 = 0.5 * r3;
        let r1 = r + 0.5 * r2;
        let r0 = r + 0.5 * r1;
        assert_close(&values, &[r0, r1, r2, r3, r4]);
    }

    #[test]
    fn test_advantages_are_clipped() {
        let device = Default::default();
        let criterion = Reinforce::new(0.0, 1.0);
        let log_probs = Tensor::<NdArray, 2>::ones([1, 2], &device);
        let logits = Tensor::<NdArray, 3>::zeros([1, 2, 1], &device);
        let mask = Tensor::<NdArray, 2>::ones([1, 2], &device);
        let baselines = Tensor::<NdArray, 3>::full([1, 2, 1], 10.0, &device);

        let (reward, _) = criterion.forward(log_probs, logits, mask, Some(baselines));
        // Each advantage is clamped to -1 and weighted by log_prob = 1
        assert!((reward.into_scalar().elem::<f32>() + 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_gradient_flows_only_through_log_probs() {
        let device = Default::default();
        let criterion = Reinforce::new(0.0, 5.0);
        let log_probs = Tensor::<TestBackend, 2>::full([2, 2], -1.0, &device).require_grad();
        let logits = Tensor::<TestBackend, 3>::zeros([2, 2, 1], &device).require_grad();
        let baselines = Tensor::<TestBackend, 3>::zeros([2, 2, 1], &device).require_grad();
        let mask = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 0.0, 1.0, 1.0], [2, 2]),
            &device,
        );

        let (reward, _) = criterion.forward(
            log_probs.clone(),
            logits.clone(),
            mask,
            Some(baselines.clone()),
        );
        let grads = reward.backward();

        let r = -std::f32::consts::LN_2;
        let grad: Vec<f32> = log_probs
            .grad(&grads)
            .unwrap()
            .to_data()
            .iter::<f32>()
            .collect();
        // d reward / d log_prob = mask * advantage / batch
        assert_close(&grad, &[r / 2.0, 0.0, r / 2.0, r / 2.0]);
        assert!(logits.grad(&grads).is_none());
        assert!(baselines.grad(&grads).is_none());
    }
}
