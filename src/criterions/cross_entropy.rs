use burn::prelude::*;
use burn::tensor::activation::log_softmax;

/// Token-level cross-entropy for teacher-forced training, averaged over the
/// non-pad targets.
#[derive(Debug, Clone, Default)]
pub struct TokenCrossEntropy {
    /// Target id excluded from the loss
    pub pad_index: Option<usize>,
}

impl TokenCrossEntropy {
    pub fn new(pad_index: Option<usize>) -> Self {
        Self { pad_index }
    }

    /// - `logits`: [batch, seq, vocab]
    /// - `target`: [batch, seq]
    ///
    /// Zero when every target is padding.
    pub fn forward<B: Backend>(&self, logits: Tensor<B, 3>, target: Tensor<B, 2, Int>) -> Tensor<B, 1> {
        let nll = -log_softmax(logits, 2)
            .gather(2, target.clone().unsqueeze_dim::<3>(2))
            .squeeze::<2>(2);

        let weight = match self.pad_index {
            Some(pad) => target.not_equal_elem(pad as i64).float(),
            None => nll.ones_like(),
        };
        (nll * weight.clone()).sum() / weight.sum().clamp_min(1e-8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn test_uniform_logits_cost_ln_vocab() {
        let device = Default::default();
        let logits = Tensor::<B, 3>::zeros([2, 3, 8], &device);
        let target = Tensor::<B, 2, Int>::full([2, 3], 5, &device);
        let loss = TokenCrossEntropy::new(None).forward(logits, target);
        assert!((loss.into_scalar().elem::<f32>() - 8.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_confident_prediction_is_cheap() {
        let device = Default::default();
        let mut values = vec![0.0f32; 4];
        values[2] = 30.0;
        let logits = Tensor::<B, 3>::from_data(TensorData::new(values, [1, 1, 4]), &device);
        let target = Tensor::<B, 2, Int>::full([1, 1], 2, &device);
        let loss = TokenCrossEntropy::new(Some(0)).forward(logits, target);
        assert!(loss.into_scalar().elem::<f32>() < 1e-4);
    }

    #[test]
    fn test_pad_targets_do_not_dilute_the_mean() {
        let device = Default::default();
        let logits = Tensor::<B, 3>::zeros([1, 4, 8], &device);
        let target =
            Tensor::<B, 2, Int>::from_data(TensorData::new(vec![5i64, 5, 0, 0], [1, 4]), &device);
        let loss = TokenCrossEntropy::new(Some(0)).forward(logits, target);
        assert!((loss.into_scalar().elem::<f32>() - 8.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_all_pad_targets_give_zero() {
        let device = Default::default();
        let logits = Tensor::<B, 3>::zeros([2, 2, 8], &device);
        let target = Tensor::<B, 2, Int>::zeros([2, 2], &device);
        let loss = TokenCrossEntropy::new(Some(0)).forward(logits, target);
        assert_eq!(loss.into_scalar().elem::<f32>(), 0.0);
    }
}
