use burn::prelude::*;

/// Squared error averaged over the weighted positions.
#[derive(Debug, Clone, Default)]
pub struct WeightedMse;

impl WeightedMse {
    pub fn new() -> Self {
        Self
    }

    /// `Σ w·(p - t)² / Σ w`, zero when every weight is zero.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        prediction: Tensor<B, D>,
        target: Tensor<B, D>,
        weight: Tensor<B, D>,
    ) -> Tensor<B, 1> {
        let squared = (prediction - target).powf_scalar(2.0);
        (squared * weight.clone()).sum() / weight.sum().clamp_min(1e-8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn test_weighted_mean() {
        let device = Default::default();
        let prediction =
            Tensor::<B, 2>::from_data(TensorData::new(vec![1.0f32, 2.0, 3.0], [1, 3]), &device);
        let target = Tensor::<B, 2>::zeros([1, 3], &device);
        let weight =
            Tensor::<B, 2>::from_data(TensorData::new(vec![1.0f32, 0.0, 1.0], [1, 3]), &device);
        let loss = WeightedMse::new().forward(prediction, target, weight);
        // (1 + 9) / 2
        assert!((loss.into_scalar().elem::<f32>() - 5.0).abs() < 1e-5);
    }
}
