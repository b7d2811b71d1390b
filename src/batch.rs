//! Mini-batch of masked / ground-truth sequences

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::error::{MganError, Result};
use crate::vocab::Vocab;

/// One mini-batch. `mask` is 1.0 at fill positions and 0.0 on context and padding.
#[derive(Debug, Clone)]
pub struct Batch<B: Backend> {
    /// Context with fill positions replaced by `<mask>` [batch, seq]
    pub masked: Tensor<B, 2, Int>,
    /// Ground truth [batch, seq]
    pub unmasked: Tensor<B, 2, Int>,
    /// Valid length per example [batch]
    pub lengths: Tensor<B, 1, Int>,
    /// Fill indicator [batch, seq]
    pub mask: Tensor<B, 2>,
}

impl<B: Backend> Batch<B> {
    pub fn new(
        masked: Tensor<B, 2, Int>,
        unmasked: Tensor<B, 2, Int>,
        lengths: Tensor<B, 1, Int>,
        mask: Tensor<B, 2>,
    ) -> Result<Self> {
        let expected = masked.dims();
        if unmasked.dims() != expected {
            return Err(MganError::ShapeMismatch {
                what: "unmasked",
                expected: expected.to_vec(),
                actual: unmasked.dims().to_vec(),
            });
        }
        if mask.dims() != expected {
            return Err(MganError::ShapeMismatch {
                what: "mask",
                expected: expected.to_vec(),
                actual: mask.dims().to_vec(),
            });
        }
        let [batch_size, seq_len] = expected;
        if lengths.dims() != [batch_size] {
            return Err(MganError::ShapeMismatch {
                what: "lengths",
                expected: vec![batch_size],
                actual: lengths.dims().to_vec(),
            });
        }

        let data = lengths.to_data();
        for (index, length) in data.iter::<i64>().enumerate() {
            if length < 0 || length as usize > seq_len {
                return Err(MganError::InvalidLength {
                    index,
                    length,
                    seq_len,
                });
            }
        }

        Ok(Self {
            masked,
            unmasked,
            lengths,
            mask,
        })
    }

    /// Pad `sequences` to a common length and hide the positions flagged in `fill`.
    pub fn from_sequences(
        vocab: &Vocab,
        sequences: &[Vec<usize>],
        fill: &[Vec<bool>],
        device: &B::Device,
    ) -> Result<Self> {
        if sequences.len() != fill.len() {
            return Err(MganError::ShapeMismatch {
                what: "fill",
                expected: vec![sequences.len()],
                actual: vec![fill.len()],
            });
        }
        let batch_size = sequences.len();
        let seq_len = sequences.iter().map(Vec::len).max().unwrap_or(0);
        if batch_size == 0 || seq_len == 0 {
            return Err(MganError::ShapeMismatch {
                what: "sequences",
                expected: vec![1, 1],
                actual: vec![batch_size, seq_len],
            });
        }

        let pad = vocab.pad() as i64;
        let mask_token = vocab.mask() as i64;
        let mut masked = Vec::with_capacity(batch_size * seq_len);
        let mut unmasked = Vec::with_capacity(batch_size * seq_len);
        let mut mask = Vec::with_capacity(batch_size * seq_len);
        let mut lengths = Vec::with_capacity(batch_size);

        for (index, (sequence, flags)) in sequences.iter().zip(fill).enumerate() {
            if flags.len() != sequence.len() {
                return Err(MganError::ShapeMismatch {
                    what: "fill",
                    expected: vec![index, sequence.len()],
                    actual: vec![index, flags.len()],
                });
            }
            for t in 0..seq_len {
                match sequence.get(t) {
                    Some(&token) => {
                        let hidden = flags[t];
                        unmasked.push(token as i64);
                        masked.push(if hidden { mask_token } else { token as i64 });
                        mask.push(if hidden { 1.0f32 } else { 0.0 });
                    }
                    None => {
                        unmasked.push(pad);
                        masked.push(pad);
                        mask.push(0.0);
                    }
                }
            }
            lengths.push(sequence.len() as i64);
        }

        Self::new(
            Tensor::from_data(TensorData::new(masked, [batch_size, seq_len]), device),
            Tensor::from_data(TensorData::new(unmasked, [batch_size, seq_len]), device),
            Tensor::from_data(TensorData::new(lengths, [batch_size]), device),
            Tensor::from_data(TensorData::new(mask, [batch_size, seq_len]), device),
        )
    }

    /// Same context and mask, with `sequence` standing in for the ground truth.
    pub fn with_sequence(&self, sequence: Tensor<B, 2, Int>) -> Self {
        Self {
            masked: self.masked.clone(),
            unmasked: sequence,
            lengths: self.lengths.clone(),
            mask: self.mask.clone(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.masked.dims()[0]
    }

    pub fn seq_len(&self) -> usize {
        self.masked.dims()[1]
    }

    pub fn device(&self) -> B::Device {
        self.masked.device()
    }
}

impl<B: AutodiffBackend> Batch<B> {
    /// Lower every tensor to the inner backend for frozen forwards.
    pub fn inner(&self) -> Batch<B::InnerBackend> {
        Batch {
            masked: self.masked.clone().inner(),
            unmasked: self.unmasked.clone().inner(),
            lengths: self.lengths.clone().inner(),
            mask: self.mask.clone().inner(),
        }
    }
}
