use burn::prelude::*;

use crate::criterions::{Reinforce, TokenCrossEntropy};
use crate::models::Generator;

/// A trainable component bound to the objective it is optimised against.
#[derive(Debug, Clone)]
pub struct ComponentPair<M, C> {
    pub model: M,
    pub criterion: C,
}

impl<M, C> ComponentPair<M, C> {
    pub fn new(model: M, criterion: C) -> Self {
        Self { model, criterion }
    }
}

/// The generator in the regime it was built for.
#[derive(Debug, Clone)]
pub enum GeneratorPair<B: Backend> {
    /// Teacher-forced, trained with token cross-entropy
    Pretrain(ComponentPair<Generator<B>, TokenCrossEntropy>),
    /// Sampling policy, trained with REINFORCE against the discriminator
    Adversarial(ComponentPair<Generator<B>, Reinforce>),
}

impl<B: Backend> GeneratorPair<B> {
    pub fn model(&self) -> &Generator<B> {
        match self {
            GeneratorPair::Pretrain(pair) => &pair.model,
            GeneratorPair::Adversarial(pair) => &pair.model,
        }
    }

    pub(crate) fn model_mut(&mut self) -> &mut Generator<B> {
        match self {
            GeneratorPair::Pretrain(pair) => &mut pair.model,
            GeneratorPair::Adversarial(pair) => &mut pair.model,
        }
    }

    pub fn is_pretrain(&self) -> bool {
        matches!(self, GeneratorPair::Pretrain(_))
    }
}
