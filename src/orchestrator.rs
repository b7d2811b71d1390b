//! Step orchestration for adversarial fill-in training
//!
//! [`MganModel`] owns the generator, discriminator and critic together with
//! their objectives and runs one of four step computations per mini-batch.
//! Every step returns a loss whose autodiff graph reaches exactly one
//! component: the others only ever run through their `forward_frozen`, and
//! every tensor handed from one component to another passes through
//! [`detach`]. The caller backpropagates the loss and applies its optimizer.

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::AutodiffBackend;

use crate::batch::Batch;
use crate::config::ModelConfig;
use crate::criterions::{Reinforce, TokenCrossEntropy, WeightedBce, WeightedMse};
use crate::error::{MganError, Result};
use crate::isolation::detach;
use crate::metrics::{greedy_sample, perplexity};
use crate::models::{Critic, Discriminator, Generator};
use crate::pair::{ComponentPair, GeneratorPair};
use crate::step::{CRITIC_TAG, Step, StepOutput};
use crate::vocab::Task;

pub type DiscriminatorPair<B> = ComponentPair<Discriminator<B>, WeightedBce>;
pub type CriticPair<B> = ComponentPair<Critic<B>, WeightedMse>;

pub struct MganModel<B: AutodiffBackend> {
    generator: GeneratorPair<B>,
    discriminator: DiscriminatorPair<B>,
    critic: CriticPair<B>,
    /// Longest sequence the positional embeddings cover
    max_seq_len: usize,
}

impl<B: AutodiffBackend> MganModel<B> {
    /// Build all three components for `task`. The training mode is fixed here:
    /// `pretrain` selects a teacher-forced generator with cross-entropy,
    /// otherwise the generator is a policy trained with REINFORCE.
    pub fn build(
        config: &ModelConfig,
        task: &Task,
        pretrain: bool,
        device: &B::Device,
    ) -> Result<Self> {
        config.validate()?;
        task.validate()?;
        let vocab_size = task.vocab_size();

        let critic = ComponentPair::new(
            Critic::new(device, vocab_size, config),
            WeightedMse::new(),
        );

        let generator_model = Generator::new(device, vocab_size, task.vocab.bos(), config);
        let generator = if pretrain {
            GeneratorPair::Pretrain(ComponentPair::new(
                generator_model,
                TokenCrossEntropy::new(Some(task.vocab.pad())),
            ))
        } else {
            GeneratorPair::Adversarial(ComponentPair::new(
                generator_model,
                Reinforce::new(config.reinforce_gamma, config.reward_clip),
            ))
        };

        let discriminator = ComponentPair::new(
            Discriminator::new(device, vocab_size, config),
            WeightedBce::new(),
        );

        tracing::debug!(
            "Built {} model: vocab={}, d_model={}, heads={}",
            if pretrain { "pretrain" } else { "adversarial" },
            vocab_size,
            config.d_model,
            config.n_heads
        );

        Ok(Self::from_pairs(
            generator,
            discriminator,
            critic,
            config.max_seq_len,
        ))
    }

    pub fn from_pairs(
        generator: GeneratorPair<B>,
        discriminator: DiscriminatorPair<B>,
        critic: CriticPair<B>,
        max_seq_len: usize,
    ) -> Self {
        Self {
            generator,
            discriminator,
            critic,
            max_seq_len,
        }
    }

    pub fn is_pretrain(&self) -> bool {
        self.generator.is_pretrain()
    }

    pub fn generator(&self) -> &GeneratorPair<B> {
        &self.generator
    }

    pub fn discriminator(&self) -> &DiscriminatorPair<B> {
        &self.discriminator
    }

    pub fn critic(&self) -> &CriticPair<B> {
        &self.critic
    }

    /// Replace the generator with `update(current)`, typically an optimizer step.
    pub fn update_generator<F>(&mut self, update: F)
    where
        F: FnOnce(Generator<B>) -> Generator<B>,
    {
        let model = self.generator.model_mut();
        *model = update(model.clone());
    }

    pub fn update_discriminator<F>(&mut self, update: F)
    where
        F: FnOnce(Discriminator<B>) -> Discriminator<B>,
    {
        self.discriminator.model = update(self.discriminator.model.clone());
    }

    pub fn update_critic<F>(&mut self, update: F)
    where
        F: FnOnce(Critic<B>) -> Critic<B>,
    {
        self.critic.model = update(self.critic.model.clone());
    }

    /// String-tag entry point, see [`Step::from_tag`].
    pub fn dispatch(
        &self,
        batch: &Batch<B>,
        tag: &str,
        real: Option<bool>,
        ppl: bool,
    ) -> Result<StepOutput<B>> {
        self.step(batch, Step::from_tag(tag, real, ppl)?)
    }

    pub fn step(&self, batch: &Batch<B>, step: Step) -> Result<StepOutput<B>> {
        if batch.seq_len() > self.max_seq_len {
            return Err(MganError::ShapeMismatch {
                what: "batch sequence length",
                expected: vec![self.max_seq_len],
                actual: vec![batch.seq_len()],
            });
        }

        match (step, &self.generator) {
            (Step::Generator { perplexity }, GeneratorPair::Pretrain(generator)) => {
                Ok(pretrain_generator_step(generator, batch, perplexity))
            }
            (Step::Generator { perplexity }, GeneratorPair::Adversarial(generator)) => {
                Ok(adversarial_generator_step(
                    generator,
                    &self.discriminator.model,
                    &self.critic.model,
                    batch,
                    perplexity,
                ))
            }
            (Step::Critic, GeneratorPair::Adversarial(generator)) => Ok(critic_step(
                generator,
                &self.discriminator.model,
                &self.critic,
                batch,
            )),
            (Step::Critic, GeneratorPair::Pretrain(_)) => Err(MganError::UnsupportedStep {
                step: CRITIC_TAG,
                mode: "pretrain",
            }),
            (Step::Discriminator { real }, _) => {
                Ok(discriminator_step(&self.discriminator, batch, real))
            }
        }
    }
}

/// Labels for the discriminator: all ones for genuine input, `1 - mask` for
/// generated input (fill positions are fake, context stays real).
///
/// Since the loss is weighted by the mask, `real = false` labels every
/// weighted position as fake. Whether `real` should describe whole sequences
/// or single positions is still open with the owners of the objective.
pub fn discriminator_targets<B: Backend, const D: usize>(
    mask: Tensor<B, D>,
    real: bool,
) -> Tensor<B, D> {
    if real {
        mask.ones_like()
    } else {
        mask.ones_like() - mask
    }
}

/// Teacher-forced generator step: token cross-entropy against `unmasked`,
/// with a greedy decode as the sample.
fn pretrain_generator_step<B: AutodiffBackend>(
    generator: &ComponentPair<Generator<B>, TokenCrossEntropy>,
    batch: &Batch<B>,
    with_perplexity: bool,
) -> StepOutput<B> {
    let (logits, _attn) = generator.model.forward_teacher_forced(
        batch.masked.clone(),
        batch.lengths.clone(),
        batch.unmasked.clone(),
    );
    let samples = greedy_sample(logits.clone());
    let loss = generator
        .criterion
        .forward(logits.clone(), batch.unmasked.clone());

    let perplexity = with_perplexity.then(|| {
        let log_probs = log_softmax(logits.inner(), 2);
        perplexity(
            batch.unmasked.clone().inner(),
            log_probs,
            batch.lengths.clone().inner(),
        )
    });

    StepOutput::Generator {
        loss,
        samples,
        perplexity,
    }
}

/// Policy-gradient generator step. Only the generator is tracked; the
/// discriminator scores the sample and the critic supplies the baseline from
/// frozen copies.
fn adversarial_generator_step<B: AutodiffBackend>(
    generator: &ComponentPair<Generator<B>, Reinforce>,
    discriminator: &Discriminator<B>,
    critic: &Critic<B>,
    batch: &Batch<B>,
    with_perplexity: bool,
) -> StepOutput<B> {
    let (samples, log_probs, _attn) = generator.model.forward(
        batch.masked.clone(),
        batch.lengths.clone(),
        batch.unmasked.clone(),
        batch.mask.clone(),
    );

    let (logits, _attn_scores) = discriminator.forward_frozen(
        batch.masked.clone(),
        batch.lengths.clone(),
        samples.clone(),
    );
    let (baselines, _) =
        critic.forward_frozen(batch.masked.clone(), batch.lengths.clone(), samples.clone());

    let (reward, _cumulative_rewards) = generator.criterion.forward(
        log_probs,
        detach(logits),
        batch.mask.clone(),
        Some(detach(baselines)),
    );
    let loss = -reward;

    let perplexity = with_perplexity.then(|| {
        let frozen = batch.inner();
        let logits = generator
            .model
            .valid()
            .logits(frozen.masked, frozen.lengths.clone(), frozen.unmasked.clone());
        perplexity(frozen.unmasked, log_softmax(logits, 2), frozen.lengths)
    });

    StepOutput::Generator {
        loss,
        samples,
        perplexity,
    }
}

/// Critic step: regress the baseline onto the realised cumulative reward of a
/// frozen generator sample, weighted by the fill mask.
fn critic_step<B: AutodiffBackend>(
    generator: &ComponentPair<Generator<B>, Reinforce>,
    discriminator: &Discriminator<B>,
    critic: &CriticPair<B>,
    batch: &Batch<B>,
) -> StepOutput<B> {
    let (samples, log_probs, _attn) = generator.model.forward_frozen(
        batch.masked.clone(),
        batch.lengths.clone(),
        batch.unmasked.clone(),
        batch.mask.clone(),
    );
    let (logits, _attn_scores) = discriminator.forward_frozen(
        batch.masked.clone(),
        batch.lengths.clone(),
        samples.clone(),
    );

    let (baselines, _) = critic
        .model
        .forward(batch.masked.clone(), batch.lengths.clone(), samples);

    let (_reward, cumulative_rewards) = generator.criterion.forward(
        log_probs,
        logits,
        batch.mask.clone(),
        Some(detach(baselines.clone())),
    );

    let loss = critic.criterion.forward(
        baselines.squeeze::<2>(2),
        detach(cumulative_rewards),
        batch.mask.clone(),
    );
    StepOutput::Critic { loss }
}

/// Discriminator step on `batch.unmasked`; the caller swaps in a generated
/// sample with [`Batch::with_sequence`] for the `real = false` case.
fn discriminator_step<B: AutodiffBackend>(
    discriminator: &DiscriminatorPair<B>,
    batch: &Batch<B>,
    real: bool,
) -> StepOutput<B> {
    let (logits, _attn_scores) = discriminator.model.forward(
        batch.masked.clone(),
        batch.lengths.clone(),
        batch.unmasked.clone(),
    );
    let mask = batch.mask.clone().unsqueeze_dim::<3>(2);
    let truths = discriminator_targets(mask.clone(), real);

    let loss = discriminator.criterion.forward(logits, truths, mask);
    StepOutput::Discriminator { loss }
}
