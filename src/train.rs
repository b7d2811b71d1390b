//! Training driver
//!
//! Sequences step requests against an [`MganModel`] on synthetic fill-in
//! data, applies Adam updates per component, logs running statistics with
//! rendered samples and writes per-component checkpoints.

use std::fs;
use std::path::Path;

use burn::module::Module;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::batch::Batch;
use crate::config::TrainConfig;
use crate::error::{MganError, Result};
use crate::metrics::TrainingMetrics;
use crate::models::{Critic, Discriminator, Generator};
use crate::orchestrator::MganModel;
use crate::render::{SequenceRenderer, pretty_lines};
use crate::step::Step;
use crate::vocab::{Task, Vocab};

const GENERATOR_FILE: &str = "generator";
const DISCRIMINATOR_FILE: &str = "discriminator";
const CRITIC_FILE: &str = "critic";

/// Vocabulary of `words` synthetic symbols `w0`, `w1`, ...
pub fn synthetic_task(words: usize) -> Task {
    Task::new(Vocab::from_symbols((0..words).map(|i| format!("w{}", i))))
}

pub struct Trainer<B: AutodiffBackend> {
    model: MganModel<B>,
    task: Task,
    config: TrainConfig,
    device: B::Device,
    rng: StdRng,
    metrics: TrainingMetrics,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(device: B::Device, config: TrainConfig) -> Result<Self> {
        config.validate()?;
        let task = synthetic_task(config.vocab_words);
        let model = MganModel::build(&config.model, &task, config.pretrain, &device)?;

        let mut trainer = Self {
            model,
            task,
            rng: StdRng::seed_from_u64(config.seed),
            metrics: TrainingMetrics::new(config.log_freq.max(1)),
            config,
            device,
        };
        if let Some(dir) = trainer.config.resume_dir.clone() {
            trainer.load_checkpoint(&dir)?;
        }
        Ok(trainer)
    }

    pub fn model(&self) -> &MganModel<B> {
        &self.model
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Counting sequences over the word symbols with one contiguous fill span
    /// covering `mask_ratio` of each example.
    pub fn synthetic_batch(&mut self) -> Result<Batch<B>> {
        let words = self.config.vocab_words;
        let first_word = self.task.vocab.len() - words;
        let min_len = self.config.seq_len.div_ceil(2);

        let mut sequences = Vec::with_capacity(self.config.batch_size);
        let mut fill = Vec::with_capacity(self.config.batch_size);
        for _ in 0..self.config.batch_size {
            let len = self.rng.random_range(min_len..=self.config.seq_len);
            let start = self.rng.random_range(0..words);
            sequences.push(
                (0..len)
                    .map(|t| first_word + (start + t) % words)
                    .collect::<Vec<_>>(),
            );

            let span = ((len as f64 * self.config.mask_ratio).round() as usize).min(len);
            let offset = self.rng.random_range(0..=len - span);
            fill.push((0..len).map(|t| t >= offset && t < offset + span).collect());
        }

        Batch::from_sequences(&self.task.vocab, &sequences, &fill, &self.device)
    }

    /// Run the training loop
    pub fn train(&mut self) -> Result<()> {
        let mut generator_optim = AdamConfig::new().init::<B, Generator<B>>();
        let mut discriminator_optim = AdamConfig::new().init::<B, Discriminator<B>>();
        let mut critic_optim = AdamConfig::new().init::<B, Critic<B>>();
        let lr = self.config.learning_rate;

        tracing::info!(
            "Starting {} training for {} iterations",
            if self.model.is_pretrain() {
                "pretrain"
            } else {
                "adversarial"
            },
            self.config.num_iterations
        );

        for iteration in 1..=self.config.num_iterations {
            let batch = self.synthetic_batch()?;
            let log_now = iteration % self.config.log_freq == 0;

            let output = self
                .model
                .step(&batch, Step::Generator { perplexity: log_now })?;
            let samples = output.samples().cloned();
            if let Some(ppl) = output.perplexity() {
                self.metrics.perplexity.push(ppl);
            }
            let loss = output.into_loss();
            self.metrics.generator_loss.push(scalar(&loss));
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, self.model.generator().model());
            self.model
                .update_generator(|m| generator_optim.step(lr, m, grads));

            if !self.model.is_pretrain() {
                let loss = self.model.step(&batch, Step::Critic)?.into_loss();
                self.metrics.critic_loss.push(scalar(&loss));
                let grads = GradientsParams::from_grads(loss.backward(), &self.model.critic().model);
                self.model.update_critic(|m| critic_optim.step(lr, m, grads));

                let mut d_batches = vec![(batch.clone(), true)];
                if let Some(samples) = samples.clone() {
                    d_batches.push((batch.with_sequence(samples), false));
                }
                for (d_batch, real) in d_batches {
                    let loss = self
                        .model
                        .step(&d_batch, Step::Discriminator { real })?
                        .into_loss();
                    let value = scalar(&loss);
                    if real {
                        self.metrics.real_loss.push(value);
                    } else {
                        self.metrics.fake_loss.push(value);
                    }
                    let grads = GradientsParams::from_grads(
                        loss.backward(),
                        &self.model.discriminator().model,
                    );
                    self.model
                        .update_discriminator(|m| discriminator_optim.step(lr, m, grads));
                }
            }

            self.metrics
                .update_iteration(iteration, self.config.batch_size);

            if log_now {
                self.metrics.log_to_console();
                if let Some(samples) = samples {
                    self.log_samples(&batch, samples);
                }
            }

            if iteration % self.config.checkpoint_freq == 0 {
                self.save_checkpoint(&format!(
                    "{}/checkpoint_{}",
                    self.config.checkpoint_dir, iteration
                ))?;
            }
        }

        self.save_checkpoint(&format!("{}/final", self.config.checkpoint_dir))?;
        tracing::info!("Training complete!");
        Ok(())
    }

    fn log_samples(&self, batch: &Batch<B>, samples: Tensor<B, 2, Int>) {
        let renderer = SequenceRenderer::new(&self.task.vocab);
        for line in pretty_lines(
            &renderer,
            batch.masked.clone(),
            batch.unmasked.clone(),
            samples,
            Some(self.config.render_examples),
        ) {
            tracing::info!("  {}", line);
        }
    }

    /// Save all three components under `dir`
    pub fn save_checkpoint(&self, dir: &str) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| checkpoint_error(dir, e))?;
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let path = |name: &str| Path::new(dir).join(name);

        self.model
            .generator()
            .model()
            .clone()
            .save_file(path(GENERATOR_FILE), &recorder)
            .map_err(|e| checkpoint_error(dir, e))?;
        self.model
            .discriminator()
            .model
            .clone()
            .save_file(path(DISCRIMINATOR_FILE), &recorder)
            .map_err(|e| checkpoint_error(dir, e))?;
        self.model
            .critic()
            .model
            .clone()
            .save_file(path(CRITIC_FILE), &recorder)
            .map_err(|e| checkpoint_error(dir, e))?;

        tracing::info!("Saved checkpoint to {}", dir);
        Ok(())
    }

    /// Load all three components from `dir`. The generator weights fit either
    /// training mode, so a pretrained generator can seed adversarial training.
    pub fn load_checkpoint(&mut self, dir: &str) -> Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let path = |name: &str| Path::new(dir).join(name);

        let generator = self
            .model
            .generator()
            .model()
            .clone()
            .load_file(path(GENERATOR_FILE), &recorder, &self.device)
            .map_err(|e| checkpoint_error(dir, e))?;
        let discriminator = self
            .model
            .discriminator()
            .model
            .clone()
            .load_file(path(DISCRIMINATOR_FILE), &recorder, &self.device)
            .map_err(|e| checkpoint_error(dir, e))?;
        let critic = self
            .model
            .critic()
            .model
            .clone()
            .load_file(path(CRITIC_FILE), &recorder, &self.device)
            .map_err(|e| checkpoint_error(dir, e))?;

        self.model.update_generator(|_| generator);
        self.model.update_discriminator(|_| discriminator);
        self.model.update_critic(|_| critic);
        tracing::info!("Loaded checkpoint from {}", dir);
        Ok(())
    }
}

fn scalar<B: Backend>(loss: &Tensor<B, 1>) -> f32 {
    loss.clone().into_scalar().elem::<f32>()
}

fn checkpoint_error(dir: &str, err: impl std::fmt::Display) -> MganError {
    MganError::Checkpoint {
        path: dir.to_string(),
        reason: err.to_string(),
    }
}
