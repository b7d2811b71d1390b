//! Step requests and results exchanged with the training driver

use std::fmt;

use burn::prelude::*;

use crate::error::{MganError, Result};

pub const GENERATOR_TAG: &str = "g-step";
pub const CRITIC_TAG: &str = "c-step";
pub const DISCRIMINATOR_TAG: &str = "d-step";

/// One of the training computations, carrying only the arguments it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Train the generator; optionally report perplexity of the ground truth
    Generator { perplexity: bool },
    /// Train the critic towards the realised cumulative reward
    Critic,
    /// Train the discriminator on `unmasked`, labelled as genuine when `real`
    Discriminator { real: bool },
}

impl Step {
    /// Resolve a string tag.
    ///
    /// Accepts `g-step`, `c-step` and `d-step`. Any other tag is treated as
    /// `d-step`, which training drivers rely on as a shorthand; it is logged at
    /// warn level because a typo lands here too. `real` is required whenever
    /// the result is a discriminator step; `ppl` only matters for `g-step`.
    pub fn from_tag(tag: &str, real: Option<bool>, ppl: bool) -> Result<Self> {
        match tag {
            GENERATOR_TAG => Ok(Step::Generator { perplexity: ppl }),
            CRITIC_TAG => Ok(Step::Critic),
            other => {
                if other != DISCRIMINATOR_TAG {
                    tracing::warn!(
                        "Unrecognised step tag {:?}, falling back to {}",
                        other,
                        DISCRIMINATOR_TAG
                    );
                }
                let real = real.ok_or(MganError::MissingArgument {
                    step: DISCRIMINATOR_TAG,
                    argument: "real",
                })?;
                Ok(Step::Discriminator { real })
            }
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Step::Generator { .. } => GENERATOR_TAG,
            Step::Critic => CRITIC_TAG,
            Step::Discriminator { .. } => DISCRIMINATOR_TAG,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.tag())
    }
}

/// What a step hands back. Losses are scalars [1] still attached to the
/// autodiff graph of the component being trained.
#[derive(Debug, Clone)]
pub enum StepOutput<B: Backend> {
    Generator {
        loss: Tensor<B, 1>,
        samples: Tensor<B, 2, Int>,
        perplexity: Option<f32>,
    },
    Critic {
        loss: Tensor<B, 1>,
    },
    Discriminator {
        loss: Tensor<B, 1>,
    },
}

impl<B: Backend> StepOutput<B> {
    pub fn loss(&self) -> &Tensor<B, 1> {
        match self {
            StepOutput::Generator { loss, .. }
            | StepOutput::Critic { loss }
            | StepOutput::Discriminator { loss } => loss,
        }
    }

    pub fn into_loss(self) -> Tensor<B, 1> {
        match self {
            StepOutput::Generator { loss, .. }
            | StepOutput::Critic { loss }
            | StepOutput::Discriminator { loss } => loss,
        }
    }

    pub fn samples(&self) -> Option<&Tensor<B, 2, Int>> {
        match self {
            StepOutput::Generator { samples, .. } => Some(samples),
            _ => None,
        }
    }

    pub fn perplexity(&self) -> Option<f32> {
        match self {
            StepOutput::Generator { perplexity, .. } => *perplexity,
            _ => None,
        }
    }
}
