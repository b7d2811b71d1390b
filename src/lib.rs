//! Adversarial fill-in-the-blank text training.
//!
//! A generator proposes tokens for masked positions, a discriminator scores
//! every token as genuine or generated, and a critic estimates the expected
//! discounted reward so the generator can be trained with REINFORCE.

pub mod batch;
pub mod config;
pub mod criterions;
pub mod error;
pub mod isolation;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod pair;
pub mod render;
pub mod step;
pub mod train;
pub mod vocab;

pub use batch::Batch;
pub use config::{ModelConfig, TrainConfig};
pub use error::{MganError, Result};
pub use orchestrator::MganModel;
pub use step::{Step, StepOutput};
pub use train::Trainer;
pub use vocab::{Task, Vocab};
