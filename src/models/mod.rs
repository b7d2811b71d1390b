//! Trainable components: generator, discriminator and critic
//!
//! All three read the masked context next to a candidate sequence. Each has a
//! tracked `forward` and a `forward_frozen` that is safe to call wherever
//! another component is being trained.

pub mod critic;
pub mod discriminator;
pub mod encoder;
pub mod generator;

pub use critic::Critic;
pub use discriminator::Discriminator;
pub use encoder::SequenceEncoder;
pub use generator::Generator;
