//! Model and training configuration

use std::env;
use std::str::FromStr;

use burn::config::Config;

use crate::error::{self, MganError};

/// Hyperparameters shared by the generator, discriminator and critic
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Embedding and hidden size
    #[config(default = 64)]
    pub d_model: usize,
    /// Attention heads per self-attention block
    #[config(default = 4)]
    pub n_heads: usize,
    /// Dropout applied inside attention
    #[config(default = 0.1)]
    pub dropout: f64,
    /// Size of the learned position table
    #[config(default = 128)]
    pub max_seq_len: usize,
    /// Discount factor for cumulative rewards
    #[config(default = 0.01)]
    pub reinforce_gamma: f32,
    /// Bound on the absolute advantage
    #[config(default = 5.0)]
    pub reward_clip: f32,
}

impl ModelConfig {
    pub fn validate(&self) -> error::Result<()> {
        if self.d_model == 0 {
            return Err(MganError::config("d_model", "must be positive"));
        }
        if self.n_heads == 0 {
            return Err(MganError::config("n_heads", "must be positive"));
        }
        if self.d_model % self.n_heads != 0 {
            return Err(MganError::config(
                "d_model",
                format!(
                    "{} is not divisible by n_heads = {}",
                    self.d_model, self.n_heads
                ),
            ));
        }
        if self.max_seq_len == 0 {
            return Err(MganError::config("max_seq_len", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(MganError::config(
                "dropout",
                format!("{} is outside [0, 1)", self.dropout),
            ));
        }
        if !(0.0..=1.0).contains(&self.reinforce_gamma) {
            return Err(MganError::config(
                "reinforce_gamma",
                format!("{} is outside [0, 1]", self.reinforce_gamma),
            ));
        }
        if !self.reward_clip.is_finite() || self.reward_clip <= 0.0 {
            return Err(MganError::config(
                "reward_clip",
                format!("{} must be finite and positive", self.reward_clip),
            ));
        }
        Ok(())
    }
}

/// Settings for the bundled training driver
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Number of training iterations
    pub num_iterations: usize,
    /// Examples per batch
    pub batch_size: usize,
    /// Tokens per synthetic example
    pub seq_len: usize,
    /// Fraction of each example covered by the fill span
    pub mask_ratio: f64,
    /// Adam learning rate shared by all three components
    pub learning_rate: f64,
    /// Number of synthetic word symbols added to the vocabulary
    pub vocab_words: usize,
    /// Train with teacher forcing instead of the adversarial objective
    pub pretrain: bool,
    /// Logging frequency (iterations)
    pub log_freq: usize,
    /// Checkpoint save frequency (iterations)
    pub checkpoint_freq: usize,
    /// Directory for per-component checkpoints
    pub checkpoint_dir: String,
    /// Load components from this checkpoint directory before training
    pub resume_dir: Option<String>,
    /// Examples rendered per log entry
    pub render_examples: usize,
    /// Seed for synthetic data
    pub seed: u64,
    /// Component hyperparameters
    pub model: ModelConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            num_iterations: 200,
            batch_size: 16,
            seq_len: 20,
            mask_ratio: 0.5,
            learning_rate: 1e-3,
            vocab_words: 64,
            pretrain: true,
            log_freq: 10,
            checkpoint_freq: 100,
            checkpoint_dir: "checkpoints".to_string(),
            resume_dir: None,
            render_examples: 2,
            seed: 42,
            model: ModelConfig::new(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|val| val.parse::<T>().ok())
        .unwrap_or(default)
}

impl TrainConfig {
    /// Read `MGAN_*` variables, keeping defaults for anything unset or unparsable
    pub fn from_env() -> error::Result<Self> {
        let defaults = Self::default();

        let model = match env::var("MGAN_MODEL_CONFIG") {
            Ok(path) => ModelConfig::load(&path)
                .map_err(|e| MganError::config("MGAN_MODEL_CONFIG", format!("{}: {}", path, e)))?,
            Err(_) => defaults.model.clone(),
        };
        model.validate()?;

        let config = Self {
            num_iterations: env_or("MGAN_ITERATIONS", defaults.num_iterations),
            batch_size: env_or("MGAN_BATCH_SIZE", defaults.batch_size),
            seq_len: env_or("MGAN_SEQ_LEN", defaults.seq_len),
            mask_ratio: env_or("MGAN_MASK_RATIO", defaults.mask_ratio),
            learning_rate: env_or("MGAN_LEARNING_RATE", defaults.learning_rate),
            vocab_words: env_or("MGAN_VOCAB_WORDS", defaults.vocab_words),
            pretrain: env_or("MGAN_PRETRAIN", defaults.pretrain),
            log_freq: env_or("MGAN_LOG_FREQ", defaults.log_freq),
            checkpoint_freq: env_or("MGAN_CHECKPOINT_FREQ", defaults.checkpoint_freq),
            checkpoint_dir: env::var("MGAN_CHECKPOINT_DIR").unwrap_or(defaults.checkpoint_dir),
            resume_dir: env::var("MGAN_RESUME_DIR").ok(),
            render_examples: env_or("MGAN_RENDER_EXAMPLES", defaults.render_examples),
            seed: env_or("MGAN_SEED", defaults.seed),
            model,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> error::Result<()> {
        if self.batch_size == 0 {
            return Err(MganError::config("batch_size", "must be positive"));
        }
        if self.seq_len == 0 || self.seq_len > self.model.max_seq_len {
            return Err(MganError::config(
                "seq_len",
                format!("{} is outside 1..={}", self.seq_len, self.model.max_seq_len),
            ));
        }
        if !(0.0..=1.0).contains(&self.mask_ratio) {
            return Err(MganError::config(
                "mask_ratio",
                format!("{} is outside [0, 1]", self.mask_ratio),
            ));
        }
        if self.vocab_words == 0 {
            return Err(MganError::config("vocab_words", "must be positive"));
        }
        if self.log_freq == 0 || self.checkpoint_freq == 0 {
            return Err(MganError::config("log_freq", "frequencies must be positive"));
        }
        self.model.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_default() {
        let config = ModelConfig::new();
        assert_eq!(config.d_model, 64);
        assert_eq!(config.n_heads, 4);
        assert!((config.reinforce_gamma - 0.01).abs() < 1e-6);
        assert!((config.reward_clip - 5.0).abs() < 1e-6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_heads_must_divide_model_dim() {
        let config = ModelConfig::new().with_d_model(30).with_n_heads(4);
        match config.validate() {
            Err(MganError::Configuration { field, .. }) => assert_eq!(field, "d_model"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_reward_clip_must_be_positive() {
        let config = ModelConfig::new().with_reward_clip(0.0);
        assert!(config.validate().is_err());
        let config = ModelConfig::new().with_reinforce_gamma(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_train_config_default() {
        let config = TrainConfig::default();
        assert_eq!(config.batch_size, 16);
        assert!(config.pretrain);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_train_config_rejects_long_sequences() {
        let mut config = TrainConfig::default();
        config.seq_len = config.model.max_seq_len + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_config_json_round_trip() {
        let path = std::env::temp_dir().join(format!("maskgan-model-{}.json", std::process::id()));
        let config = ModelConfig::new().with_d_model(32).with_reward_clip(2.5);
        config.save(&path).unwrap();

        let loaded = ModelConfig::load(&path).unwrap();
        assert_eq!(loaded.d_model, 32);
        assert!((loaded.reward_clip - 2.5).abs() < 1e-6);
        assert!(loaded.validate().is_ok());
        let _ = std::fs::remove_file(&path);
    }
}
