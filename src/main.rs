use burn::backend::{Autodiff, NdArray};
use dotenv::dotenv;
use maskgan::{MganError, TrainConfig, Trainer};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

type Backend = Autodiff<NdArray>;

fn init_logging() -> Result<(), MganError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("maskgan=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| MganError::config("logging", e.to_string()))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging()?;

    let config = TrainConfig::from_env()?;
    tracing::info!(
        "Config: iterations={}, batch={}, seq_len={}, pretrain={}",
        config.num_iterations,
        config.batch_size,
        config.seq_len,
        config.pretrain
    );

    let mut trainer = Trainer::<Backend>::new(Default::default(), config)?;
    trainer.train()?;
    Ok(())
}
