use crate::checkpoint::DEFAULT_CHECKPOINT;
use crate::error::{DigitError, Result};
use crate::optim::AdadeltaConfig;
use crate::training::TrainingConfig;
use burn::config::Config;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "digit-recognizer", version, about = "Handwritten digit recognizer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the network on MNIST, evaluating after every epoch.
    Train(TrainArgs),
    /// Predict the digit drawn in an image file.
    Predict {
        /// Image file in any common format.
        image: PathBuf,
        /// Checkpoint locator written by `train --save-model`.
        #[arg(long, default_value = DEFAULT_CHECKPOINT)]
        checkpoint: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
pub struct TrainArgs {
    /// JSON training configuration; flags below override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Checkpoint locator written when saving the model.
    #[arg(long, default_value = DEFAULT_CHECKPOINT)]
    pub checkpoint: PathBuf,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub test_batch_size: Option<usize>,
    #[arg(long)]
    pub epochs: Option<usize>,
    #[arg(long)]
    pub lr: Option<f64>,
    #[arg(long)]
    pub gamma: Option<f64>,
    #[arg(long)]
    pub no_cuda: bool,
    #[arg(long)]
    pub no_wgpu: bool,
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub log_interval: Option<usize>,
    #[arg(long)]
    pub num_workers: Option<usize>,
    #[arg(long)]
    pub save_model: bool,
}

impl TrainArgs {
    /// Builds the training configuration from the optional file and the flags.
    pub fn config(&self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::load(path)
                .map_err(|err| DigitError::Config(format!("{}: {err}", path.display())))?,
            None => TrainingConfig::new(AdadeltaConfig::new()),
        };

        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(test_batch_size) = self.test_batch_size {
            config.test_batch_size = test_batch_size;
        }
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(lr) = self.lr {
            config.learning_rate = lr;
        }
        if let Some(gamma) = self.gamma {
            config.gamma = gamma;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(log_interval) = self.log_interval {
            config.log_interval = log_interval;
        }
        if let Some(num_workers) = self.num_workers {
            config.num_workers = num_workers;
        }
        config.no_cuda |= self.no_cuda;
        config.no_wgpu |= self.no_wgpu;
        config.dry_run |= self.dry_run;
        config.save_model |= self.save_model;

        config.validate()?;

        Ok(config)
    }
}
