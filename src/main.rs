#![recursion_limit = "256"]

use clap::Parser;
use digit_recognizer::{
    cli::{Cli, Commands, TrainArgs},
    device::ExecutionContext,
    error::Result,
    inference, training,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Also forwards `log` records from the library and burn.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Train(args) => train(&args),
        Commands::Predict { image, checkpoint } => std::fs::read(&image)
            .map_err(Into::into)
            .and_then(|bytes| inference::predict(&bytes, &checkpoint))
            .map(|label| println!("{label}")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn train(args: &TrainArgs) -> Result<()> {
    let config = args.config()?;
    let context = ExecutionContext::select(&config);

    #[allow(unreachable_patterns)]
    match context {
        #[cfg(feature = "tch-gpu")]
        ExecutionContext::Cuda => {
            use burn::backend::{libtorch::LibTorchDevice, Autodiff, LibTorch};
            training::run::<Autodiff<LibTorch>>(&config, LibTorchDevice::Cuda(0), &args.checkpoint)?;
        }
        #[cfg(feature = "wgpu")]
        ExecutionContext::Wgpu => {
            use burn::backend::{wgpu::WgpuDevice, Autodiff, Wgpu};
            training::run::<Autodiff<Wgpu>>(&config, WgpuDevice::default(), &args.checkpoint)?;
        }
        _ => {
            use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};
            training::run::<Autodiff<NdArray>>(&config, NdArrayDevice::Cpu, &args.checkpoint)?;
        }
    }

    Ok(())
}
