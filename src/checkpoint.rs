use crate::error::{DigitError, Result};
use crate::model::{record_shapes, Network, NetworkRecord, PARAM_SHAPES};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use std::path::{Path, PathBuf};

/// Default checkpoint locator, relative to the working directory.
pub const DEFAULT_CHECKPOINT: &str = "data/mnist_cnn";

const CHECKPOINT_EXTENSION: &str = "mpk";

/// Recorder understood by [save] and [load].
pub type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// File written for the checkpoint locator `path`.
pub fn checkpoint_file(path: &Path) -> PathBuf {
    path.with_extension(CHECKPOINT_EXTENSION)
}

/// Writes every parameter of `network`, replacing any previous checkpoint.
pub fn save<B: Backend>(network: &Network<B>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    network
        .clone()
        .save_file(path.to_path_buf(), &CheckpointRecorder::new())?;
    log::info!("Saved checkpoint to {}", checkpoint_file(path).display());

    Ok(())
}

/// Restores a network from the checkpoint at `path`, placing its tensors on `device`.
pub fn load<B: Backend>(path: &Path, device: &B::Device) -> Result<Network<B>> {
    let file = checkpoint_file(path);
    if !file.is_file() {
        return Err(DigitError::MissingCheckpoint(file));
    }

    let record: NetworkRecord<B> = CheckpointRecorder::new().load(path.to_path_buf(), device)?;
    verify_architecture(&record)?;

    Ok(Network::new(device).load_record(record))
}

fn verify_architecture<B: Backend>(record: &NetworkRecord<B>) -> Result<()> {
    for ((parameter, actual), (_, expected)) in record_shapes(record).into_iter().zip(PARAM_SHAPES) {
        if actual.as_deref() != Some(expected) {
            return Err(DigitError::ArchitectureMismatch {
                parameter,
                expected: expected.to_vec(),
                actual,
            });
        }
    }

    Ok(())
}
