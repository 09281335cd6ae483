use crate::checkpoint;
use crate::error::Result;
use crate::model::Mode;
use crate::preprocess::preprocess;
use burn::{
    backend::{ndarray::NdArrayDevice, NdArray},
    prelude::*,
};
use std::path::Path;

/// Backend used to serve predictions, always on the host CPU.
pub type InferenceBackend = NdArray<f32>;

/// Predicts the digit drawn in `image_bytes` with the checkpoint at `checkpoint_path`.
///
/// Every call restores its own network, so concurrent calls share no state.
pub fn predict(image_bytes: &[u8], checkpoint_path: &Path) -> Result<u8> {
    predict_with::<InferenceBackend>(image_bytes, checkpoint_path, &NdArrayDevice::Cpu)
}

/// Same as [predict], on an arbitrary backend and device.
pub fn predict_with<B: Backend>(
    image_bytes: &[u8],
    checkpoint_path: &Path,
    device: &B::Device,
) -> Result<u8> {
    let images = preprocess::<B>(image_bytes, device)?;
    let network = checkpoint::load::<B>(checkpoint_path, device)?;

    let output = network.forward(images, Mode::Eval)?;
    let predicted = output.argmax(1).flatten::<1>(0, 1).into_scalar();

    Ok(predicted.elem::<i64>() as u8)
}
