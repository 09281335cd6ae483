use burn::{
    data::{dataloader::batcher::Batcher, dataset::vision::MnistItem},
    prelude::*,
};

/// Side length of the square digit images.
pub const IMAGE_SIZE: usize = 28;

// Values from the PyTorch MNIST example, shared by training and inference.
pub const MNIST_MEAN: f32 = 0.1307;
pub const MNIST_STD: f32 = 0.3081;

/// Normalizes an intensity already scaled to `[0, 1]`.
pub fn normalize(intensity: f32) -> f32 {
    (intensity - MNIST_MEAN) / MNIST_STD
}

#[derive(Clone, Debug)]
pub struct MnistBatcher<B: Backend> {
    device: B::Device,
}

#[derive(Clone, Debug)]
pub struct MnistBatch<B: Backend> {
    /// Normalized images, `[batch_size, 1, 28, 28]`.
    pub images: Tensor<B, 4>,
    /// Digit labels, `[batch_size]`.
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> MnistBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<MnistItem, MnistBatch<B>> for MnistBatcher<B> {
    fn batch(&self, items: Vec<MnistItem>) -> MnistBatch<B> {
        let batch_size = items.len();

        let pixels = items
            .iter()
            .flat_map(|item| item.image.iter().flatten())
            .map(|pixel| normalize(*pixel / 255.0))
            .collect::<Vec<f32>>();
        let labels = items
            .iter()
            .map(|item| item.label as i64)
            .collect::<Vec<i64>>();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, 1, IMAGE_SIZE, IMAGE_SIZE])
                .convert::<B::FloatElem>(),
            &self.device,
        );
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [batch_size]).convert::<B::IntElem>(),
            &self.device,
        );

        MnistBatch { images, targets }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::TestBackend;

    /// Synthetic digit whose brightness depends on the label.
    pub(crate) fn synthetic_item(label: u8) -> MnistItem {
        let mut image = [[0f32; IMAGE_SIZE]; IMAGE_SIZE];
        let column = 2 + 2 * label as usize;
        for row in image.iter_mut().skip(4).take(20) {
            row[column] = 255.0;
            row[column + 1] = 255.0;
        }

        MnistItem { image, label }
    }

    #[test]
    fn normalize_maps_mean_to_zero() {
        assert!(normalize(MNIST_MEAN).abs() < 1e-7);
        assert!((normalize(1.0) - 2.821_487).abs() < 1e-4);
    }

    #[test]
    fn batch_has_expected_shapes_and_labels() {
        let batcher = MnistBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![synthetic_item(3), synthetic_item(7)]);

        assert_eq!(batch.images.dims(), [2, 1, IMAGE_SIZE, IMAGE_SIZE]);
        assert_eq!(batch.targets.dims(), [2]);

        let labels = batch.targets.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![3, 7]);
    }

    #[test]
    fn batch_pixels_are_normalized() {
        let batcher = MnistBatcher::<TestBackend>::new(Default::default());
        let item = synthetic_item(0);
        let batch = batcher.batch(vec![item]);

        let pixels = batch.images.into_data().to_vec::<f32>().unwrap();
        // Row 0 is background, row 4 carries the stroke at columns 2 and 3.
        assert!((pixels[0] - normalize(0.0)).abs() < 1e-6);
        assert!((pixels[4 * IMAGE_SIZE + 2] - normalize(1.0)).abs() < 1e-6);
    }
}
