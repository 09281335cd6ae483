use crate::data::IMAGE_SIZE;
use crate::error::{DigitError, Result};
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::Reduction,
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{log_softmax, relu},
};

/// Number of digit classes.
pub const NUM_CLASSES: usize = 10;

/// Expected `[channels, height, width]` of every network input.
pub const INPUT_SHAPE: [usize; 3] = [1, IMAGE_SIZE, IMAGE_SIZE];

const CONV1_CHANNELS: usize = 32;
const CONV2_CHANNELS: usize = 64;
const KERNEL_SIZE: usize = 3;
const HIDDEN_SIZE: usize = 128;
// 64 channels of 12x12 after two valid 3x3 convolutions and a 2x2 pool.
const FLATTENED_SIZE: usize = 9216;

/// Parameter names and shapes fixed by the architecture.
pub const PARAM_SHAPES: [(&str, &[usize]); 8] = [
    ("conv1.weight", &[CONV1_CHANNELS, 1, KERNEL_SIZE, KERNEL_SIZE]),
    ("conv1.bias", &[CONV1_CHANNELS]),
    (
        "conv2.weight",
        &[CONV2_CHANNELS, CONV1_CHANNELS, KERNEL_SIZE, KERNEL_SIZE],
    ),
    ("conv2.bias", &[CONV2_CHANNELS]),
    ("fc1.weight", &[FLATTENED_SIZE, HIDDEN_SIZE]),
    ("fc1.bias", &[HIDDEN_SIZE]),
    ("fc2.weight", &[HIDDEN_SIZE, NUM_CLASSES]),
    ("fc2.bias", &[NUM_CLASSES]),
];

/// Whether stochastic regularization is active during a forward pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Convolutional digit classifier.
///
/// The same definition is used for training and inference; only the backend and
/// the [mode](Mode) passed to [forward](Network::forward) differ.
#[derive(Module, Debug)]
pub struct Network<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    pool: MaxPool2d,
    dropout1: Dropout,
    dropout2: Dropout,
    fc1: Linear<B>,
    fc2: Linear<B>,
}

impl<B: Backend> Network<B> {
    /// Creates a network with freshly initialized parameters on `device`.
    pub fn new(device: &B::Device) -> Self {
        Self {
            conv1: Conv2dConfig::new([1, CONV1_CHANNELS], [KERNEL_SIZE, KERNEL_SIZE]).init(device),
            conv2: Conv2dConfig::new([CONV1_CHANNELS, CONV2_CHANNELS], [KERNEL_SIZE, KERNEL_SIZE])
                .init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout1: DropoutConfig::new(0.25).init(),
            dropout2: DropoutConfig::new(0.5).init(),
            fc1: LinearConfig::new(FLATTENED_SIZE, HIDDEN_SIZE).init(device),
            fc2: LinearConfig::new(HIDDEN_SIZE, NUM_CLASSES).init(device),
        }
    }

    /// # Shapes
    ///   - Images `[batch_size, 1, 28, 28]`
    ///   - Output `[batch_size, 10]`, log-probabilities per row
    pub fn forward(&self, images: Tensor<B, 4>, mode: Mode) -> Result<Tensor<B, 2>> {
        let [_, channels, height, width] = images.dims();
        if [channels, height, width] != INPUT_SHAPE {
            return Err(DigitError::ShapeMismatch {
                expected: INPUT_SHAPE.to_vec(),
                actual: images.dims().to_vec(),
            });
        }

        let x = relu(self.conv1.forward(images));
        let x = relu(self.conv2.forward(x));
        let x = self.pool.forward(x);
        let x = self.regularize(&self.dropout1, x, mode);

        let x = x.flatten::<2>(1, 3);
        let x = relu(self.fc1.forward(x));
        let x = self.regularize(&self.dropout2, x, mode);
        let x = self.fc2.forward(x);

        Ok(log_softmax(x, 1))
    }

    fn regularize<const D: usize>(
        &self,
        dropout: &Dropout,
        input: Tensor<B, D>,
        mode: Mode,
    ) -> Tensor<B, D> {
        match mode {
            Mode::Train => dropout.forward(input),
            Mode::Eval => input,
        }
    }

    /// Named shapes of every learnable parameter, in [PARAM_SHAPES] order.
    pub fn param_shapes(&self) -> Vec<(&'static str, Option<Vec<usize>>)> {
        record_shapes(&self.clone().into_record())
    }

    #[cfg(test)]
    pub(crate) fn with_output_layer(mut self, fc2: Linear<B>) -> Self {
        self.fc2 = fc2;
        self
    }
}

/// Named parameter shapes held by a network record, in [PARAM_SHAPES] order.
///
/// A missing bias is reported as `None`.
pub fn record_shapes<B: Backend>(
    record: &NetworkRecord<B>,
) -> Vec<(&'static str, Option<Vec<usize>>)> {
    let bias = |bias: &Option<burn::module::Param<Tensor<B, 1>>>| {
        bias.as_ref().map(|bias| bias.val().dims().to_vec())
    };

    let shapes = [
        Some(record.conv1.weight.val().dims().to_vec()),
        bias(&record.conv1.bias),
        Some(record.conv2.weight.val().dims().to_vec()),
        bias(&record.conv2.bias),
        Some(record.fc1.weight.val().dims().to_vec()),
        bias(&record.fc1.bias),
        Some(record.fc2.weight.val().dims().to_vec()),
        bias(&record.fc2.bias),
    ];

    PARAM_SHAPES
        .iter()
        .map(|(name, _)| *name)
        .zip(shapes)
        .collect()
}

/// Negative log-likelihood of the target class of each row.
///
/// `log_probs` is `[batch_size, num_classes]`, `targets` is `[batch_size]`.
/// [Reduction::Auto] behaves like [Reduction::Mean].
pub fn nll_loss<B: Backend>(
    log_probs: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    reduction: Reduction,
) -> Tensor<B, 1> {
    let [batch_size, _] = log_probs.dims();
    let picked = log_probs
        .gather(1, targets.reshape([batch_size, 1]))
        .neg()
        .flatten::<1>(0, 1);

    match reduction {
        Reduction::Sum => picked.sum(),
        Reduction::Mean | Reduction::Auto => picked.mean(),
    }
}
