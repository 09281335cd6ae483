//! Handwritten-digit recognizer built on burn.
//!
//! Trains a small convolutional network on MNIST, persists it as a checkpoint and
//! serves predictions for arbitrary uploaded images.

#[macro_use]
extern crate derive_new;

pub mod checkpoint;
pub mod cli;
pub mod data;
pub mod device;
pub mod error;
pub mod evaluation;
pub mod inference;
pub mod model;
pub mod optim;
pub mod preprocess;
pub mod training;

#[cfg(test)]
pub(crate) type TestBackend = burn::backend::NdArray<f32>;

#[cfg(test)]
pub(crate) type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;
