use crate::data::MnistBatch;
use crate::error::Result;
use crate::model::{nll_loss, Mode, Network};
use burn::{data::dataloader::DataLoader, nn::loss::Reduction, prelude::*};
use std::sync::Arc;

/// Loss and accuracy of one pass over a held-out dataset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvaluationReport {
    /// Negative log-likelihood summed over every item.
    pub summed_loss: f64,
    /// Items whose most likely class is the true label.
    pub correct: usize,
    /// Items evaluated.
    pub num_items: usize,
}

impl EvaluationReport {
    pub fn average_loss(&self) -> f64 {
        if self.num_items == 0 {
            return 0.0;
        }
        self.summed_loss / self.num_items as f64
    }

    /// Percentage of correct predictions.
    pub fn accuracy(&self) -> f64 {
        if self.num_items == 0 {
            return 0.0;
        }
        self.correct as f64 / self.num_items as f64 * 100.0
    }
}

/// Runs `network` in eval mode over every batch of `dataloader`.
///
/// Call it with the inner backend of an autodiff model (`model.valid()`) so that no
/// gradient is tracked; parameters are never modified.
pub fn evaluate<B: Backend>(
    network: &Network<B>,
    dataloader: Arc<dyn DataLoader<MnistBatch<B>>>,
) -> Result<EvaluationReport> {
    let mut report = EvaluationReport {
        summed_loss: 0.0,
        correct: 0,
        num_items: 0,
    };

    for batch in dataloader.iter() {
        let [batch_size] = batch.targets.dims();
        let output = network.forward(batch.images, Mode::Eval)?;

        let loss = nll_loss(output.clone(), batch.targets.clone(), Reduction::Sum);
        report.summed_loss += loss.into_scalar().elem::<f64>();

        let predictions = output.argmax(1).flatten::<1>(0, 1);
        let correct = predictions
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        report.correct += correct as usize;
        report.num_items += batch_size;
    }

    log::info!(
        "Test set: Average loss: {:.4}, Accuracy: {}/{} ({:.0}%)",
        report.average_loss(),
        report.correct,
        report.num_items,
        report.accuracy()
    );

    Ok(report)
}
