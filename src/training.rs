use crate::checkpoint;
use crate::data::{MnistBatch, MnistBatcher};
use crate::error::{self, DigitError};
use crate::evaluation::{evaluate, EvaluationReport};
use crate::model::{nll_loss, Mode, Network};
use crate::optim::{AdadeltaConfig, EpochDecay};
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::{
            vision::{MnistDataset, MnistItem},
            Dataset,
        },
    },
    module::AutodiffModule,
    nn::loss::Reduction,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
    LearningRate,
};
use std::path::Path;
use std::sync::Arc;

#[derive(Config, Debug)]
pub struct TrainingConfig {
    pub optimizer: AdadeltaConfig,

    /// Input batch size for training.
    #[config(default = 64)]
    pub batch_size: usize,
    /// Input batch size for evaluation.
    #[config(default = 1000)]
    pub test_batch_size: usize,
    #[config(default = 14)]
    pub epochs: usize,
    #[config(default = 1.0)]
    pub learning_rate: LearningRate,
    /// Learning rate multiplier applied after every epoch.
    #[config(default = 0.7)]
    pub gamma: f64,
    /// Disables the CUDA accelerator.
    #[config(default = false)]
    pub no_cuda: bool,
    /// Disables the graphics accelerator.
    #[config(default = false)]
    pub no_wgpu: bool,
    /// Stops every epoch after its first logged batch.
    #[config(default = false)]
    pub dry_run: bool,
    #[config(default = 1)]
    pub seed: u64,
    /// How many batches to wait before logging training status.
    #[config(default = 10)]
    pub log_interval: usize,
    /// Saves the trained network to the checkpoint locator.
    #[config(default = false)]
    pub save_model: bool,
    /// Background threads prefetching batches, `0` loads them on the training thread.
    #[config(default = 1)]
    pub num_workers: usize,
}

impl TrainingConfig {
    pub fn validate(&self) -> error::Result<()> {
        let counts = [
            ("batch_size", self.batch_size),
            ("test_batch_size", self.test_batch_size),
            ("epochs", self.epochs),
            ("log_interval", self.log_interval),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(DigitError::InvalidConfig(format!(
                    "{name} must be at least 1"
                )));
            }
        }

        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(DigitError::InvalidConfig(
                "learning_rate must be positive".to_string(),
            ));
        }
        if self.gamma.is_nan() || self.gamma <= 0.0 || self.gamma > 1.0 {
            return Err(DigitError::InvalidConfig(
                "gamma must be in (0, 1]".to_string(),
            ));
        }

        Ok(())
    }
}

/// Training status observed every `log_interval` batches.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEntry {
    pub epoch: usize,
    pub batch: usize,
    /// Items consumed before this batch.
    pub items_seen: usize,
    pub num_items: usize,
    /// Share of the epoch's batches already processed.
    pub percent: f64,
    pub loss: f32,
}

#[derive(Clone, Debug)]
pub struct EpochSummary {
    pub epoch: usize,
    pub learning_rate: LearningRate,
    /// Optimizer steps taken during the epoch.
    pub steps: usize,
    pub progress: Vec<ProgressEntry>,
    pub evaluation: EvaluationReport,
}

#[derive(Clone, Debug, Default)]
pub struct TrainingReport {
    pub epochs: Vec<EpochSummary>,
}

impl TrainingReport {
    pub fn final_evaluation(&self) -> Option<&EvaluationReport> {
        self.epochs.last().map(|summary| &summary.evaluation)
    }
}

/// Trains on the standard MNIST splits, downloading them on first use.
pub fn run<B: AutodiffBackend>(
    config: &TrainingConfig,
    device: B::Device,
    checkpoint_path: &Path,
) -> error::Result<TrainingReport> {
    let (_, report) = train::<B, _, _>(
        config,
        device,
        MnistDataset::train(),
        MnistDataset::test(),
        checkpoint_path,
    )?;

    if let Some(evaluation) = report.final_evaluation() {
        log::info!(
            "Training done after {} epochs, test accuracy {:.2}%",
            report.epochs.len(),
            evaluation.accuracy()
        );
    }

    Ok(report)
}

/// Trains a fresh network, evaluating it on `test_set` after every epoch.
///
/// The network is written to `checkpoint_path` once all epochs completed, when
/// `config.save_model` is set.
pub fn train<B, D, T>(
    config: &TrainingConfig,
    device: B::Device,
    train_set: D,
    test_set: T,
    checkpoint_path: &Path,
) -> error::Result<(Network<B>, TrainingReport)>
where
    B: AutodiffBackend,
    D: Dataset<MnistItem> + 'static,
    T: Dataset<MnistItem> + 'static,
{
    config.validate()?;
    B::seed(config.seed);

    let mut model = Network::<B>::new(&device);
    let mut optim = config.optimizer.init::<B, Network<B>>();
    let mut schedule = EpochDecay::new(config.learning_rate, config.gamma);

    let dataloader_train = dataloader::<B, _>(
        &device,
        config.batch_size,
        Some(config.seed),
        config.num_workers,
        train_set,
    );
    let dataloader_test = dataloader::<B::InnerBackend, _>(
        &device,
        config.test_batch_size,
        None,
        config.num_workers,
        test_set,
    );

    let num_items = dataloader_train.num_items();
    let num_batches = num_items.div_ceil(config.batch_size);
    let mut report = TrainingReport::default();

    for epoch in 1..config.epochs + 1 {
        let lr = schedule.lr();
        let mut progress = Vec::new();
        let mut steps = 0;

        for (iteration, batch) in dataloader_train.iter().enumerate() {
            let [batch_size] = batch.targets.dims();
            let output = model.forward(batch.images, Mode::Train)?;
            let loss = nll_loss(output, batch.targets, Reduction::Mean);

            // Gradients for the current backward pass
            let grads = loss.backward();
            // Gradients linked to each parameter of the model.
            let grads = GradientsParams::from_grads(grads, &model);
            // Update the model using the optimizer.
            model = optim.step(lr, model, grads);
            steps += 1;

            if iteration % config.log_interval == 0 {
                let entry = ProgressEntry {
                    epoch,
                    batch: iteration,
                    items_seen: iteration * batch_size,
                    num_items,
                    percent: 100.0 * iteration as f64 / num_batches as f64,
                    loss: loss.into_scalar().elem::<f32>(),
                };
                log::info!(
                    "Train Epoch: {} [{}/{} ({:.0}%)]\tLoss: {:.6}",
                    entry.epoch,
                    entry.items_seen,
                    entry.num_items,
                    entry.percent,
                    entry.loss
                );
                progress.push(entry);

                if config.dry_run {
                    break;
                }
            }
        }

        // Get the model without autodiff.
        let evaluation = evaluate(&model.valid(), dataloader_test.clone())?;
        report.epochs.push(EpochSummary {
            epoch,
            learning_rate: lr,
            steps,
            progress,
            evaluation,
        });

        schedule.step();
    }

    if config.save_model {
        checkpoint::save(&model, checkpoint_path)?;
        config.save(checkpoint_path.with_extension("json"))?;
    }

    Ok((model, report))
}

fn dataloader<B: Backend, D: Dataset<MnistItem> + 'static>(
    device: &B::Device,
    batch_size: usize,
    shuffle: Option<u64>,
    num_workers: usize,
    dataset: D,
) -> Arc<dyn DataLoader<MnistBatch<B>>> {
    let mut builder = DataLoaderBuilder::new(MnistBatcher::<B>::new(device.clone()))
        .batch_size(batch_size);

    if let Some(seed) = shuffle {
        builder = builder.shuffle(seed);
    }
    if num_workers > 0 {
        builder = builder.num_workers(num_workers);
    }

    builder.build(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::synthetic_item;
    use crate::TestAutodiffBackend;
    use burn::data::dataset::InMemDataset;

    fn dataset(len: usize) -> InMemDataset<MnistItem> {
        InMemDataset::new((0..len).map(|i| synthetic_item((i % 10) as u8)).collect())
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig::new(AdadeltaConfig::new())
            .with_batch_size(2)
            .with_test_batch_size(3)
            .with_epochs(1)
            .with_log_interval(1)
            .with_num_workers(0)
    }

    #[test]
    fn defaults_follow_reference_training_setup() {
        let config = TrainingConfig::new(AdadeltaConfig::new());

        assert_eq!(config.batch_size, 64);
        assert_eq!(config.test_batch_size, 1000);
        assert_eq!(config.epochs, 14);
        assert_eq!(config.learning_rate, 1.0);
        assert_eq!(config.gamma, 0.7);
        assert!(!config.no_cuda && !config.no_wgpu && !config.dry_run && !config.save_model);
        assert_eq!(config.seed, 1);
        assert_eq!(config.log_interval, 10);
        assert_eq!(config.optimizer.rho, 0.9);
        assert_eq!(config.optimizer.epsilon, 1e-6);
    }

    #[test]
    fn validate_rejects_zero_log_interval() {
        let config = small_config().with_log_interval(0);

        assert!(matches!(config.validate(), Err(DigitError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_gamma_above_one() {
        let config = small_config().with_gamma(1.5);

        assert!(matches!(config.validate(), Err(DigitError::InvalidConfig(_))));
    }

    #[test]
    fn dry_run_stops_after_first_logged_batch() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config().with_dry_run(true);

        let (_, report) = train::<TestAutodiffBackend, _, _>(
            &config,
            Default::default(),
            dataset(8),
            dataset(3),
            &dir.path().join("model"),
        )
        .unwrap();

        assert_eq!(report.epochs.len(), 1);
        let epoch = &report.epochs[0];
        assert_eq!(epoch.steps, 1);
        assert_eq!(epoch.progress.len(), 1);
        assert_eq!(epoch.progress[0].batch, 0);
        assert_eq!(epoch.progress[0].items_seen, 0);
        assert_eq!(epoch.evaluation.num_items, 3);
        assert!(!checkpoint::checkpoint_file(&dir.path().join("model")).exists());
    }

    #[test]
    fn full_epochs_log_every_interval_and_decay_learning_rate() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config()
            .with_epochs(2)
            .with_log_interval(2)
            .with_num_workers(1);

        let (_, report) = train::<TestAutodiffBackend, _, _>(
            &config,
            Default::default(),
            dataset(6),
            dataset(4),
            &dir.path().join("model"),
        )
        .unwrap();

        let rates = report
            .epochs
            .iter()
            .map(|epoch| epoch.learning_rate)
            .collect::<Vec<_>>();
        assert_eq!(rates.len(), 2);
        assert!((rates[0] - 1.0).abs() < 1e-12);
        assert!((rates[1] - 0.7).abs() < 1e-12);

        for epoch in report.epochs.iter() {
            assert_eq!(epoch.steps, 3);
            let batches = epoch.progress.iter().map(|p| p.batch).collect::<Vec<_>>();
            assert_eq!(batches, vec![0, 2]);
            assert_eq!(epoch.progress[1].items_seen, 4);
            assert_eq!(epoch.progress[1].num_items, 6);
            assert!((epoch.progress[1].percent - 200.0 / 3.0).abs() < 1e-9);
            assert!(epoch.progress.iter().all(|p| p.loss.is_finite()));
            assert_eq!(epoch.evaluation.num_items, 4);
        }
        assert_eq!(report.final_evaluation(), Some(&report.epochs[1].evaluation));
    }

    #[test]
    fn save_model_writes_checkpoint_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");
        let config = small_config().with_dry_run(true).with_save_model(true);

        let (model, _) = train::<TestAutodiffBackend, _, _>(
            &config,
            Default::default(),
            dataset(4),
            dataset(2),
            &path,
        )
        .unwrap();

        let restored = checkpoint::load::<TestAutodiffBackend>(&path, &Default::default()).unwrap();
        assert_eq!(restored.param_shapes(), model.param_shapes());

        let saved = TrainingConfig::load(path.with_extension("json")).unwrap();
        assert!(saved.save_model);
        assert_eq!(saved.batch_size, 2);
    }
}
