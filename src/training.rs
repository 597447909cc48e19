use crate::checkpoint::{self, Checkpointer};
use crate::config::ImgConvNetsConfig;
use crate::data::{ImageBatch, ImageBatcher, ImageDataset, WrappingBatches};
use crate::error::Error;
use crate::model::ImgConvNet;
use crate::optim::{ImgConvNetOptim, init_optim, optimizer_config};
use crate::schedule::LearningRateSchedule;
use burn::data::dataloader::{Progress, batcher::Batcher};
use burn::data::dataset::Dataset;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::train::ClassificationOutput;
use burn::train::metric::{AccuracyMetric, Adaptor, LossMetric, Metric, MetricMetadata, Numeric};
use std::path::{Path, PathBuf};

#[derive(Config, Debug)]
pub struct TrainingConfig {
    pub optimizer: AdamConfig,
    /// Rate of every epoch when `lr_adaptive` is off.
    #[config(default = 1e-4)]
    pub learning_rate: f64,
    /// Derive each epoch's rate from the previous epoch's accuracy, ignoring `learning_rate`.
    #[config(default = true)]
    pub lr_adaptive: bool,
    #[config(default = 32)]
    pub batch_size: usize,
    #[config(default = 100)]
    pub num_epochs: usize,
    #[config(default = 0)]
    pub seed: u64,
    /// Mean epoch accuracy (%) from which improving epochs are checkpointed.
    #[config(default = 99.68)]
    pub checkpoint_accuracy: f64,
    /// Mean epoch accuracy (%) that ends the training early.
    #[config(default = 99.99)]
    pub stop_accuracy: f64,
    /// Number of checkpoints kept on disk, 0 keeping all of them.
    #[config(default = 10)]
    pub max_to_keep: usize,
    /// Continue from the result checkpoint when it already exists.
    #[config(default = false)]
    pub resume: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::new(optimizer_config())
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.num_epochs == 0 {
            return Err(Error::InvalidConfig("num_epochs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn schedule(&self) -> LearningRateSchedule {
        LearningRateSchedule::new(self.learning_rate, self.lr_adaptive)
    }

    /// Whether an epoch of `mean_accuracy` gets a numbered checkpoint, given
    /// the mean accuracy of the epoch before it (0 for the first epoch).
    pub fn should_checkpoint(&self, mean_accuracy: f64, last_accuracy: f64) -> bool {
        mean_accuracy >= self.checkpoint_accuracy && mean_accuracy > last_accuracy
    }

    /// Whether an epoch of `mean_accuracy` ends the training.
    pub fn should_stop(&self, mean_accuracy: f64) -> bool {
        mean_accuracy >= self.stop_accuracy
    }
}

/// Summary of one training epoch. Accuracies are in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    pub learning_rate: f64,
    pub mean_loss: f64,
    pub min_accuracy: f64,
    pub mean_accuracy: f64,
    pub max_accuracy: f64,
    /// Checkpoint written because the epoch improved past the threshold.
    pub checkpoint: Option<PathBuf>,
}

impl EpochStats {
    /// Aggregates the per-step losses and accuracies (in percent) of an epoch.
    pub fn new(epoch: usize, learning_rate: f64, losses: &[f64], accuracies: &[f64]) -> Self {
        let mean = |values: &[f64]| values.iter().sum::<f64>() / values.len().max(1) as f64;
        Self {
            epoch,
            learning_rate,
            mean_loss: mean(losses),
            min_accuracy: accuracies.iter().copied().fold(f64::INFINITY, f64::min),
            mean_accuracy: mean(accuracies),
            max_accuracy: accuracies.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            checkpoint: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs: Vec<EpochStats>,
    /// Whether the accuracy reached the stop threshold before the last epoch.
    pub stopped_early: bool,
    /// The final, unnumbered checkpoint.
    pub checkpoint: PathBuf,
}

/// Loss and accuracy (in percent) over a whole dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
}

/// Loss and accuracy metrics of one pass over a dataset.
struct PassMetrics<B: Backend> {
    meta: MetricMetadata,
    loss: LossMetric<B>,
    accuracy: AccuracyMetric<B>,
}

impl<B: Backend> PassMetrics<B> {
    fn new(epoch: usize, epoch_total: usize, num_items: usize, lr: Option<f64>) -> Self {
        Self {
            meta: MetricMetadata {
                progress: Progress::new(0, num_items),
                epoch,
                epoch_total,
                iteration: 0,
                lr,
            },
            loss: LossMetric::<B>::new(),
            accuracy: AccuracyMetric::<B>::new(),
        }
    }

    /// Records one batch and returns its loss and accuracy (%).
    fn update(&mut self, output: &ClassificationOutput<B>) -> (f64, f64) {
        let [batch_size] = output.targets.dims();
        self.meta.iteration += 1;
        self.meta.progress.items_processed += batch_size;
        self.accuracy.update(&output.adapt(), &self.meta);
        self.loss.update(&output.adapt(), &self.meta);
        (self.loss.value().current(), self.accuracy.value().current())
    }

    /// Loss and accuracy (%) over every recorded item.
    fn running(&self) -> (f64, f64) {
        (
            self.loss.running_value().current(),
            self.accuracy.running_value().current(),
        )
    }
}

/// A classifier of fixed architecture together with how to train it.
#[derive(Debug, Clone)]
pub struct ImgConvNets {
    pub model: ImgConvNetsConfig,
    pub training: TrainingConfig,
}

impl ImgConvNets {
    pub fn new(model: ImgConvNetsConfig, training: TrainingConfig) -> Self {
        Self { model, training }
    }

    /// Trains the classifier on `dataset` and checkpoints it into `train_dir`.
    ///
    /// The dataset is shuffled once; each epoch then walks it in fixed-size,
    /// wrapping batches. Epochs whose mean accuracy improves past
    /// `checkpoint_accuracy` are saved as `{result_file}-{epoch}`. The model
    /// reached when training ends is saved as `{result_file}`.
    pub fn train<AutoB: AutodiffBackend>(
        &self,
        dataset: ImageDataset,
        train_dir: &Path,
        result_file: &str,
        device: &AutoB::Device,
    ) -> crate::error::Result<TrainingReport> {
        self.model.validate()?;
        self.training.validate()?;
        let expected = self.model.feature_count();
        if dataset.feature_count() != expected {
            return Err(Error::FeatureMismatch {
                expected,
                found: dataset.feature_count(),
            });
        }
        dataset.check_labels(self.model.class_count)?;

        let config = &self.training;
        AutoB::seed(device, config.seed);

        let train_set = dataset.permuted(config.seed);
        let batches = WrappingBatches::new(train_set.len(), config.batch_size);
        let batcher = ImageBatcher::default();
        let mut checkpointer = Checkpointer::new(train_dir, result_file, config.max_to_keep)?;
        let (mut model, mut optim) =
            self.init_or_resume::<AutoB>(train_dir, result_file, device)?;
        let schedule = config.schedule();

        tracing::info!(
            model = %self.model.model,
            scope = %self.model.model_scope,
            items = train_set.len(),
            steps_per_epoch = batches.steps_per_epoch(),
            "starting training"
        );

        let mut epochs = Vec::with_capacity(config.num_epochs);
        let mut stopped_early = false;
        let mut last_accuracy = 0.0;
        for epoch in 1..config.num_epochs + 1 {
            let learning_rate = schedule.rate(last_accuracy);
            let steps = batches.steps_per_epoch();
            let mut losses = Vec::with_capacity(steps);
            let mut accuracies = Vec::with_capacity(steps);
            let mut metrics = PassMetrics::<AutoB>::new(
                epoch,
                config.num_epochs,
                steps * config.batch_size,
                Some(learning_rate),
            );

            for step in 0..steps {
                let batch: ImageBatch<AutoB> = batches.batch(&train_set, &batcher, step, device);
                let output = model.forward_classification(batch.images, batch.targets);
                let (loss, accuracy) = metrics.update(&output);
                losses.push(loss);
                accuracies.push(accuracy);

                let grads = output.loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(learning_rate, model, grads);
            }

            let mut stats = EpochStats::new(epoch, learning_rate, &losses, &accuracies);
            if config.should_checkpoint(stats.mean_accuracy, last_accuracy) {
                let path = checkpointer.save(&model, &optim, &self.model, Some(epoch))?;
                stats.checkpoint = Some(path);
            }

            tracing::info!(
                "Epoch {:3}/{} completed: learning_rate used = {:.6}, average loss = {:8.4}, \
                 and training accuracy min = {:6.2}%, mean = {:6.2}%, max = {:6.2}%",
                epoch,
                config.num_epochs,
                learning_rate,
                stats.mean_loss,
                stats.min_accuracy,
                stats.mean_accuracy,
                stats.max_accuracy,
            );

            let mean_accuracy = stats.mean_accuracy;
            epochs.push(stats);
            if config.should_stop(mean_accuracy) {
                stopped_early = epoch < config.num_epochs;
                tracing::info!(epoch, mean_accuracy, "stop accuracy reached");
                break;
            }
            last_accuracy = mean_accuracy;
        }

        let checkpoint = checkpointer.save(&model, &optim, &self.model, None)?;
        tracing::info!(?checkpoint, "training finished");

        Ok(TrainingReport {
            epochs,
            stopped_early,
            checkpoint,
        })
    }

    /// Fresh model and optimizer, or the ones stored under `result_file` when resuming.
    fn init_or_resume<AutoB: AutodiffBackend>(
        &self,
        train_dir: &Path,
        result_file: &str,
        device: &AutoB::Device,
    ) -> crate::error::Result<(ImgConvNet<AutoB>, ImgConvNetOptim<AutoB>)> {
        if self.training.resume && checkpoint::exists::<AutoB>(train_dir, result_file)? {
            let stored = checkpoint::load_config(train_dir, result_file)?;
            if stored.model != self.model.model
                || stored.img_height != self.model.img_height
                || stored.img_width != self.model.img_width
                || stored.class_count != self.model.class_count
            {
                return Err(Error::InvalidConfig(format!(
                    "cannot resume {result_file:?}: \
                     it holds a {} model for {}x{} images and {} classes",
                    stored.model, stored.img_height, stored.img_width, stored.class_count
                )));
            }
            tracing::info!(result_file, "resuming from checkpoint");
            let model =
                checkpoint::load_model::<AutoB>(train_dir, result_file, &self.model, device)?;
            let optim = checkpoint::load_optim::<AutoB>(
                train_dir,
                result_file,
                &self.training.optimizer,
                device,
            )?;
            return Ok((model, optim));
        }

        let model = self.model.init::<AutoB>(device)?;
        let optim = init_optim::<AutoB>(&self.training.optimizer);
        Ok((model, optim))
    }

    /// Mean loss and accuracy of `model` over `dataset`, in batches of `batch_size`.
    ///
    /// Run on a non-autodiff backend (or a `.valid()` model) so that dropout is off.
    pub fn evaluate<B: Backend>(
        &self,
        model: &ImgConvNet<B>,
        dataset: &ImageDataset,
        device: &B::Device,
    ) -> crate::error::Result<Evaluation> {
        self.training.validate()?;
        let expected = self.model.feature_count();
        if dataset.feature_count() != expected {
            return Err(Error::FeatureMismatch {
                expected,
                found: dataset.feature_count(),
            });
        }
        dataset.check_labels(self.model.class_count)?;

        let batcher = ImageBatcher::default();
        let total = dataset.len();
        let mut metrics = PassMetrics::<B>::new(1, 1, total, None);
        for start in (0..total).step_by(self.training.batch_size) {
            let end = (start + self.training.batch_size).min(total);
            let items: Vec<_> = (start..end).filter_map(|i| dataset.get(i)).collect();
            let batch: ImageBatch<B> = batcher.batch(items, device);
            let output = model.forward_classification(batch.images, batch.targets);
            metrics.update(&output);
        }

        let (loss, accuracy) = metrics.running();
        Ok(Evaluation { loss, accuracy })
    }
}
