use tch::nn::{self, ModuleT, OptimizerConfig};
use tch::{Device, Tensor};

use nlpkit_core::Seq2SeqModel;

use crate::checkpoint::{CheckpointManager, TrainingState};
use crate::dataset::ParallelDataset;
use crate::error::{Result, TrainError};
use crate::metrics::{self, MetricHistory};
use crate::plot;
use crate::scheduler::{apply_rates, CosineWithRestarts};
use crate::TrainerConfig;

/// Full-batch node classification data: one feature matrix, a labeled
/// (trained) node subset and a held-out subset for evaluation.
pub struct GraphSplit {
    /// `[num_nodes, num_features]`, already on the training device.
    pub features: Tensor,
    pub train_idx: Vec<i64>,
    pub train_labels: Vec<i64>,
    pub test_idx: Vec<i64>,
    pub test_labels: Vec<i64>,
}

fn build_scheduler(config: &TrainerConfig, restored: Option<CosineWithRestarts>) -> CosineWithRestarts {
    match restored {
        Some(scheduler) => scheduler,
        None => CosineWithRestarts::new(vec![config.learning_rate], config.cycle_length)
            .eta_min(config.eta_min)
            .factor(config.cycle_factor),
    }
}

/// Epoch-loop driver for the graph-classification family. The model is
/// injected at construction; the driver owns checkpointing, metric
/// bookkeeping, the learning-rate schedule and plotting.
pub struct ClassifierTrainer<M: ModuleT> {
    config: TrainerConfig,
    model: M,
    optimizer: nn::Optimizer,
    scheduler: CosineWithRestarts,
    checkpoints: CheckpointManager,
    history: MetricHistory,
    vs: nn::VarStore,
    start_epoch: usize,
    best_metric: f64,
}

impl<M: ModuleT> ClassifierTrainer<M> {
    pub fn new(mut vs: nn::VarStore, model: M, config: TrainerConfig) -> Result<Self> {
        let config = config.clamped_cadences();
        let checkpoints = CheckpointManager::new(&config.data_dir, config.model_tag);
        let resume = checkpoints.resume(config.load_best, &mut vs)?;
        // The optimizer is built once, after device placement and the
        // resume lookup are both settled.
        let optimizer = nn::Adam::default().build(&vs, config.learning_rate)?;
        let scheduler = build_scheduler(&config, resume.scheduler);
        let history = MetricHistory::load_or_default(&config.data_dir, config.model_tag)?;

        Ok(Self {
            start_epoch: resume.start_epoch,
            best_metric: resume.best_metric,
            config,
            model,
            optimizer,
            scheduler,
            checkpoints,
            history,
            vs,
        })
    }

    pub fn start_epoch(&self) -> usize {
        self.start_epoch
    }

    pub fn best_metric(&self) -> f64 {
        self.best_metric
    }

    pub fn train(&mut self, data: &GraphSplit) -> Result<()> {
        let device = self.vs.device();
        let train_idx = Tensor::from_slice(&data.train_idx).to(device);
        let test_idx = Tensor::from_slice(&data.test_idx).to(device);
        let targets = Tensor::from_slice(&data.train_labels).to(device);

        log::info!(
            "training classifier from epoch {} to {}",
            self.start_epoch,
            self.config.epochs
        );
        for epoch in self.start_epoch..self.config.epochs {
            let logits = self.model.forward_t(&data.features, true);
            let selected = logits.index_select(0, &train_idx);
            let loss = selected.cross_entropy_for_logits(&targets);
            self.optimizer.backward_step(&loss);
            self.history.push_loss(loss.double_value(&[]));

            if epoch % self.config.eval_every == 0 {
                self.evaluate(epoch, data, &train_idx, &test_idx)?;
            }
            if epoch % self.config.save_every == 0 {
                self.history.flush()?;
                self.checkpoints
                    .save_latest(&self.vs, &self.state(epoch))?;
            }

            let rates = self.scheduler.step();
            apply_rates(&mut self.optimizer, &rates);
        }

        log::info!("finished training");
        self.history.flush_final()?;
        self.render_plots()
    }

    fn evaluate(
        &mut self,
        epoch: usize,
        data: &GraphSplit,
        train_idx: &Tensor,
        test_idx: &Tensor,
    ) -> Result<()> {
        let _guard = tch::no_grad_guard();
        let logits = self.model.forward_t(&data.features, false);

        let trained_pred = metrics::predicted_classes(&logits.index_select(0, train_idx))?;
        let trained_acc = metrics::class_accuracy(&trained_pred, &data.train_labels);
        let trained_scores = metrics::macro_scores(&trained_pred, &data.train_labels);
        self.history.push_trained(epoch, trained_acc);

        log::info!(
            "[epoch {}] loss {:.7}, trained acc {:.4} (recall {:.3}, precision {:.3}, f1 {:.3})",
            epoch,
            self.history.losses.last().copied().unwrap_or(f64::NAN),
            trained_acc,
            trained_scores.recall,
            trained_scores.precision,
            trained_scores.f1
        );

        if !data.test_idx.is_empty() {
            let eval_pred = metrics::predicted_classes(&logits.index_select(0, test_idx))?;
            let eval_acc = metrics::class_accuracy(&eval_pred, &data.test_labels);
            let eval_scores = metrics::macro_scores(&eval_pred, &data.test_labels);
            self.history.push_eval(epoch, eval_acc);
            log::info!(
                "[epoch {}] held-out acc {:.4} (recall {:.3}, precision {:.3}, f1 {:.3})",
                epoch,
                eval_acc,
                eval_scores.recall,
                eval_scores.precision,
                eval_scores.f1
            );
        }

        if trained_acc > self.best_metric {
            self.best_metric = trained_acc;
            self.checkpoints.save_best(&self.vs, &self.state(epoch))?;
        }
        Ok(())
    }

    fn state(&self, epoch: usize) -> TrainingState {
        TrainingState {
            epoch: epoch + 1,
            best_metric: self.best_metric,
            scheduler: self.scheduler.clone(),
        }
    }

    fn render_plots(&self) -> Result<()> {
        if !self.config.plots {
            return Ok(());
        }
        let dir = std::path::Path::new(&self.config.data_dir);
        let tag = self.config.model_tag;

        let losses: Vec<(f64, f64)> = self
            .history
            .losses
            .iter()
            .enumerate()
            .map(|(i, &l)| (i as f64, l))
            .collect();
        plot::scatter_plot(
            &dir.join(format!("loss_vs_epoch_{}.png", tag)),
            "Loss vs Epoch",
            "Loss",
            &losses,
        )?;

        let trained = as_points(&self.history.trained_accuracy);
        plot::scatter_plot(
            &dir.join(format!("trained_accuracy_vs_epoch_{}.png", tag)),
            "Accuracy (trained nodes) vs Epoch",
            "Accuracy",
            &trained,
        )?;

        if !self.history.eval_accuracy.is_empty() {
            let held_out = as_points(&self.history.eval_accuracy);
            plot::scatter_plot(
                &dir.join(format!("test_accuracy_vs_epoch_{}.png", tag)),
                "Accuracy (held-out nodes) vs Epoch",
                "Accuracy",
                &held_out,
            )?;
            plot::combined_accuracy_plot(
                &dir.join(format!("combined_accuracy_vs_epoch_{}.png", tag)),
                &trained,
                &held_out,
            )?;
        }
        Ok(())
    }
}

/// Batch-sequential driver for the sequence-to-sequence families
/// (speech-to-text, summarization): teacher-forced forward, loss and
/// optimizer step per batch, scheduler step per epoch.
pub struct Seq2SeqTrainer<M: Seq2SeqModel> {
    config: TrainerConfig,
    model: M,
    optimizer: nn::Optimizer,
    scheduler: CosineWithRestarts,
    checkpoints: CheckpointManager,
    history: MetricHistory,
    vs: nn::VarStore,
    pad_id: i64,
    start_epoch: usize,
    best_metric: f64,
}

impl<M: Seq2SeqModel> Seq2SeqTrainer<M> {
    pub fn new(mut vs: nn::VarStore, model: M, pad_id: i64, config: TrainerConfig) -> Result<Self> {
        let config = config.clamped_cadences();
        let checkpoints = CheckpointManager::new(&config.data_dir, config.model_tag);
        let resume = checkpoints.resume(config.load_best, &mut vs)?;
        let optimizer = nn::Adam::default().build(&vs, config.learning_rate)?;
        let scheduler = build_scheduler(&config, resume.scheduler);
        let history = MetricHistory::load_or_default(&config.data_dir, config.model_tag)?;

        Ok(Self {
            start_epoch: resume.start_epoch,
            best_metric: resume.best_metric,
            config,
            model,
            optimizer,
            scheduler,
            checkpoints,
            history,
            vs,
            pad_id,
        })
    }

    pub fn start_epoch(&self) -> usize {
        self.start_epoch
    }

    pub fn train(&mut self, dataset: &mut ParallelDataset) -> Result<()> {
        if dataset.is_empty() {
            return Err(TrainError::EmptyDataset);
        }
        let device = self.vs.device();

        log::info!(
            "training seq2seq from epoch {} to {}",
            self.start_epoch,
            self.config.epochs
        );
        for epoch in self.start_epoch..self.config.epochs {
            let batches = dataset.shuffled_batches(self.config.batch_size, device);
            let mut epoch_loss = 0.0;
            let mut epoch_acc = 0.0;
            let mut seen = 0usize;

            for batch in &batches {
                let trg_len = batch.trg.size()[1];
                if trg_len < 2 {
                    continue;
                }
                let trg_input = batch.trg.narrow(1, 0, trg_len - 1);
                let labels = batch.trg.narrow(1, 1, trg_len - 1);

                let logits = self.model.forward(&batch.src, &trg_input, true);
                let (b, t, v) = logits.size3()?;
                let logits_flat = logits.view([b * t, v]);
                let labels_flat = labels.contiguous().view([b * t]);

                let loss = logits_flat.cross_entropy_loss::<Tensor>(
                    &labels_flat,
                    None,
                    tch::Reduction::Mean,
                    self.pad_id,
                    0.0,
                );
                self.optimizer.backward_step(&loss);

                epoch_loss += loss.double_value(&[]);
                epoch_acc += metrics::accuracy(&logits_flat, &labels_flat, self.pad_id);
                seen += 1;
            }

            if seen == 0 {
                return Err(TrainError::EmptyDataset);
            }
            let mean_loss = epoch_loss / seen as f64;
            let mean_acc = epoch_acc / seen as f64;
            self.history.push_loss(mean_loss);
            self.history.push_trained(epoch, mean_acc);
            log::info!(
                "[epoch {}] loss {:.7}, token accuracy {:.4}",
                epoch,
                mean_loss,
                mean_acc
            );

            if mean_acc > self.best_metric {
                self.best_metric = mean_acc;
                self.checkpoints.save_best(&self.vs, &self.state(epoch))?;
            }
            if epoch % self.config.save_every == 0 {
                self.history.flush()?;
                self.checkpoints
                    .save_latest(&self.vs, &self.state(epoch))?;
            }

            let rates = self.scheduler.step();
            apply_rates(&mut self.optimizer, &rates);
        }

        log::info!("finished training");
        self.history.flush_final()?;
        self.render_plots()
    }

    fn state(&self, epoch: usize) -> TrainingState {
        TrainingState {
            epoch: epoch + 1,
            best_metric: self.best_metric,
            scheduler: self.scheduler.clone(),
        }
    }

    fn render_plots(&self) -> Result<()> {
        if !self.config.plots {
            return Ok(());
        }
        let dir = std::path::Path::new(&self.config.data_dir);
        let tag = self.config.model_tag;

        let losses: Vec<(f64, f64)> = self
            .history
            .losses
            .iter()
            .enumerate()
            .map(|(i, &l)| (i as f64, l))
            .collect();
        plot::scatter_plot(
            &dir.join(format!("loss_vs_epoch_{}.png", tag)),
            "Loss vs Epoch",
            "Loss",
            &losses,
        )?;
        plot::scatter_plot(
            &dir.join(format!("accuracy_vs_epoch_{}.png", tag)),
            "Token Accuracy vs Epoch",
            "Accuracy",
            &as_points(&self.history.trained_accuracy),
        )
    }
}

fn as_points(series: &[(usize, f64)]) -> Vec<(f64, f64)> {
    series.iter().map(|&(e, v)| (e as f64, v)).collect()
}
