pub mod checkpoint;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod plot;
pub mod scheduler;
pub mod train;

pub use checkpoint::{CheckpointManager, Resume, TrainingState};
pub use dataset::{ParallelDataset, Seq2SeqBatch};
pub use error::TrainError;
pub use metrics::{MacroScores, MetricHistory};
pub use scheduler::CosineWithRestarts;
pub use train::{ClassifierTrainer, GraphSplit, Seq2SeqTrainer};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    /// Steps in the first scheduler cycle (T_max).
    pub cycle_length: usize,
    pub eta_min: f64,
    /// Cycle-length factor applied at each scheduler restart.
    pub cycle_factor: f64,
    /// Evaluation cadence in epochs (classifier driver).
    pub eval_every: usize,
    /// Latest-checkpoint and history-flush cadence in epochs.
    pub save_every: usize,
    pub data_dir: String,
    /// Integer tag distinguishing model variants in file names.
    pub model_tag: usize,
    /// Prefer the best checkpoint over the latest one when resuming.
    pub load_best: bool,
    /// Sequence length cap applied when encoding the corpus.
    pub max_seq_len: usize,
    /// Render PNG plots at run completion.
    pub plots: bool,
}

impl TrainerConfig {
    /// The epoch loops take `epoch % cadence`; a zero cadence from a
    /// config file means "every epoch", not a division by zero.
    pub fn clamped_cadences(mut self) -> Self {
        self.eval_every = self.eval_every.max(1);
        self.save_every = self.save_every.max(1);
        self
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            epochs: 500,
            batch_size: 32,
            cycle_length: 10,
            eta_min: 0.0,
            cycle_factor: 1.0,
            eval_every: 50,
            save_every: 100,
            data_dir: "./data".to_string(),
            model_tag: 0,
            load_best: false,
            max_seq_len: 200,
            plots: true,
        }
    }
}
