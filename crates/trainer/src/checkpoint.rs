use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tch::nn;

use crate::error::{Result, TrainError};
use crate::scheduler::CosineWithRestarts;

/// Everything a resumed run needs besides the model weights. Persisted
/// as a JSON sidecar next to the `.ot` weight file; the optimizer is
/// rebuilt from the restored weights on resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingState {
    /// Epoch to resume from (the epoch after the one that was saved).
    pub epoch: usize,
    pub best_metric: f64,
    pub scheduler: CosineWithRestarts,
}

/// Outcome of the resume lookup at process start.
pub struct Resume {
    pub start_epoch: usize,
    pub best_metric: f64,
    pub scheduler: Option<CosineWithRestarts>,
    pub loaded: bool,
}

impl Resume {
    fn fresh() -> Self {
        Self {
            start_epoch: 0,
            best_metric: 0.0,
            scheduler: None,
            loaded: false,
        }
    }
}

/// Persists and restores checkpoints for one model variant, identified
/// by an integer tag. Two checkpoint kinds exist: "latest" (written on
/// a fixed epoch cadence) and "best" (written when the evaluation
/// metric improves).
pub struct CheckpointManager {
    dir: PathBuf,
    tag: usize,
}

impl CheckpointManager {
    pub fn new<P: Into<PathBuf>>(dir: P, tag: usize) -> Self {
        Self {
            dir: dir.into(),
            tag,
        }
    }

    pub fn latest_weights(&self) -> PathBuf {
        self.dir.join(format!("checkpoint_{}.ot", self.tag))
    }

    pub fn latest_state(&self) -> PathBuf {
        self.dir.join(format!("checkpoint_{}.json", self.tag))
    }

    pub fn best_weights(&self) -> PathBuf {
        self.dir.join(format!("model_best_{}.ot", self.tag))
    }

    pub fn best_state(&self) -> PathBuf {
        self.dir.join(format!("model_best_{}.json", self.tag))
    }

    /// Resume lookup: the best checkpoint when `load_best` is set and
    /// one exists, else the latest checkpoint, else a fresh run.
    ///
    /// A missing checkpoint is not an error. A checkpoint that is
    /// present but unreadable is: silently restarting over a corrupt
    /// file would discard training the caller believes is saved.
    pub fn resume(&self, load_best: bool, vs: &mut nn::VarStore) -> Result<Resume> {
        let (weights, state_path, label) =
            if load_best && self.best_weights().is_file() && self.best_state().is_file() {
                (self.best_weights(), self.best_state(), "best")
            } else if self.latest_weights().is_file() && self.latest_state().is_file() {
                (self.latest_weights(), self.latest_state(), "latest")
            } else {
                log::info!("no checkpoint for model {}, starting fresh", self.tag);
                return Ok(Resume::fresh());
            };

        let state = read_state(&state_path)?;
        vs.load(&weights).map_err(|source| TrainError::CorruptWeights {
            path: weights.clone(),
            source,
        })?;

        log::info!(
            "loaded {} checkpoint for model {}: epoch {}, best {:.4}",
            label,
            self.tag,
            state.epoch,
            state.best_metric
        );
        Ok(Resume {
            start_epoch: state.epoch,
            best_metric: state.best_metric,
            scheduler: Some(state.scheduler),
            loaded: true,
        })
    }

    pub fn save_latest(&self, vs: &nn::VarStore, state: &TrainingState) -> Result<()> {
        self.save(&self.latest_weights(), &self.latest_state(), vs, state)
    }

    pub fn save_best(&self, vs: &nn::VarStore, state: &TrainingState) -> Result<()> {
        self.save(&self.best_weights(), &self.best_state(), vs, state)
    }

    fn save(
        &self,
        weights: &Path,
        state_path: &Path,
        vs: &nn::VarStore,
        state: &TrainingState,
    ) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        vs.save(weights)?;
        let file = File::create(state_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), state)?;
        Ok(())
    }
}

fn read_state(path: &Path) -> Result<TrainingState> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|source| TrainError::CorruptState {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::Init, Device};

    fn var_store_with_weight() -> nn::VarStore {
        let vs = nn::VarStore::new(Device::Cpu);
        let _w = vs.root().var("w", &[4], Init::Const(0.5));
        vs
    }

    fn state(epoch: usize, best: f64) -> TrainingState {
        TrainingState {
            epoch,
            best_metric: best,
            scheduler: CosineWithRestarts::new(vec![0.001], 10),
        }
    }

    #[test]
    fn missing_checkpoint_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 0);
        let mut vs = var_store_with_weight();

        let resume = manager.resume(false, &mut vs).unwrap();
        assert!(!resume.loaded);
        assert_eq!(resume.start_epoch, 0);
        assert_eq!(resume.best_metric, 0.0);
        assert!(resume.scheduler.is_none());
    }

    #[test]
    fn resume_restores_epoch_and_best_metric() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 3);

        let vs = var_store_with_weight();
        manager.save_latest(&vs, &state(10, 0.5)).unwrap();

        let mut fresh_vs = var_store_with_weight();
        let resume = manager.resume(false, &mut fresh_vs).unwrap();
        assert!(resume.loaded);
        assert_eq!(resume.start_epoch, 10);
        assert_eq!(resume.best_metric, 0.5);
        assert!(resume.scheduler.is_some());
    }

    #[test]
    fn best_checkpoint_wins_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 0);

        let vs = var_store_with_weight();
        manager.save_latest(&vs, &state(20, 0.4)).unwrap();
        manager.save_best(&vs, &state(12, 0.6)).unwrap();

        let mut target = var_store_with_weight();
        let resume = manager.resume(true, &mut target).unwrap();
        assert_eq!(resume.start_epoch, 12);
        assert_eq!(resume.best_metric, 0.6);

        // Without load_best the latest checkpoint is preferred.
        let resume = manager.resume(false, &mut target).unwrap();
        assert_eq!(resume.start_epoch, 20);
    }

    #[test]
    fn corrupt_sidecar_is_an_error_not_a_fresh_run() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 0);

        let vs = var_store_with_weight();
        manager.save_latest(&vs, &state(5, 0.1)).unwrap();
        std::fs::write(manager.latest_state(), "not json at all").unwrap();

        let mut target = var_store_with_weight();
        match manager.resume(false, &mut target) {
            Err(TrainError::CorruptState { .. }) => {}
            other => panic!("expected CorruptState, got {:?}", other.map(|r| r.loaded)),
        }
    }

    #[test]
    fn corrupt_weights_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path(), 0);

        let vs = var_store_with_weight();
        manager.save_latest(&vs, &state(5, 0.1)).unwrap();
        std::fs::write(manager.latest_weights(), b"garbage").unwrap();

        let mut target = var_store_with_weight();
        match manager.resume(false, &mut target) {
            Err(TrainError::CorruptWeights { .. }) => {}
            other => panic!("expected CorruptWeights, got {:?}", other.map(|r| r.loaded)),
        }
    }
}
