use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tch::{Device, Kind, Tensor};

use crate::error::{Result, TrainError};

/// Macro-averaged classification scores: unweighted means of the
/// per-class values, over the classes observed in the evaluated batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroScores {
    pub recall: f64,
    pub precision: f64,
    pub f1: f64,
}

impl MacroScores {
    fn zero() -> Self {
        Self {
            recall: 0.0,
            precision: 0.0,
            f1: 0.0,
        }
    }
}

pub fn macro_scores(predicted: &[i64], expected: &[i64]) -> MacroScores {
    if predicted.is_empty() || predicted.len() != expected.len() {
        return MacroScores::zero();
    }

    let classes: BTreeSet<i64> = predicted.iter().chain(expected.iter()).copied().collect();
    let mut recall_sum = 0.0;
    let mut precision_sum = 0.0;
    let mut f1_sum = 0.0;

    for &class in &classes {
        let mut tp = 0.0;
        let mut fp = 0.0;
        let mut fn_ = 0.0;
        for (&p, &e) in predicted.iter().zip(expected.iter()) {
            match (p == class, e == class) {
                (true, true) => tp += 1.0,
                (true, false) => fp += 1.0,
                (false, true) => fn_ += 1.0,
                (false, false) => {}
            }
        }
        let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
        let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let f1 = if recall + precision > 0.0 {
            2.0 * recall * precision / (recall + precision)
        } else {
            0.0
        };
        recall_sum += recall;
        precision_sum += precision;
        f1_sum += f1;
    }

    let n = classes.len() as f64;
    MacroScores {
        recall: recall_sum / n,
        precision: precision_sum / n,
        f1: f1_sum / n,
    }
}

/// Fraction of matching positions between two label sequences.
pub fn class_accuracy(predicted: &[i64], expected: &[i64]) -> f64 {
    if predicted.is_empty() || predicted.len() != expected.len() {
        return 0.0;
    }
    let matching = predicted
        .iter()
        .zip(expected.iter())
        .filter(|(p, e)| p == e)
        .count();
    matching as f64 / predicted.len() as f64
}

/// Token accuracy over logits `[N, C]` against labels `[N]`, ignoring
/// positions whose label is the padding id.
pub fn accuracy(logits: &Tensor, labels: &Tensor, pad_id: i64) -> f64 {
    let _guard = tch::no_grad_guard();
    let mask = labels.ne(pad_id);
    let total = mask.sum(Kind::Float).double_value(&[]);
    if total == 0.0 {
        return 0.0;
    }
    let predictions = logits.argmax(-1, false);
    let correct = predictions
        .eq_tensor(labels)
        .logical_and(&mask)
        .sum(Kind::Float)
        .double_value(&[]);
    correct / total
}

/// Argmax class per row of a `[N, C]` logit tensor, as a host vector.
pub fn predicted_classes(logits: &Tensor) -> Result<Vec<i64>> {
    let classes = logits.argmax(-1, false).to_device(Device::Cpu);
    Ok(Vec::<i64>::try_from(&classes)?)
}

/// Per-epoch metric buffers for one model variant, flushed to JSON on
/// a fixed cadence and once more (with a `_final` suffix) at run end.
pub struct MetricHistory {
    dir: PathBuf,
    tag: usize,
    pub losses: Vec<f64>,
    pub trained_accuracy: Vec<(usize, f64)>,
    pub eval_accuracy: Vec<(usize, f64)>,
}

impl MetricHistory {
    /// Restores previously flushed buffers; missing files mean a fresh
    /// run (empty buffers), unreadable files are surfaced.
    pub fn load_or_default<P: Into<PathBuf>>(dir: P, tag: usize) -> Result<Self> {
        let dir = dir.into();
        let mut history = Self {
            losses: Vec::new(),
            trained_accuracy: Vec::new(),
            eval_accuracy: Vec::new(),
            dir,
            tag,
        };

        let losses_path = history.path("losses_per_epoch", false);
        if losses_path.is_file() {
            history.losses = read_series(&losses_path)?;
            history.trained_accuracy =
                read_or_empty(&history.path("trained_accuracy_per_epoch", false))?;
            history.eval_accuracy = read_or_empty(&history.path("test_accuracy_per_epoch", false))?;
            log::info!(
                "restored metric history for model {} ({} epochs of loss)",
                tag,
                history.losses.len()
            );
        } else {
            log::info!("no metric history for model {}, starting empty", tag);
        }
        Ok(history)
    }

    fn path(&self, stem: &str, final_: bool) -> PathBuf {
        let suffix = if final_ { "_final" } else { "" };
        self.dir
            .join(format!("{}_{}{}.json", stem, self.tag, suffix))
    }

    pub fn push_loss(&mut self, loss: f64) {
        self.losses.push(loss);
    }

    pub fn push_trained(&mut self, epoch: usize, accuracy: f64) {
        self.trained_accuracy.push((epoch, accuracy));
    }

    pub fn push_eval(&mut self, epoch: usize, accuracy: f64) {
        self.eval_accuracy.push((epoch, accuracy));
    }

    /// Cadence flush during training.
    pub fn flush(&self) -> Result<()> {
        self.write_all(false)
    }

    /// End-of-run flush with the `_final` suffix.
    pub fn flush_final(&self) -> Result<()> {
        self.write_all(true)
    }

    fn write_all(&self, final_: bool) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        write_series(&self.path("losses_per_epoch", final_), &self.losses)?;
        write_series(
            &self.path("trained_accuracy_per_epoch", final_),
            &self.trained_accuracy,
        )?;
        write_series(
            &self.path("test_accuracy_per_epoch", final_),
            &self.eval_accuracy,
        )?;
        Ok(())
    }
}

fn write_series<T: Serialize>(path: &Path, series: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), series)?;
    Ok(())
}

fn read_series<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|source| TrainError::CorruptHistory {
        path: path.to_path_buf(),
        source,
    })
}

fn read_or_empty<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if path.is_file() {
        read_series(path)
    } else {
        Ok(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_two_class_confusion() {
        // One hit and one miss per class: recall = precision = f1 = 0.5.
        let predicted = [0, 0, 1, 1];
        let expected = [0, 1, 0, 1];
        let scores = macro_scores(&predicted, &expected);
        assert!((scores.recall - 0.5).abs() < 1e-12);
        assert!((scores.precision - 0.5).abs() < 1e-12);
        assert!((scores.f1 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn three_class_hand_computed() {
        let predicted = [0, 1, 1];
        let expected = [0, 1, 2];
        let scores = macro_scores(&predicted, &expected);
        // class 0: p=r=f1=1; class 1: p=0.5, r=1, f1=2/3; class 2: all 0.
        assert!((scores.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((scores.precision - 0.5).abs() < 1e-12);
        assert!((scores.f1 - (1.0 + 2.0 / 3.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(macro_scores(&[], &[]), MacroScores::zero());
    }

    #[test]
    fn perfect_predictions_score_one() {
        let labels = [0, 1, 2, 1, 0];
        let scores = macro_scores(&labels, &labels);
        assert!((scores.f1 - 1.0).abs() < 1e-12);
        assert_eq!(class_accuracy(&labels, &labels), 1.0);
    }

    #[test]
    fn accuracy_ignores_padding_positions() {
        let pad = 1;
        // Three positions; the middle one is padding.
        let logits = Tensor::from_slice(&[
            0.1f32, 0.0, 0.9, // predicts 2
            0.9, 0.0, 0.1, // predicts 0 (ignored: label is pad)
            0.9, 0.0, 0.1, // predicts 0
        ])
        .view([3, 3]);
        let labels = Tensor::from_slice(&[2i64, pad, 2]);
        let acc = accuracy(&logits, &labels, pad);
        assert!((acc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn history_flushes_and_restores() {
        let dir = tempfile::tempdir().unwrap();

        let mut history = MetricHistory::load_or_default(dir.path(), 2).unwrap();
        assert!(history.losses.is_empty());

        history.push_loss(1.5);
        history.push_loss(1.2);
        history.push_trained(0, 0.4);
        history.push_eval(0, 0.3);
        history.flush().unwrap();

        let restored = MetricHistory::load_or_default(dir.path(), 2).unwrap();
        assert_eq!(restored.losses, vec![1.5, 1.2]);
        assert_eq!(restored.trained_accuracy, vec![(0, 0.4)]);
        assert_eq!(restored.eval_accuracy, vec![(0, 0.3)]);

        history.flush_final().unwrap();
        assert!(dir.path().join("losses_per_epoch_2_final.json").is_file());
        assert!(dir
            .path()
            .join("test_accuracy_per_epoch_2_final.json")
            .is_file());
    }

    #[test]
    fn corrupt_history_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("losses_per_epoch_0.json"), "{oops").unwrap();
        match MetricHistory::load_or_default(dir.path(), 0) {
            Err(TrainError::CorruptHistory { .. }) => {}
            _ => panic!("expected CorruptHistory"),
        }
    }
}
