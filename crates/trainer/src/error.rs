use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tch tensor error: {0}")]
    Tch(#[from] tch::TchError),

    #[error("vocabulary error: {0}")]
    Vocab(#[from] vocab::VocabError),

    #[error("corrupt checkpoint state {path}: {source}")]
    CorruptState {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("corrupt checkpoint weights {path}: {source}")]
    CorruptWeights {
        path: PathBuf,
        source: tch::TchError,
    },

    #[error("corrupt metric history {path}: {source}")]
    CorruptHistory {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("dataset produced no usable batches")]
    EmptyDataset,

    #[error("plot rendering error: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, TrainError>;
