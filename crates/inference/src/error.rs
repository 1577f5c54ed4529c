use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tch tensor error: {0}")]
    Tch(#[from] tch::TchError),

    #[error("vocabulary error: {0}")]
    Vocab(#[from] vocab::VocabError),

    #[error("model configuration error: {0}")]
    Core(#[from] nlpkit_core::CoreError),

    #[error("decoder produced an empty logit vector")]
    EmptyLogits,

    #[error("no model weights found in {0}")]
    NoWeights(std::path::PathBuf),
}

pub type Result<T> = std::result::Result<T, InferError>;
