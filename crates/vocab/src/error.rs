use thiserror::Error;

#[derive(Error, Debug)]
pub enum VocabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("special token missing from vocabulary: {0}")]
    MissingSpecial(String),
}

pub type Result<T> = std::result::Result<T, VocabError>;
