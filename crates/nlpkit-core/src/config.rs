use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// What the encoder consumes: token ids (summarization, translation) or
/// float feature frames (speech). Chosen once at model construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Token-id source; the value is the source vocabulary size.
    Tokens { vocab_size: i64 },
    /// Dense frame source; the value is the per-frame feature dimension.
    Frames { feature_dim: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seq2SeqConfig {
    pub source: SourceKind,
    /// Size of the target vocabulary (decoder output dimension).
    pub vocab_size: i64,
    /// Dimension of embeddings and internal states.
    pub d_model: i64,
    /// Maximum decoder sequence length.
    pub max_seq_len: i64,
    pub dropout: f64,
    /// Padding token id, ignored by loss and accuracy.
    pub pad_id: i64,
}

impl Default for Seq2SeqConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Tokens { vocab_size: 8000 },
            vocab_size: 8000,
            d_model: 512,
            max_seq_len: 200,
            dropout: 0.1,
            pad_id: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcnConfig {
    pub hidden_size: i64,
    pub num_classes: i64,
    pub dropout: f64,
}

impl Default for GcnConfig {
    fn default() -> Self {
        Self {
            hidden_size: 330,
            num_classes: 66,
            dropout: 0.5,
        }
    }
}

/// Loads any serde-deserializable config from a YAML file.
pub fn load_yaml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Loads any serde-deserializable config from a JSON file.
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq2seq_config_yaml_round_trip() {
        let config = Seq2SeqConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Seq2SeqConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.d_model, config.d_model);
        assert_eq!(back.pad_id, 1);
        match back.source {
            SourceKind::Tokens { vocab_size } => assert_eq!(vocab_size, 8000),
            _ => panic!("expected token source"),
        }
    }
}
