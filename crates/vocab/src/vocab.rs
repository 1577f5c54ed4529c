use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{Result, VocabError};

pub const UNK_TOKEN: &str = "<unk>";
pub const PAD_TOKEN: &str = "<pad>";
pub const SOS_TOKEN: &str = "<sos>";
pub const EOS_TOKEN: &str = "<eos>";

/// Padding id is fixed at 1; the loss and accuracy computations ignore
/// this index.
pub const PAD_ID: i64 = 1;

/// Token-to-id mapping with its reverse, loaded read-only by the
/// drivers. The JSON artifact stores only the forward map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocab {
    pub token_to_id: HashMap<String, i64>,
    pub id_to_token: HashMap<i64, String>,
}

impl Vocab {
    pub fn new() -> Self {
        Self {
            token_to_id: HashMap::new(),
            id_to_token: HashMap::new(),
        }
    }

    /// Builds a vocabulary from corpus tokens: the four special tokens
    /// first (`<unk>`=0, `<pad>`=1, `<sos>`=2, `<eos>`=3), then corpus
    /// tokens ordered by descending count, ties broken alphabetically.
    pub fn from_tokens<I, S>(tokens: I, min_count: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for token in tokens {
            *counts.entry(token.as_ref().to_string()).or_insert(0) += 1;
        }

        let mut vocab = Self::new();
        for special in [UNK_TOKEN, PAD_TOKEN, SOS_TOKEN, EOS_TOKEN] {
            let id = vocab.len() as i64;
            vocab.insert(special.to_string(), id);
        }

        let mut ranked: Vec<(String, usize)> = counts
            .into_iter()
            .filter(|(_, count)| *count >= min_count)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        for (token, _) in ranked {
            if vocab.token_to_id.contains_key(&token) {
                continue;
            }
            let id = vocab.len() as i64;
            vocab.insert(token, id);
        }
        vocab
    }

    pub fn insert(&mut self, token: String, id: i64) {
        self.token_to_id.insert(token.clone(), id);
        self.id_to_token.insert(id, token);
    }

    pub fn get_id(&self, token: &str) -> Option<i64> {
        self.token_to_id.get(token).copied()
    }

    pub fn get_token(&self, id: i64) -> Option<&String> {
        self.id_to_token.get(&id)
    }

    /// Id of a token that must exist (special tokens).
    pub fn required_id(&self, token: &str) -> Result<i64> {
        self.get_id(token)
            .ok_or_else(|| VocabError::MissingSpecial(token.to_string()))
    }

    pub fn len(&self) -> usize {
        self.token_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_to_id.is_empty()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.token_to_id)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let token_to_id: HashMap<String, i64> = serde_json::from_reader(reader)?;

        let mut id_to_token = HashMap::new();
        for (token, id) in &token_to_id {
            id_to_token.insert(*id, token.clone());
        }

        Ok(Self {
            token_to_id,
            id_to_token,
        })
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new()
    }
}
