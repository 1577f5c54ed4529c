use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{Result, VocabError};
use crate::vocab::Vocab;

pub const BPE_UNK: &str = "__unk";
pub const BPE_PAD: &str = "__pad";
pub const BPE_SOS: &str = "__sos";
pub const BPE_EOS: &str = "__eos";

/// End-of-word marker appended to the final character of each word
/// before merges are applied.
const EOW: &str = "</w>";

/// Byte-pair vocabulary: a token map plus a ranked merge table. The
/// merge table is learned offline; this type only applies it.
#[derive(Debug, Clone)]
pub struct BpeVocab {
    pub vocab: Vocab,
    /// Pair -> merge rank; lower rank merges first.
    pub merges: HashMap<(String, String), u32>,
}

impl BpeVocab {
    pub fn new(vocab: Vocab, merges: HashMap<(String, String), u32>) -> Self {
        Self { vocab, merges }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        // Tuple keys are not valid JSON object keys; flatten for the artifact.
        let artifact = BpeArtifact::from(self);
        serde_json::to_writer_pretty(writer, &artifact)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let artifact: BpeArtifact = serde_json::from_reader(reader)?;
        artifact.try_into()
    }

    fn get_pairs(word: &[String]) -> HashSet<(String, String)> {
        let mut pairs = HashSet::new();
        for i in 0..word.len().saturating_sub(1) {
            pairs.insert((word[i].clone(), word[i + 1].clone()));
        }
        pairs
    }

    /// Splits one whitespace word into merge-table subword units.
    fn segment(&self, word: &str) -> Vec<String> {
        let mut units: Vec<String> = word.chars().map(|c| c.to_string()).collect();
        if let Some(last) = units.last_mut() {
            last.push_str(EOW);
        }

        loop {
            let pairs = Self::get_pairs(&units);
            if pairs.is_empty() {
                break;
            }

            let best = pairs
                .iter()
                .filter_map(|pair| self.merges.get(pair).map(|&rank| (rank, pair.clone())))
                .min_by_key(|(rank, _)| *rank);
            let (first, second) = match best {
                Some((_, pair)) => pair,
                None => break,
            };

            let mut merged = Vec::with_capacity(units.len());
            let mut i = 0;
            while i < units.len() {
                if i + 1 < units.len() && units[i] == first && units[i + 1] == second {
                    merged.push(format!("{}{}", first, second));
                    i += 2;
                } else {
                    merged.push(units[i].clone());
                    i += 1;
                }
            }
            units = merged;
        }
        units
    }

    pub fn encode(&self, text: &str) -> Vec<i64> {
        let unk = self.vocab.get_id(BPE_UNK);
        let mut ids = Vec::new();
        for word in text.split_whitespace() {
            for unit in self.segment(word) {
                if let Some(id) = self.vocab.get_id(&unit).or(unk) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    pub fn decode(&self, ids: &[i64]) -> String {
        let mut out = String::new();
        for &id in ids {
            let token = match self.vocab.get_token(id) {
                Some(token) => token,
                None => continue,
            };
            if matches!(token.as_str(), BPE_UNK | BPE_PAD | BPE_SOS | BPE_EOS) {
                continue;
            }
            if let Some(stem) = token.strip_suffix(EOW) {
                out.push_str(stem);
                out.push(' ');
            } else {
                out.push_str(token);
            }
        }
        out.trim_end().to_string()
    }

    pub fn sos_id(&self) -> Result<i64> {
        self.vocab.required_id(BPE_SOS)
    }

    pub fn eos_id(&self) -> Result<i64> {
        self.vocab.required_id(BPE_EOS)
    }
}

/// On-disk form: merge pairs flattened to "first second" strings.
#[derive(Serialize, Deserialize)]
struct BpeArtifact {
    token_to_id: HashMap<String, i64>,
    merges: HashMap<String, u32>,
}

impl From<&BpeVocab> for BpeArtifact {
    fn from(bpe: &BpeVocab) -> Self {
        let merges = bpe
            .merges
            .iter()
            .map(|((a, b), &rank)| (format!("{} {}", a, b), rank))
            .collect();
        Self {
            token_to_id: bpe.vocab.token_to_id.clone(),
            merges,
        }
    }
}

impl TryFrom<BpeArtifact> for BpeVocab {
    type Error = VocabError;

    fn try_from(artifact: BpeArtifact) -> Result<Self> {
        let mut vocab = Vocab::new();
        for (token, id) in artifact.token_to_id {
            vocab.insert(token, id);
        }
        let mut merges = HashMap::new();
        for (pair, rank) in artifact.merges {
            if let Some((a, b)) = pair.split_once(' ') {
                merges.insert((a.to_string(), b.to_string()), rank);
            }
        }
        Ok(BpeVocab::new(vocab, merges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_bpe() -> BpeVocab {
        let mut vocab = Vocab::new();
        for (id, token) in [BPE_UNK, BPE_PAD, BPE_SOS, BPE_EOS].iter().enumerate() {
            vocab.insert(token.to_string(), id as i64);
        }
        // Units for the word "low": l, o, w</w>, plus merged forms.
        for token in ["l", "o", "w</w>", "lo", "low</w>"] {
            let id = vocab.len() as i64;
            vocab.insert(token.to_string(), id);
        }
        let mut merges = HashMap::new();
        merges.insert(("l".to_string(), "o".to_string()), 0);
        merges.insert(("lo".to_string(), "w</w>".to_string()), 1);
        BpeVocab::new(vocab, merges)
    }

    #[test]
    fn merges_apply_in_rank_order() {
        let bpe = toy_bpe();
        let ids = bpe.encode("low low");
        let low = bpe.vocab.get_id("low</w>").unwrap();
        assert_eq!(ids, vec![low, low]);
    }

    #[test]
    fn unknown_units_map_to_unk() {
        let bpe = toy_bpe();
        let ids = bpe.encode("x");
        assert_eq!(ids, vec![bpe.vocab.get_id(BPE_UNK).unwrap()]);
    }

    #[test]
    fn decode_restores_word_boundaries() {
        let bpe = toy_bpe();
        let ids = bpe.encode("low low");
        assert_eq!(bpe.decode(&ids), "low low");
    }

    #[test]
    fn artifact_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bpe.json");

        let bpe = toy_bpe();
        bpe.save(&path).unwrap();
        let loaded = BpeVocab::load(&path).unwrap();

        assert_eq!(loaded.encode("low"), bpe.encode("low"));
        assert_eq!(loaded.sos_id().unwrap(), 2);
    }
}
