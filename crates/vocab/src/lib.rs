pub mod bpe;
pub mod error;
pub mod vocab;

pub use bpe::BpeVocab;
pub use error::VocabError;
pub use vocab::{Vocab, EOS_TOKEN, PAD_ID, PAD_TOKEN, SOS_TOKEN, UNK_TOKEN};

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::Result;

/// Tokenization granularity; selects how text maps onto vocabulary
/// entries and which special-token spelling the artifact uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Word,
    Char,
    Bpe,
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "word" => Ok(Level::Word),
            "char" => Ok(Level::Char),
            "bpe" => Ok(Level::Bpe),
            other => Err(format!("unknown tokenization level: {}", other)),
        }
    }
}

fn word_pattern() -> &'static Regex {
    // Words (with internal apostrophes) or single punctuation marks.
    // Compiled once; word_tokens runs per corpus line.
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\w']+|[^\w\s]").expect("static pattern"))
}

/// Splits text into word-level tokens.
pub fn word_tokens(text: &str) -> Vec<String> {
    word_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Splits text into character-level tokens (whitespace kept as a token).
pub fn char_tokens(text: &str) -> Vec<String> {
    text.chars().map(|c| c.to_string()).collect()
}

/// One vocabulary artifact at a chosen granularity, dispatching
/// encode/decode and the special-token ids per variant.
pub enum Tokenizer {
    Word(Vocab),
    Char(Vocab),
    Bpe(BpeVocab),
}

impl Tokenizer {
    pub fn load<P: AsRef<Path>>(level: Level, path: P) -> Result<Self> {
        match level {
            Level::Word => Ok(Tokenizer::Word(Vocab::load(path)?)),
            Level::Char => Ok(Tokenizer::Char(Vocab::load(path)?)),
            Level::Bpe => Ok(Tokenizer::Bpe(BpeVocab::load(path)?)),
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Tokenizer::Word(_) => Level::Word,
            Tokenizer::Char(_) => Level::Char,
            Tokenizer::Bpe(_) => Level::Bpe,
        }
    }

    pub fn vocab_size(&self) -> usize {
        match self {
            Tokenizer::Word(v) | Tokenizer::Char(v) => v.len(),
            Tokenizer::Bpe(b) => b.vocab.len(),
        }
    }

    pub fn encode(&self, text: &str) -> Vec<i64> {
        match self {
            Tokenizer::Word(v) => lookup(v, word_tokens(text)),
            Tokenizer::Char(v) => lookup(v, char_tokens(text)),
            Tokenizer::Bpe(b) => b.encode(text),
        }
    }

    pub fn decode(&self, ids: &[i64]) -> String {
        match self {
            Tokenizer::Word(v) => join_tokens(v, ids, " "),
            Tokenizer::Char(v) => join_tokens(v, ids, ""),
            Tokenizer::Bpe(b) => b.decode(ids),
        }
    }

    pub fn sos_id(&self) -> Result<i64> {
        match self {
            Tokenizer::Word(v) | Tokenizer::Char(v) => v.required_id(SOS_TOKEN),
            Tokenizer::Bpe(b) => b.sos_id(),
        }
    }

    pub fn eos_id(&self) -> Result<i64> {
        match self {
            Tokenizer::Word(v) | Tokenizer::Char(v) => v.required_id(EOS_TOKEN),
            Tokenizer::Bpe(b) => b.eos_id(),
        }
    }

    pub fn pad_id(&self) -> i64 {
        PAD_ID
    }
}

fn lookup(vocab: &Vocab, tokens: Vec<String>) -> Vec<i64> {
    let unk = vocab.get_id(UNK_TOKEN);
    tokens
        .into_iter()
        .filter_map(|token| vocab.get_id(&token).or(unk))
        .collect()
}

fn join_tokens(vocab: &Vocab, ids: &[i64], sep: &str) -> String {
    let specials = [UNK_TOKEN, PAD_TOKEN, SOS_TOKEN, EOS_TOKEN];
    let tokens: Vec<&str> = ids
        .iter()
        .filter_map(|&id| vocab.get_token(id).map(|t| t.as_str()))
        .filter(|t| !specials.contains(t))
        .collect();
    tokens.join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_level_round_trip() {
        let vocab = Vocab::from_tokens(word_tokens("the cat sat"), 1);
        let tokenizer = Tokenizer::Word(vocab);
        assert_eq!(tokenizer.level(), Level::Word);
        let ids = tokenizer.encode("the cat sat");
        assert_eq!(ids.len(), 3);
        assert_eq!(tokenizer.decode(&ids), "the cat sat");
    }

    #[test]
    fn char_level_round_trip() {
        let vocab = Vocab::from_tokens(char_tokens("abc ab"), 1);
        let tokenizer = Tokenizer::Char(vocab);
        let ids = tokenizer.encode("cab");
        assert_eq!(ids.len(), 3);
        assert_eq!(tokenizer.decode(&ids), "cab");
    }

    #[test]
    fn unknown_words_become_unk() {
        let vocab = Vocab::from_tokens(word_tokens("known"), 1);
        let tokenizer = Tokenizer::Word(vocab);
        let ids = tokenizer.encode("unknownword");
        assert_eq!(ids, vec![0]);
        assert_eq!(tokenizer.decode(&ids), "");
    }

    #[test]
    fn specials_are_dropped_on_decode() {
        let vocab = Vocab::from_tokens(word_tokens("hello"), 1);
        let tokenizer = Tokenizer::Word(vocab);
        let sos = tokenizer.sos_id().unwrap();
        let eos = tokenizer.eos_id().unwrap();
        let hello = tokenizer.encode("hello");
        let mut ids = vec![sos];
        ids.extend(&hello);
        ids.push(eos);
        assert_eq!(tokenizer.decode(&ids), "hello");
    }

    #[test]
    fn level_parses_from_str() {
        assert_eq!("word".parse::<Level>().unwrap(), Level::Word);
        assert_eq!("bpe".parse::<Level>().unwrap(), Level::Bpe);
        assert!("subword".parse::<Level>().is_err());
    }
}
