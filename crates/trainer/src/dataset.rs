use rand::seq::SliceRandom;
use rand::thread_rng;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tch::{Device, Tensor};
use vocab::Tokenizer;

use crate::error::Result;

/// One padded training batch. `src` is `[B, S]` token ids for text
/// sources; speech pipelines build their own batches with `[B, S, F]`
/// float frames. `trg` is `[B, T]` and starts with the start-of-sequence
/// token and ends with end-of-sequence before padding.
pub struct Seq2SeqBatch {
    pub src: Tensor,
    pub trg: Tensor,
}

/// Tab-separated parallel corpus (source sentence, target sentence),
/// encoded once at load time with the chosen vocabulary.
pub struct ParallelDataset {
    pairs: Vec<(Vec<i64>, Vec<i64>)>,
    pad_id: i64,
}

impl ParallelDataset {
    pub fn from_tsv<P: AsRef<Path>>(
        path: P,
        tokenizer: &Tokenizer,
        max_len: usize,
    ) -> Result<Self> {
        let sos = tokenizer.sos_id()?;
        let eos = tokenizer.eos_id()?;

        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);

        let mut pairs = Vec::new();
        let mut skipped = 0usize;
        for line in reader.lines() {
            let line = line?;
            let (src_text, trg_text) = match line.split_once('\t') {
                Some(parts) => parts,
                None => {
                    skipped += 1;
                    continue;
                }
            };

            let mut src = tokenizer.encode(src_text);
            src.truncate(max_len);
            let mut trg_body = tokenizer.encode(trg_text);
            trg_body.truncate(max_len.saturating_sub(2));
            if src.is_empty() || trg_body.is_empty() {
                skipped += 1;
                continue;
            }

            let mut trg = Vec::with_capacity(trg_body.len() + 2);
            trg.push(sos);
            trg.extend(trg_body);
            trg.push(eos);
            pairs.push((src, trg));
        }

        if skipped > 0 {
            log::warn!("skipped {} malformed or empty corpus lines", skipped);
        }
        log::info!("loaded {} sentence pairs", pairs.len());

        Ok(Self {
            pairs,
            pad_id: tokenizer.pad_id(),
        })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Shuffles the pairs and chunks them into padded batches.
    pub fn shuffled_batches(&mut self, batch_size: usize, device: Device) -> Vec<Seq2SeqBatch> {
        self.pairs.shuffle(&mut thread_rng());
        self.batches(batch_size, device)
    }

    pub fn batches(&self, batch_size: usize, device: Device) -> Vec<Seq2SeqBatch> {
        let batch_size = batch_size.max(1);
        self.pairs
            .chunks(batch_size)
            .map(|chunk| self.pad_batch(chunk, device))
            .collect()
    }

    fn pad_batch(&self, chunk: &[(Vec<i64>, Vec<i64>)], device: Device) -> Seq2SeqBatch {
        let src_len = chunk.iter().map(|(s, _)| s.len()).max().unwrap_or(1);
        let trg_len = chunk.iter().map(|(_, t)| t.len()).max().unwrap_or(1);
        let rows = chunk.len();

        let mut src_flat = Vec::with_capacity(rows * src_len);
        let mut trg_flat = Vec::with_capacity(rows * trg_len);
        for (src, trg) in chunk {
            src_flat.extend(src.iter().copied());
            src_flat.extend(std::iter::repeat(self.pad_id).take(src_len - src.len()));
            trg_flat.extend(trg.iter().copied());
            trg_flat.extend(std::iter::repeat(self.pad_id).take(trg_len - trg.len()));
        }

        Seq2SeqBatch {
            src: Tensor::from_slice(&src_flat)
                .view([rows as i64, src_len as i64])
                .to(device),
            trg: Tensor::from_slice(&trg_flat)
                .view([rows as i64, trg_len as i64])
                .to(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use vocab::{word_tokens, Vocab};

    fn tokenizer_for(corpus: &str) -> Tokenizer {
        Tokenizer::Word(Vocab::from_tokens(word_tokens(corpus), 1))
    }

    #[test]
    fn loads_and_pads_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.tsv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "the cat sat\tle chat").unwrap();
        writeln!(file, "a dog\tun chien ici").unwrap();
        writeln!(file, "line without tab").unwrap();
        drop(file);

        let tokenizer = tokenizer_for("the cat sat a dog le chat un chien ici");
        let dataset = ParallelDataset::from_tsv(&path, &tokenizer, 50).unwrap();
        assert_eq!(dataset.len(), 2);

        let batches = dataset.batches(2, Device::Cpu);
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        // Longest source has 3 tokens; longest target 3 tokens + sos/eos.
        assert_eq!(batch.src.size(), &[2, 3]);
        assert_eq!(batch.trg.size(), &[2, 5]);

        // First target row starts with <sos> and is padded at the end.
        let first_row: Vec<i64> = Vec::try_from(&batch.trg.get(0)).unwrap();
        assert_eq!(first_row[0], tokenizer.sos_id().unwrap());
        assert_eq!(*first_row.last().unwrap(), tokenizer.pad_id());
    }

    #[test]
    fn truncates_to_max_len() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.tsv");
        std::fs::write(&path, "one two three four five\tsix seven eight nine ten\n").unwrap();

        let tokenizer = tokenizer_for("one two three four five six seven eight nine ten");
        let dataset = ParallelDataset::from_tsv(&path, &tokenizer, 4).unwrap();
        let batches = dataset.batches(1, Device::Cpu);
        assert_eq!(batches[0].src.size(), &[1, 4]);
        // Target body capped at max_len - 2 to leave room for sos/eos.
        assert_eq!(batches[0].trg.size(), &[1, 4]);
    }
}
