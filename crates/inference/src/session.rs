use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tch::{Device, Tensor};
use vocab::Tokenizer;

use crate::error::Result;
use crate::greedy::{greedy_decode, StepDecoder};

/// Text-side inference front-end: encodes input with the configured
/// vocabulary, runs greedy decoding, decodes the result back to text.
pub struct InferenceSession<D: StepDecoder> {
    model: D,
    tokenizer: Tokenizer,
    device: Device,
    sos: i64,
    eos: i64,
    max_len: usize,
}

impl<D: StepDecoder> InferenceSession<D> {
    pub fn new(model: D, tokenizer: Tokenizer, device: Device, max_len: usize) -> Result<Self> {
        let sos = tokenizer.sos_id()?;
        let eos = tokenizer.eos_id()?;
        Ok(Self {
            model,
            tokenizer,
            device,
            sos,
            eos,
            max_len,
        })
    }

    pub fn infer_sentence(&self, sentence: &str) -> Result<String> {
        let ids = self.tokenizer.encode(sentence);
        if ids.is_empty() {
            return Ok(String::new());
        }
        let src = Tensor::from_slice(&ids)
            .view([1, ids.len() as i64])
            .to(self.device);

        let mut out = greedy_decode(&self.model, &src, self.sos, self.eos, self.max_len)?;
        if out.last() == Some(&self.eos) {
            out.pop();
        }
        Ok(self.tokenizer.decode(&out))
    }

    /// Interactive loop on stdin; `exit` or `quit` leaves.
    pub fn infer_from_input(&self) -> Result<()> {
        let stdin = std::io::stdin();
        loop {
            println!("Type input sentence ('exit' or 'quit' to quit):");
            let mut line = String::new();
            if stdin.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim();
            if line == "exit" || line == "quit" {
                return Ok(());
            }
            if line.is_empty() {
                continue;
            }
            println!("{}", self.infer_sentence(line)?);
        }
    }

    /// One input sentence per line in, tab-separated input/output per
    /// line out.
    pub fn infer_from_file<P: AsRef<Path>>(&self, input: P, output: P) -> Result<()> {
        let reader = BufReader::new(File::open(input.as_ref())?);
        let mut writer = BufWriter::new(File::create(output.as_ref())?);

        for line in reader.lines() {
            let line = line?;
            let sentence = line.trim();
            if sentence.is_empty() {
                continue;
            }
            let result = self.infer_sentence(sentence)?;
            writeln!(writer, "{}\t{}", sentence, result)?;
        }
        log::info!("wrote inference output to {:?}", output.as_ref());
        Ok(())
    }
}
