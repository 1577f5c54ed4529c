use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tch::Device;

use inference::{load_model, InferenceSession};
use vocab::{Level, Tokenizer};

#[derive(Parser)]
#[command(name = "nlpkit-infer", about = "Greedy decoding from a trained seq2seq model")]
struct Cli {
    /// Training data directory holding checkpoints and the model config.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Model variant tag.
    #[arg(long, default_value_t = 0)]
    tag: usize,

    /// Tokenization granularity: word, char or bpe.
    #[arg(long, default_value = "word")]
    level: String,

    /// Vocabulary artifact.
    #[arg(long)]
    vocab: PathBuf,

    /// Input file (one sentence per line); omit for the interactive loop.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output file for file mode.
    #[arg(long, default_value = "./data/output.txt")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let level: Level = cli.level.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let tokenizer = Tokenizer::load(level, &cli.vocab)
        .with_context(|| format!("loading vocabulary {:?}", cli.vocab))?;
    log::info!(
        "{:?}-level vocabulary, {} entries",
        tokenizer.level(),
        tokenizer.vocab_size()
    );

    let device = Device::cuda_if_available();
    log::info!("using device {:?}", device);

    let (model, _vs) = load_model(&cli.data_dir, cli.tag, device)
        .with_context(|| format!("loading model {} from {:?}", cli.tag, cli.data_dir))?;
    let max_len = model.config.max_seq_len as usize;

    let session = InferenceSession::new(model, tokenizer, device, max_len)?;
    match cli.input {
        Some(input) => session.infer_from_file(&input, &cli.output)?,
        None => session.infer_from_input()?,
    }
    Ok(())
}
