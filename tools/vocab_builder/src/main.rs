use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use vocab::{char_tokens, word_tokens, Level, Vocab};

/// Builds a word- or char-level vocabulary artifact from a text corpus.
/// BPE artifacts come from an external merge-learning step.
#[derive(Parser)]
struct Cli {
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long)]
    output: PathBuf,

    #[arg(long, default_value = "word")]
    level: String,

    /// Drop corpus tokens seen fewer times than this.
    #[arg(long, default_value_t = 1)]
    min_count: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level: Level = cli.level.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let corpus = std::fs::read_to_string(&cli.input)?;
    let tokens = match level {
        Level::Word => word_tokens(&corpus),
        Level::Char => char_tokens(&corpus),
        Level::Bpe => bail!("bpe artifacts are produced by the merge-learning step, not this tool"),
    };

    let vocab = Vocab::from_tokens(tokens, cli.min_count);
    vocab.save(&cli.output)?;
    println!("wrote {} entries to {:?}", vocab.len(), cli.output);
    Ok(())
}
