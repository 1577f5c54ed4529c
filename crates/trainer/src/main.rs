use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tch::{nn, Device, Tensor};

use nlpkit_core::config::load_yaml;
use nlpkit_core::{EncoderDecoder, Gcn, GcnConfig, Seq2SeqConfig, SourceKind};
use trainer::{ClassifierTrainer, GraphSplit, ParallelDataset, Seq2SeqTrainer, TrainerConfig};
use vocab::{Level, Tokenizer};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Task {
    /// Graph-convolutional node classification.
    Gcn,
    /// Sequence-to-sequence (summarization / translation style).
    Seq2seq,
}

#[derive(Parser)]
#[command(name = "nlpkit-train", about = "Train an nlpkit model family")]
struct Cli {
    #[arg(long, value_enum)]
    task: Task,

    /// Trainer configuration (YAML); defaults apply when absent.
    #[arg(long, default_value = "configs/trainer.yaml")]
    config: PathBuf,

    /// Model configuration (YAML); defaults apply when absent.
    #[arg(long, default_value = "configs/model.yaml")]
    model_config: PathBuf,

    /// Training data: a TSV parallel corpus (seq2seq) or a graph JSON
    /// file (gcn).
    #[arg(long)]
    data: PathBuf,

    /// Tokenization granularity for seq2seq corpora.
    #[arg(long, default_value = "word")]
    level: String,

    /// Vocabulary artifact (seq2seq only).
    #[arg(long)]
    vocab: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let trainer_config: TrainerConfig = if cli.config.is_file() {
        load_yaml(&cli.config).with_context(|| format!("reading {:?}", cli.config))?
    } else {
        log::info!("no trainer config at {:?}, using defaults", cli.config);
        TrainerConfig::default()
    };

    let device = Device::cuda_if_available();
    log::info!("using device {:?}", device);

    match cli.task {
        Task::Seq2seq => run_seq2seq(&cli, trainer_config, device),
        Task::Gcn => run_gcn(&cli, trainer_config, device),
    }
}

fn run_seq2seq(cli: &Cli, trainer_config: TrainerConfig, device: Device) -> Result<()> {
    let level: Level = cli
        .level
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let vocab_path = cli
        .vocab
        .as_ref()
        .context("--vocab is required for the seq2seq task")?;
    let tokenizer = Tokenizer::load(level, vocab_path)
        .with_context(|| format!("loading vocabulary {:?}", vocab_path))?;
    log::info!(
        "{:?}-level vocabulary, {} entries",
        tokenizer.level(),
        tokenizer.vocab_size()
    );

    let mut dataset = ParallelDataset::from_tsv(&cli.data, &tokenizer, trainer_config.max_seq_len)
        .with_context(|| format!("loading corpus {:?}", cli.data))?;
    if dataset.is_empty() {
        bail!("corpus {:?} produced no usable sentence pairs", cli.data);
    }

    let mut model_config: Seq2SeqConfig = if cli.model_config.is_file() {
        load_yaml(&cli.model_config)?
    } else {
        Seq2SeqConfig::default()
    };
    // The artifact defines the real vocabulary; override whatever the
    // config file says.
    let vocab_size = tokenizer.vocab_size() as i64;
    model_config.vocab_size = vocab_size;
    if let SourceKind::Tokens { .. } = model_config.source {
        model_config.source = SourceKind::Tokens { vocab_size };
    }
    model_config.pad_id = tokenizer.pad_id();

    let vs = nn::VarStore::new(device);
    let model = EncoderDecoder::new(&vs.root(), &model_config);
    write_model_config(&trainer_config, &model_config)?;

    let mut trainer = Seq2SeqTrainer::new(vs, model, tokenizer.pad_id(), trainer_config)?;
    trainer.train(&mut dataset)?;
    log::info!("training complete");
    Ok(())
}

/// Graph input file: row-major feature and normalized-adjacency
/// matrices plus the trained/held-out node split.
#[derive(Deserialize)]
struct GraphFile {
    features: Vec<Vec<f32>>,
    a_hat: Vec<Vec<f32>>,
    train_idx: Vec<i64>,
    train_labels: Vec<i64>,
    #[serde(default)]
    test_idx: Vec<i64>,
    #[serde(default)]
    test_labels: Vec<i64>,
}

fn run_gcn(cli: &Cli, trainer_config: TrainerConfig, device: Device) -> Result<()> {
    let raw = std::fs::read_to_string(&cli.data)
        .with_context(|| format!("reading graph file {:?}", cli.data))?;
    let graph: GraphFile = serde_json::from_str(&raw)?;

    let features = matrix(&graph.features)?.to(device);
    let a_hat = matrix(&graph.a_hat)?.to(device);
    let num_features = features.size()[1];

    let model_config: GcnConfig = if cli.model_config.is_file() {
        load_yaml(&cli.model_config)?
    } else {
        GcnConfig::default()
    };

    let vs = nn::VarStore::new(device);
    let model = Gcn::new(&vs.root(), a_hat, num_features, &model_config);

    let split = GraphSplit {
        features,
        train_idx: graph.train_idx,
        train_labels: graph.train_labels,
        test_idx: graph.test_idx,
        test_labels: graph.test_labels,
    };

    let mut trainer = ClassifierTrainer::new(vs, model, trainer_config)?;
    trainer.train(&split)?;
    log::info!("training complete");
    Ok(())
}

fn matrix(rows: &[Vec<f32>]) -> Result<Tensor> {
    let n = rows.len();
    let m = rows.first().map_or(0, |r| r.len());
    if n == 0 || m == 0 {
        bail!("empty matrix in graph file");
    }
    if rows.iter().any(|r| r.len() != m) {
        bail!("ragged matrix in graph file");
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Ok(Tensor::from_slice(&flat).view([n as i64, m as i64]))
}

fn write_model_config(trainer_config: &TrainerConfig, model_config: &Seq2SeqConfig) -> Result<()> {
    let dir = Path::new(&trainer_config.data_dir);
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("model_config_{}.json", trainer_config.model_tag));
    std::fs::write(&path, serde_json::to_string_pretty(model_config)?)?;
    log::info!("wrote model config to {:?}", path);
    Ok(())
}
