use std::path::Path;
use tch::{nn, Device};

pub mod error;
pub mod greedy;
pub mod session;

pub use error::InferError;
pub use greedy::{greedy_decode, StepDecoder};
pub use session::InferenceSession;

use nlpkit_core::{EncoderDecoder, Seq2SeqConfig};
use trainer::CheckpointManager;

/// Loads a trained encoder-decoder from a training data directory:
/// the model config JSON written by the trainer, then the best
/// checkpoint's weights, falling back to the latest checkpoint.
pub fn load_model(
    dir: &Path,
    tag: usize,
    device: Device,
) -> error::Result<(EncoderDecoder, nn::VarStore)> {
    let config_path = dir.join(format!("model_config_{}.json", tag));
    let config: Seq2SeqConfig = nlpkit_core::config::load_json(&config_path)?;

    let mut vs = nn::VarStore::new(device);
    let model = EncoderDecoder::new(&vs.root(), &config);

    let checkpoints = CheckpointManager::new(dir, tag);
    let weights = if checkpoints.best_weights().is_file() {
        checkpoints.best_weights()
    } else if checkpoints.latest_weights().is_file() {
        checkpoints.latest_weights()
    } else {
        return Err(InferError::NoWeights(dir.to_path_buf()));
    };

    vs.load(&weights)?;
    log::info!("loaded weights from {:?}", weights);
    Ok((model, vs))
}
