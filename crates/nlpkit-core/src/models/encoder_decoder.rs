use tch::{nn, Kind, Tensor};

use crate::config::{Seq2SeqConfig, SourceKind};
use crate::models::Seq2SeqModel;

enum SourceEncoder {
    Tokens(nn::Embedding),
    Frames(nn::Linear),
}

/// Compact encoder-decoder reference model: source embedding (or frame
/// projection), target embedding, one cross-attention hop from decoder
/// positions onto encoder states, feed-forward, vocabulary projection.
///
/// The drivers are generic over [`Seq2SeqModel`]; this exists so the
/// training loop and the greedy decoder have a concrete architecture
/// to load and exercise.
pub struct EncoderDecoder {
    source: SourceEncoder,
    trg_embed: nn::Embedding,
    ff: nn::Linear,
    out_proj: nn::Linear,
    dropout: f64,
    scale: f64,
    pub config: Seq2SeqConfig,
}

impl EncoderDecoder {
    pub fn new(vs: &nn::Path, config: &Seq2SeqConfig) -> Self {
        let d = config.d_model;
        let source = match config.source {
            SourceKind::Tokens { vocab_size } => {
                SourceEncoder::Tokens(nn::embedding(vs / "src_embed", vocab_size, d, Default::default()))
            }
            SourceKind::Frames { feature_dim } => {
                SourceEncoder::Frames(nn::linear(vs / "src_proj", feature_dim, d, Default::default()))
            }
        };
        let trg_embed = nn::embedding(vs / "trg_embed", config.vocab_size, d, Default::default());
        let ff = nn::linear(vs / "ff", d, d, Default::default());
        let out_proj = nn::linear(vs / "out_proj", d, config.vocab_size, Default::default());

        Self {
            source,
            trg_embed,
            ff,
            out_proj,
            dropout: config.dropout,
            scale: (d as f64).sqrt(),
            config: config.clone(),
        }
    }

    fn encode(&self, src: &Tensor) -> Tensor {
        match &self.source {
            SourceEncoder::Tokens(embed) => src.apply(embed),
            SourceEncoder::Frames(proj) => src.apply(proj),
        }
    }
}

impl Seq2SeqModel for EncoderDecoder {
    fn forward(&self, src: &Tensor, trg_input: &Tensor, train: bool) -> Tensor {
        let enc = self.encode(src); // [B, S, D]
        let dec = trg_input.apply(&self.trg_embed); // [B, T, D]

        let scores = dec.matmul(&enc.transpose(-2, -1)) / self.scale; // [B, T, S]
        let attn = scores.softmax(-1, Kind::Float);
        let context = attn.matmul(&enc); // [B, T, D]

        let h = (dec + context)
            .apply(&self.ff)
            .relu()
            .dropout(self.dropout, train);
        h.apply(&self.out_proj) // [B, T, V]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn tiny_config() -> Seq2SeqConfig {
        Seq2SeqConfig {
            source: SourceKind::Tokens { vocab_size: 12 },
            vocab_size: 12,
            d_model: 16,
            max_seq_len: 10,
            dropout: 0.0,
            pad_id: 1,
        }
    }

    #[test]
    fn token_source_logit_shape() {
        let vs = nn::VarStore::new(Device::Cpu);
        let net = EncoderDecoder::new(&vs.root(), &tiny_config());

        let src = Tensor::from_slice(&[2i64, 3, 4, 5]).view([1, 4]);
        let trg = Tensor::from_slice(&[0i64, 2, 3]).view([1, 3]);
        let logits = net.forward(&src, &trg, false);
        assert_eq!(logits.size(), &[1, 3, 12]);
    }

    #[test]
    fn frame_source_logit_shape() {
        let mut config = tiny_config();
        config.source = SourceKind::Frames { feature_dim: 6 };
        let vs = nn::VarStore::new(Device::Cpu);
        let net = EncoderDecoder::new(&vs.root(), &config);

        let src = Tensor::rand(&[1, 5, 6], (Kind::Float, Device::Cpu));
        let trg = Tensor::from_slice(&[0i64, 2]).view([1, 2]);
        let logits = net.forward(&src, &trg, false);
        assert_eq!(logits.size(), &[1, 2, 12]);
    }
}
