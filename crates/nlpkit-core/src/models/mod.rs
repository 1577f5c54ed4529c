pub mod encoder_decoder;
pub mod gcn;

use tch::Tensor;

/// Seam between the training/inference drivers and a concrete
/// sequence-to-sequence architecture. Implementations run a
/// teacher-forced forward pass and return logits of shape
/// `[batch, target_len, vocab_size]`.
pub trait Seq2SeqModel {
    fn forward(&self, src: &Tensor, trg_input: &Tensor, train: bool) -> Tensor;
}
