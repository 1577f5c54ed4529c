use tch::{Device, IndexOp, Kind, Tensor};

use nlpkit_core::Seq2SeqModel;

use crate::error::{InferError, Result};

/// One autoregressive step: given the encoded source and the tokens
/// generated so far (starting with the start-of-sequence token),
/// return the logits over the vocabulary for the next position.
pub trait StepDecoder {
    fn next_logits(&self, src: &Tensor, generated: &[i64]) -> Result<Vec<f32>>;
}

/// Greedy autoregressive decoding: always take the argmax token, feed
/// it back, stop on `eos` or after `max_len` generated tokens. The
/// returned sequence excludes `sos` and includes `eos` when produced,
/// so it is bounded by `max_len` even if `eos` never appears.
pub fn greedy_decode<D: StepDecoder>(
    decoder: &D,
    src: &Tensor,
    sos: i64,
    eos: i64,
    max_len: usize,
) -> Result<Vec<i64>> {
    let mut generated = vec![sos];
    let mut output = Vec::new();

    for _ in 0..max_len {
        let logits = decoder.next_logits(src, &generated)?;
        let next = argmax(&logits)?;
        generated.push(next);
        output.push(next);
        if next == eos {
            break;
        }
    }
    Ok(output)
}

fn argmax(logits: &[f32]) -> Result<i64> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in logits.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i as i64).ok_or(InferError::EmptyLogits)
}

/// Any [`Seq2SeqModel`] decodes step-by-step by running a teacher-style
/// forward over the generated prefix and reading the last position.
impl<M: Seq2SeqModel> StepDecoder for M {
    fn next_logits(&self, src: &Tensor, generated: &[i64]) -> Result<Vec<f32>> {
        let _guard = tch::no_grad_guard();
        let prefix = Tensor::from_slice(generated)
            .view([1, generated.len() as i64])
            .to(src.device());
        let logits = self.forward(src, &prefix, false);
        let last = logits
            .i((0, -1, ..))
            .to_kind(Kind::Float)
            .to_device(Device::Cpu);
        Ok(Vec::<f32>::try_from(&last)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits a scripted logit row per step (repeating the last row).
    struct Scripted {
        rows: Vec<Vec<f32>>,
    }

    impl StepDecoder for Scripted {
        fn next_logits(&self, _src: &Tensor, generated: &[i64]) -> Result<Vec<f32>> {
            let step = (generated.len() - 1).min(self.rows.len() - 1);
            Ok(self.rows[step].clone())
        }
    }

    fn dummy_src() -> Tensor {
        Tensor::zeros(&[1, 1], (Kind::Float, Device::Cpu))
    }

    #[test]
    fn stops_on_eos() {
        // Vocabulary of 4; eos is 3. Steps emit 2, 2, then 3.
        let decoder = Scripted {
            rows: vec![
                vec![0.0, 0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0, 0.0],
                vec![0.0, 0.0, 0.0, 1.0],
            ],
        };
        let out = greedy_decode(&decoder, &dummy_src(), 0, 3, 50).unwrap();
        assert_eq!(out, vec![2, 2, 3]);
    }

    #[test]
    fn terminates_at_max_len_without_eos() {
        let decoder = Scripted {
            rows: vec![vec![0.0, 1.0, 0.0, 0.0]],
        };
        let out = greedy_decode(&decoder, &dummy_src(), 0, 3, 7).unwrap();
        assert_eq!(out, vec![1; 7]);
    }

    #[test]
    fn picks_the_argmax_each_step() {
        let decoder = Scripted {
            rows: vec![
                vec![0.1, 0.9, 0.5, 0.0],
                vec![0.8, 0.2, 0.1, 0.0],
                vec![0.0, 0.0, 0.0, 9.0],
            ],
        };
        let out = greedy_decode(&decoder, &dummy_src(), 0, 3, 10).unwrap();
        assert_eq!(out, vec![1, 0, 3]);
    }

    #[test]
    fn empty_logits_are_an_error() {
        let decoder = Scripted { rows: vec![vec![]] };
        assert!(matches!(
            greedy_decode(&decoder, &dummy_src(), 0, 3, 5),
            Err(InferError::EmptyLogits)
        ));
    }
}
