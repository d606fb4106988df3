//! The generation loop (§4.F): prefill the KV cache on the prompt, then
//! sample one token at a time until EOS, the token budget, or the
//! context window is exhausted.

use alloc::vec::Vec;

use crate::sampler::{self, Rng, BOS_ID, EOS_ID};
use crate::transformer::Engine;
use crate::utf8repair::Utf8Repair;

/// Turns a sampled token id into its UTF-8 piece. Tokenizer loading and
/// the merge table itself are an external collaborator; the decoder
/// only needs this narrow capability.
pub trait Detokenizer {
    fn piece(&self, token: i32) -> &[u8];
}

#[derive(Clone, Copy)]
pub struct GenConfig {
    pub max_gen_tokens: usize,
    pub temperature: f32,
    pub top_k: usize,
    pub no_repeat_ngram: usize,
    pub seed: u64,
}

impl Default for GenConfig {
    fn default() -> Self {
        GenConfig { max_gen_tokens: 256, temperature: 1.0, top_k: 40, no_repeat_ngram: 0, seed: 0 }
    }
}

pub struct GenResult {
    pub generated: Vec<i32>,
    pub stopped_on_eos: bool,
}

/// Runs one REPL turn. `tokens` holds the prompt (BOS already pushed by
/// the caller, per §4.F step 1) and is extended in place with every
/// sampled token so `no_repeat_ngram` sees the full history. `emit` is
/// called with each repaired UTF-8 chunk as it becomes available.
pub fn generate(
    engine: &mut Engine,
    tokens: &mut Vec<i32>,
    cfg: GenConfig,
    detok: &dyn Detokenizer,
    emit: &mut dyn FnMut(&[u8]),
) -> GenResult {
    debug_assert_eq!(tokens.first().copied(), Some(BOS_ID));

    let prompt_len = tokens.len();
    let seq_len = engine.dims.seq_len;

    // §4.F step 2: warm the cache on the prompt, discarding logits.
    for p in 0..prompt_len.saturating_sub(1) {
        if p >= seq_len {
            break;
        }
        engine.step(tokens[p] as usize, p);
    }

    let mut rng = Rng::new(cfg.seed);
    let mut scratch = Vec::new();
    let mut repair = Utf8Repair::new();
    let mut generated = Vec::new();
    let mut stopped_on_eos = false;

    let mut pos = prompt_len - 1;
    loop {
        if pos >= seq_len || generated.len() >= cfg.max_gen_tokens {
            break;
        }
        let logits = engine.step(tokens[pos] as usize, pos);
        let mut logits = logits.to_vec();

        sampler::mask_repeated_ngrams(&mut logits, tokens, cfg.no_repeat_ngram);
        let next = sampler::sample(&mut logits, cfg.temperature, cfg.top_k, &mut rng, &mut scratch);

        if next == EOS_ID {
            stopped_on_eos = true;
            break;
        }

        tokens.push(next);
        generated.push(next);
        pos += 1;

        let mut out = Vec::new();
        repair.feed(detok.piece(next), &mut out);
        if !out.is_empty() {
            emit(&out);
        }
    }

    let mut tail = Vec::new();
    repair.flush(&mut tail);
    if !tail.is_empty() {
        emit(&tail);
    }

    GenResult { generated, stopped_on_eos }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoDetok;
    impl Detokenizer for EchoDetok {
        fn piece(&self, _token: i32) -> &[u8] {
            b"x"
        }
    }

    #[test]
    fn gen_config_default_has_sane_budget() {
        let cfg = GenConfig::default();
        assert!(cfg.max_gen_tokens > 0);
        assert_eq!(cfg.temperature, 1.0);
    }

    #[test]
    fn echo_detokenizer_returns_fixed_piece() {
        let d = EchoDetok;
        assert_eq!(d.piece(5), b"x");
    }
}
