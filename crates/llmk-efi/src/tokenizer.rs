//! Tokenizer loading and BPE encode/decode (§6 "Tokenizer file",
//! §1 "tokenizer loading... is assumed" as an external collaborator).
//!
//! The distilled spec treats the tokenizer as a fixed-layout binary
//! whose format is agreed out-of-band; `llama2_efi_final.c` only ever
//! references `TOKEN_BOS`/`TOKEN_EOS` and a display-only vocab size, so
//! there is no tensor-table-style grounding for this file the way there
//! is for the GGUF loader. This follows the conventional llama2.c
//! `tokenizer.bin` layout (`u32 max_token_length`, then per vocab entry
//! `f32 score, u32 len, len bytes`) and its merge-score BPE encode loop,
//! since that is the de facto fixed layout llama-family loaders of this
//! size assume.

use alloc::vec::Vec;

use llmk_engine::Detokenizer;
use llmk_gguf::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerError {
    VocabSizeMismatch { tokenizer: usize, model: usize },
    Corrupt,
}

pub struct Tokenizer {
    vocab: Vec<Vec<u8>>,
    scores: Vec<f32>,
}

impl Tokenizer {
    /// Load `vocab_size` entries; §6 invariant: "tokenizer vocab size
    /// must equal model vocab size (mismatch ⇒ load fails)" is enforced
    /// by the caller, which already knows the model's vocab size.
    pub fn load<S: Source + ?Sized>(source: &mut S, vocab_size: usize) -> Result<Self, TokenizerError> {
        let mut max_len_buf = [0u8; 4];
        source.read_exact(&mut max_len_buf).map_err(|_| TokenizerError::Corrupt)?;

        let mut vocab = Vec::with_capacity(vocab_size);
        let mut scores = Vec::with_capacity(vocab_size);

        for _ in 0..vocab_size {
            let mut score_buf = [0u8; 4];
            source.read_exact(&mut score_buf).map_err(|_| TokenizerError::Corrupt)?;
            scores.push(f32::from_le_bytes(score_buf));

            let mut len_buf = [0u8; 4];
            source.read_exact(&mut len_buf).map_err(|_| TokenizerError::Corrupt)?;
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut bytes = alloc::vec![0u8; len];
            source.read_exact(&mut bytes).map_err(|_| TokenizerError::Corrupt)?;
            vocab.push(bytes);
        }

        Ok(Tokenizer { vocab, scores })
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn check_vocab_size(&self, model_vocab: usize) -> Result<(), TokenizerError> {
        if self.vocab.len() != model_vocab {
            return Err(TokenizerError::VocabSizeMismatch { tokenizer: self.vocab.len(), model: model_vocab });
        }
        Ok(())
    }

    fn lookup(&self, piece: &[u8]) -> Option<i32> {
        self.vocab.iter().position(|v| v.as_slice() == piece).map(|i| i as i32)
    }

    fn merged_bytes(&self, a: i32, b: i32) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.vocab[a as usize].len() + self.vocab[b as usize].len());
        out.extend_from_slice(&self.vocab[a as usize]);
        out.extend_from_slice(&self.vocab[b as usize]);
        out
    }

    /// Greedy BPE encode: seed with per-character lookups (falling back to
    /// raw byte tokens offset by 3 for anything not in the vocab as a
    /// whole character), then repeatedly merge the adjacent pair whose
    /// concatenation is itself a vocab entry with the highest score,
    /// until no more merges apply.
    pub fn encode(&self, text: &str) -> Vec<i32> {
        let mut tokens: Vec<i32> = Vec::new();
        for ch in text.chars() {
            let mut buf = [0u8; 4];
            let s = ch.encode_utf8(&mut buf);
            match self.lookup(s.as_bytes()) {
                Some(id) => tokens.push(id),
                None => {
                    for &b in s.as_bytes() {
                        tokens.push(b as i32 + 3);
                    }
                }
            }
        }

        loop {
            let mut best_score = f32::NEG_INFINITY;
            let mut best_id = -1i32;
            let mut best_pos = None;

            for i in 0..tokens.len().saturating_sub(1) {
                let merged = self.merged_bytes(tokens[i], tokens[i + 1]);
                if let Some(id) = self.lookup(&merged) {
                    let score = self.scores[id as usize];
                    if score > best_score {
                        best_score = score;
                        best_id = id;
                        best_pos = Some(i);
                    }
                }
            }

            match best_pos {
                Some(i) => {
                    tokens[i] = best_id;
                    tokens.remove(i + 1);
                }
                None => break,
            }
        }

        tokens
    }
}

impl Detokenizer for Tokenizer {
    fn piece(&self, token: i32) -> &[u8] {
        self.vocab.get(token as usize).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmk_gguf::source::SliceSource;

    fn build_fixture() -> Vec<u8> {
        let words: [(&str, f32); 6] =
            [("<s>", 0.0), ("</s>", 0.0), ("h", -1.0), ("e", -1.0), ("l", -1.0), ("he", 5.0)];
        let mut buf = Vec::new();
        buf.extend_from_slice(&6u32.to_le_bytes()); // max_token_length (unused by our loader logic)
        for (w, score) in words {
            buf.extend_from_slice(&score.to_le_bytes());
            buf.extend_from_slice(&(w.len() as u32).to_le_bytes());
            buf.extend_from_slice(w.as_bytes());
        }
        buf
    }

    #[test]
    fn loads_vocab_and_checks_size() {
        let data = build_fixture();
        let mut source = SliceSource::new(&data);
        let tok = Tokenizer::load(&mut source, 6).unwrap();
        assert_eq!(tok.vocab_size(), 6);
        assert!(tok.check_vocab_size(6).is_ok());
        assert!(tok.check_vocab_size(5).is_err());
    }

    #[test]
    fn merge_prefers_higher_score_pair() {
        let data = build_fixture();
        let mut source = SliceSource::new(&data);
        let tok = Tokenizer::load(&mut source, 6).unwrap();
        // "h" + "e" individually are tokens 2 and 3; "he" (token 5) has
        // the highest score among any possible merge, so "he" collapses
        // to one token, leaving "l" (token 4) separate.
        let ids = tok.encode("hel");
        assert_eq!(ids, alloc::vec![5, 4]);
    }

    #[test]
    fn unknown_character_falls_back_to_byte_tokens() {
        let data = build_fixture();
        let mut source = SliceSource::new(&data);
        let tok = Tokenizer::load(&mut source, 6).unwrap();
        let ids = tok.encode("z");
        assert_eq!(ids, alloc::vec!['z' as i32 + 3]);
    }
}
