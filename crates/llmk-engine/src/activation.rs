//! Per-turn activation state (§3 "Activation state"): the generated-token
//! history and the scratch buffers the forward pass reuses across tokens.

use alloc::vec;
use alloc::vec::Vec;

pub struct Activations {
    /// Generated token history including BOS, `int32[seq_len+1]` per §3.
    pub tokens: Vec<i32>,
    pub x: Vec<f32>,
    pub xb: Vec<f32>,
    pub xb2: Vec<f32>,
    pub hb: Vec<f32>,
    pub hb2: Vec<f32>,
    pub q: Vec<f32>,
    pub att: Vec<f32>,
    pub logits: Vec<f32>,
}

impl Activations {
    pub fn new(dim: usize, hidden: usize, n_heads: usize, seq_len: usize, vocab: usize) -> Self {
        Activations {
            tokens: Vec::with_capacity(seq_len + 1),
            x: vec![0.0; dim],
            xb: vec![0.0; dim],
            xb2: vec![0.0; dim],
            hb: vec![0.0; hidden],
            hb2: vec![0.0; hidden],
            q: vec![0.0; dim],
            att: vec![0.0; n_heads * seq_len],
            logits: vec![0.0; vocab],
        }
    }

    /// `/reset` (§3 Lifecycle): clears generated history; scratch buffers
    /// are overwritten wholesale on the next step and need no zeroing.
    pub fn reset(&mut self) {
        self.tokens.clear();
    }
}
