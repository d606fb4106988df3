//! The decoder stack (§4.E "Transformer Engine"): one token in, one
//! logits vector out, with grouped-query attention over a persistent KV
//! cache.
//!
//! Grounded in control flow on the teacher's
//! `kernel/src/jarvis/inference.rs::InferenceEngine::forward_one`
//! (embed → per-layer attention+FFN → final norm → output projection),
//! generalized to GQA, RoPE, and the two weight layouts `llmk-gguf`
//! produces.

use alloc::vec::Vec;

use llmk_gguf::Plan;
use llmk_kernels::q8_0::Block;
use llmk_kernels::Kernels;

use crate::activation::Activations;
use crate::error::{EngineError, Result};
use crate::kv_cache::KvCache;
use crate::math::{rmsnorm, silu, softmax};
use crate::rope;
use crate::weights::{MatrixRole, WeightView};

pub struct Dims {
    pub dim: usize,
    pub hidden: usize,
    pub n_layers: usize,
    pub n_heads: usize,
    pub n_kv_heads: usize,
    pub kv_dim: usize,
    pub head_size: usize,
    pub vocab: usize,
    pub seq_len: usize,
}

impl Dims {
    pub fn from_plan(plan: &Plan) -> Self {
        let h = plan.hparams;
        Dims {
            dim: h.dim as usize,
            hidden: h.hidden as usize,
            n_layers: h.n_layers as usize,
            n_heads: h.n_heads as usize,
            n_kv_heads: h.n_kv_heads as usize,
            kv_dim: h.kv_dim() as usize,
            head_size: h.head_size() as usize,
            vocab: h.vocab as usize,
            seq_len: h.ctx as usize,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.n_heads == 0 {
            return Err(EngineError::ZeroHyperparam("n_heads"));
        }
        if self.n_kv_heads == 0 {
            return Err(EngineError::ZeroHyperparam("n_kv_heads"));
        }
        if self.seq_len == 0 {
            return Err(EngineError::ZeroHyperparam("ctx"));
        }
        if self.dim % self.head_size != 0 || self.head_size == 0 {
            return Err(EngineError::HeadSizeMismatch { dim: self.dim, head_size: self.head_size });
        }
        if self.n_heads % self.n_kv_heads != 0 {
            return Err(EngineError::GroupSizeMismatch { n_heads: self.n_heads, n_kv_heads: self.n_kv_heads });
        }
        Ok(())
    }
}

pub struct Engine<'a> {
    pub dims: Dims,
    weights: WeightView<'a>,
    kernels: Kernels,
    pub kv_cache: KvCache,
    pub act: Activations,
    block_scratch: Vec<Block>,
    row_scratch: Vec<f32>,
    attn_out: Vec<f32>,
}

impl<'a> Engine<'a> {
    pub fn new(plan: &Plan, weights: WeightView<'a>, kernels: Kernels) -> Result<Self> {
        let dims = Dims::from_plan(plan);
        dims.validate()?;
        let kv_cache = KvCache::new(dims.n_layers, dims.seq_len, dims.kv_dim);
        let act = Activations::new(dims.dim, dims.hidden, dims.n_heads, dims.seq_len, dims.vocab);
        Ok(Engine {
            block_scratch: Vec::with_capacity(dims.dim.max(dims.hidden) / 32),
            row_scratch: Vec::with_capacity(dims.dim),
            attn_out: alloc::vec![0.0; dims.dim],
            dims,
            weights,
            kernels,
            kv_cache,
            act,
        })
    }

    pub fn reset(&mut self) {
        self.kv_cache.clear();
        self.act.reset();
    }

    /// Run one decoder step for `token` at position `pos`, returning the
    /// logits vector (§4.E). `pos` must be `< seq_len`.
    pub fn step(&mut self, token: usize, pos: usize) -> &[f32] {
        let d = &self.dims;

        // 1. Embed.
        self.weights.token_row(token, d.dim, &mut self.row_scratch);
        self.act.x.copy_from_slice(&self.row_scratch);

        for l in 0..d.n_layers {
            // 2a. Pre-attention RMSNorm.
            self.weights.attn_norm(l, d.dim, &mut self.row_scratch);
            rmsnorm(&mut self.act.xb, &self.act.x, &self.row_scratch);

            // 2b. QKV projections.
            self.weights.matvec(
                MatrixRole::Wq,
                l,
                d.dim,
                d.dim,
                &self.act.xb,
                &mut self.act.q,
                &self.kernels,
                &mut self.block_scratch,
            );
            {
                let k_slot = self.kv_cache.key_mut(l, pos);
                self.weights.matvec(
                    MatrixRole::Wk,
                    l,
                    d.kv_dim,
                    d.dim,
                    &self.act.xb,
                    k_slot,
                    &self.kernels,
                    &mut self.block_scratch,
                );
            }
            {
                let v_slot = self.kv_cache.value_mut(l, pos);
                self.weights.matvec(
                    MatrixRole::Wv,
                    l,
                    d.kv_dim,
                    d.dim,
                    &self.act.xb,
                    v_slot,
                    &self.kernels,
                    &mut self.block_scratch,
                );
            }

            // 2c. RoPE on q (n_heads groups) and on the freshly written k (n_kv_heads groups).
            rope::apply(&mut self.act.q, d.n_heads, d.head_size, pos);
            rope::apply(self.kv_cache.key_mut(l, pos), d.n_kv_heads, d.head_size, pos);

            // 2d. Grouped-query attention.
            self.attn_out.iter_mut().for_each(|v| *v = 0.0);
            let group = d.n_heads / d.n_kv_heads.max(1);
            for h in 0..d.n_heads {
                let hk = h / group.max(1);
                let q_h = &self.act.q[h * d.head_size..(h + 1) * d.head_size];
                let scores = &mut self.act.att[h * d.seq_len..h * d.seq_len + pos + 1];
                for (t, slot) in scores.iter_mut().enumerate() {
                    let k_t = &self.kv_cache.key(l, t)[hk * d.head_size..(hk + 1) * d.head_size];
                    *slot = self.kernels.dot(q_h, k_t) / libm::sqrtf(d.head_size as f32);
                }
                softmax(scores);
                let out_h = &mut self.attn_out[h * d.head_size..(h + 1) * d.head_size];
                for (t, &w) in scores.iter().enumerate() {
                    let v_t = &self.kv_cache.value(l, t)[hk * d.head_size..(hk + 1) * d.head_size];
                    for i in 0..d.head_size {
                        out_h[i] += w * v_t[i];
                    }
                }
            }

            // 2e. Output projection + residual.
            self.weights.matvec(
                MatrixRole::Wo,
                l,
                d.dim,
                d.dim,
                &self.attn_out,
                &mut self.act.xb2,
                &self.kernels,
                &mut self.block_scratch,
            );
            for i in 0..d.dim {
                self.act.x[i] += self.act.xb2[i];
            }

            // 2f. Pre-FFN RMSNorm.
            self.weights.ffn_norm(l, d.dim, &mut self.row_scratch);
            rmsnorm(&mut self.act.xb, &self.act.x, &self.row_scratch);

            // 2g. SwiGLU: hb = silu(W1 . xb), hb2 = W3 . xb, hb *= hb2.
            self.weights.matvec(
                MatrixRole::W1,
                l,
                d.hidden,
                d.dim,
                &self.act.xb,
                &mut self.act.hb,
                &self.kernels,
                &mut self.block_scratch,
            );
            self.weights.matvec(
                MatrixRole::W3,
                l,
                d.hidden,
                d.dim,
                &self.act.xb,
                &mut self.act.hb2,
                &self.kernels,
                &mut self.block_scratch,
            );
            for i in 0..d.hidden {
                self.act.hb[i] = silu(self.act.hb[i]) * self.act.hb2[i];
            }

            // 2h. Down projection + residual.
            self.weights.matvec(
                MatrixRole::W2,
                l,
                d.dim,
                d.hidden,
                &self.act.hb,
                &mut self.act.xb2,
                &self.kernels,
                &mut self.block_scratch,
            );
            for i in 0..d.dim {
                self.act.x[i] += self.act.xb2[i];
            }
        }

        // 3. Final norm + classifier.
        self.weights.rms_final(d.dim, &mut self.row_scratch);
        rmsnorm(&mut self.act.xb, &self.act.x, &self.row_scratch);

        for t in 0..d.vocab {
            self.weights.classifier_row(t, d.dim, &mut self.row_scratch);
            self.act.logits[t] = self.kernels.dot(&self.row_scratch, &self.act.xb);
        }

        &self.act.logits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn tiny_plan() -> Plan {
        use llmk_gguf::plan::{HyperParams, LayerRefs};
        use llmk_gguf::tensor::TensorRef;
        Plan {
            version: 3,
            tensor_count: 0,
            kv_count: 0,
            data_start: 0,
            hparams: HyperParams { dim: 4, hidden: 8, n_layers: 1, n_heads: 2, n_kv_heads: 2, vocab: 3, ctx: 8 },
            tok_embd: TensorRef::MISSING,
            output: TensorRef::MISSING,
            rms_final: TensorRef::MISSING,
            layers: vec![LayerRefs { roles: [TensorRef::MISSING; 9] }],
            max_src_cols: 0,
            max_row_raw_bytes: 0,
            architecture: None,
            name: None,
            tokenizer_model: None,
        }
    }

    #[test]
    fn dims_from_plan_computes_derived_fields() {
        let plan = tiny_plan();
        let d = Dims::from_plan(&plan);
        assert_eq!(d.head_size, 2);
        assert_eq!(d.kv_dim, 4);
    }

    // Full forward-pass integration coverage (embed → attention → FFN →
    // classifier, both weight layouts) lives in the decoder tests, which
    // exercise `Engine::step` end to end against a hand-built Q8_0 plan.

    #[test]
    fn validate_rejects_zero_n_heads() {
        let mut plan = tiny_plan();
        plan.hparams.n_heads = 0;
        let d = Dims::from_plan(&plan);
        assert!(matches!(d.validate(), Err(EngineError::ZeroHyperparam("n_heads"))));
    }

    #[test]
    fn validate_rejects_zero_ctx() {
        let mut plan = tiny_plan();
        plan.hparams.ctx = 0;
        let d = Dims::from_plan(&plan);
        assert!(matches!(d.validate(), Err(EngineError::ZeroHyperparam("ctx"))));
    }

    #[test]
    fn validate_rejects_dim_not_multiple_of_head_size() {
        let mut plan = tiny_plan();
        plan.hparams.dim = 5;
        let d = Dims::from_plan(&plan);
        assert!(matches!(d.validate(), Err(EngineError::HeadSizeMismatch { .. })));
    }

    #[test]
    fn validate_rejects_n_heads_not_multiple_of_n_kv_heads() {
        let mut plan = tiny_plan();
        plan.hparams.n_heads = 3;
        plan.hparams.n_kv_heads = 2;
        let d = Dims::from_plan(&plan);
        assert!(matches!(d.validate(), Err(EngineError::GroupSizeMismatch { .. })));
    }

    #[test]
    fn validate_accepts_well_formed_dims() {
        let plan = tiny_plan();
        let d = Dims::from_plan(&plan);
        assert!(d.validate().is_ok());
    }
}
