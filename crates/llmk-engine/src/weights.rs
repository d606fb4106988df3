//! A uniform view over the two weight materializations `llmk-gguf`
//! produces, so [`crate::transformer::Engine`] can run the same decoder
//! loop over either layout, dispatching each matmul to the kernel that
//! layout wants (§4.E: "On Q8_0 path, matmuls call the Q8_0 kernel;
//! everything else remains F32").

use alloc::vec::Vec;

use llmk_gguf::{F32Weights, Q8_0Weights};
use llmk_kernels::q8_0::{self, Block};
use llmk_kernels::Kernels;

pub enum WeightView<'a> {
    F32(&'a F32Weights),
    Q8_0(&'a Q8_0Weights),
}

/// Which per-layer 2-D matrix to read; callers pick one and hand it to
/// [`WeightView::matvec`] along with the shape for that role.
#[derive(Clone, Copy)]
pub enum MatrixRole {
    Wq,
    Wk,
    Wv,
    Wo,
    W1,
    W2,
    W3,
}

impl<'a> WeightView<'a> {
    pub fn token_row(&self, token: usize, dim: usize, out: &mut Vec<f32>) {
        match self {
            WeightView::F32(w) => {
                out.clear();
                out.extend_from_slice(w.token_row(token, dim));
            }
            WeightView::Q8_0(w) => {
                let n_blocks = dim / 32;
                dequant_row(w, w.layout.tok_embd + token * n_blocks * 34, n_blocks, out);
            }
        }
    }

    pub fn attn_norm(&self, layer: usize, dim: usize, out: &mut Vec<f32>) {
        match self {
            WeightView::F32(w) => {
                out.clear();
                out.extend_from_slice(w.attn_norm(layer, dim));
            }
            WeightView::Q8_0(w) => {
                out.clear();
                out.extend(w.f32_at(w.layout.rms_att + layer * dim * 4, dim));
            }
        }
    }

    pub fn ffn_norm(&self, layer: usize, dim: usize, out: &mut Vec<f32>) {
        match self {
            WeightView::F32(w) => {
                out.clear();
                out.extend_from_slice(w.ffn_norm(layer, dim));
            }
            WeightView::Q8_0(w) => {
                out.clear();
                out.extend(w.f32_at(w.layout.rms_ffn + layer * dim * 4, dim));
            }
        }
    }

    pub fn rms_final(&self, dim: usize, out: &mut Vec<f32>) {
        match self {
            WeightView::F32(w) => {
                out.clear();
                out.extend_from_slice(w.rms_final(dim));
            }
            WeightView::Q8_0(w) => {
                out.clear();
                out.extend(w.f32_at(w.layout.rms_final, dim));
            }
        }
    }

    /// `out[r] = dot(row_r, x)` for the `(rows, cols)` matrix named by
    /// `role` at layer `layer`.
    pub fn matvec(
        &self,
        role: MatrixRole,
        layer: usize,
        rows: usize,
        cols: usize,
        x: &[f32],
        out: &mut [f32],
        kernels: &Kernels,
        block_scratch: &mut Vec<Block>,
    ) {
        match self {
            WeightView::F32(w) => {
                let base = f32_section_base(w, role) + layer * rows * cols;
                for r in 0..rows {
                    let row = &w.buf[base + r * cols..base + (r + 1) * cols];
                    out[r] = kernels.dot(row, x);
                }
            }
            WeightView::Q8_0(w) => {
                let n_blocks = cols / 32;
                let row_bytes = n_blocks * 34;
                let base = q8_0_section_base(w, role) + layer * rows * row_bytes;
                for r in 0..rows {
                    block_scratch.clear();
                    let row_start = base + r * row_bytes;
                    for b in 0..n_blocks {
                        let off = row_start + b * 34;
                        block_scratch.push(Block::from_bytes(&w.buf[off..off + 34]));
                    }
                    out[r] = q8_0::dot(block_scratch, x);
                }
            }
        }
    }

    /// Classifier-stage row: the dedicated `output.weight` row when
    /// present, else the token embedding row (tied embeddings, §4.E step 3).
    pub fn classifier_row(&self, token: usize, dim: usize, out: &mut Vec<f32>) {
        match self {
            WeightView::F32(w) => {
                out.clear();
                if w.layout.wcls.is_some() {
                    out.extend_from_slice(w.classifier_row(token, dim));
                } else {
                    out.extend_from_slice(w.token_row(token, dim));
                }
            }
            WeightView::Q8_0(w) => {
                let n_blocks = dim / 32;
                let byte_off = match w.layout.wcls {
                    Some(base) => base + token * n_blocks * 34,
                    None => w.layout.tok_embd + token * n_blocks * 34,
                };
                dequant_row(w, byte_off, n_blocks, out);
            }
        }
    }
}

fn f32_section_base(w: &F32Weights, role: MatrixRole) -> usize {
    match role {
        MatrixRole::Wq => w.layout.wq,
        MatrixRole::Wk => w.layout.wk,
        MatrixRole::Wv => w.layout.wv,
        MatrixRole::Wo => w.layout.wo,
        MatrixRole::W1 => w.layout.w1,
        MatrixRole::W2 => w.layout.w2,
        MatrixRole::W3 => w.layout.w3,
    }
}

fn q8_0_section_base(w: &Q8_0Weights, role: MatrixRole) -> usize {
    match role {
        MatrixRole::Wq => w.layout.wq,
        MatrixRole::Wk => w.layout.wk,
        MatrixRole::Wv => w.layout.wv,
        MatrixRole::Wo => w.layout.wo,
        MatrixRole::W1 => w.layout.w1,
        MatrixRole::W2 => w.layout.w2,
        MatrixRole::W3 => w.layout.w3,
    }
}

fn dequant_row(w: &Q8_0Weights, byte_off: usize, n_blocks: usize, out: &mut Vec<f32>) {
    out.clear();
    for b in 0..n_blocks {
        let off = byte_off + b * 34;
        let block = Block::from_bytes(&w.buf[off..off + 34]);
        let scale = block.d.to_f32();
        for i in 0..32 {
            out.push(block.qs[i] as f32 * scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use half::f16;
    use llmk_gguf::{F32Layout, Q8_0Layout};
    use llmk_kernels::KernelSelector;

    fn f32_weights() -> F32Weights {
        // dim=4, one layer, tied embeddings (wcls = None). Each section
        // lives at a distinct base so misreads show up as wrong values.
        let layout = F32Layout {
            tok_embd: 0,
            rms_att: 8,
            wq: 12,
            wk: 28,
            wv: 44,
            wo: 60,
            rms_ffn: 76,
            w1: 80,
            w2: 96,
            w3: 112,
            rms_final: 128,
            freq_cis_real: 132,
            freq_cis_imag: 132,
            wcls: None,
            total_len: 132,
        };
        let mut buf = vec![0.0f32; layout.total_len];
        buf[layout.tok_embd..layout.tok_embd + 8].copy_from_slice(&[1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
        buf[layout.rms_att..layout.rms_att + 4].copy_from_slice(&[3.0; 4]);
        for v in &mut buf[layout.wq..layout.wq + 16] {
            *v = 4.0;
        }
        buf[layout.rms_final..layout.rms_final + 4].copy_from_slice(&[5.0; 4]);
        F32Weights { buf, layout }
    }

    fn q8_0_block_bytes(scale: f32, value: i8) -> [u8; 34] {
        let mut bytes = [0u8; 34];
        bytes[0..2].copy_from_slice(&f16::from_f32(scale).to_le_bytes());
        for i in 0..32 {
            bytes[2 + i] = value as u8;
        }
        bytes
    }

    fn q8_0_weights() -> Q8_0Weights {
        // dim=32 (one block per row), one layer.
        let layout = Q8_0Layout {
            tok_embd: 0,
            rms_att: 34 * 2,
            wq: 34 * 2 + 32 * 4,
            wk: 34 * 3 + 32 * 4,
            wv: 34 * 4 + 32 * 4,
            wo: 34 * 5 + 32 * 4,
            rms_ffn: 34 * 6 + 32 * 4,
            w1: 34 * 6 + 32 * 8,
            w2: 34 * 7 + 32 * 8,
            w3: 34 * 8 + 32 * 8,
            rms_final: 34 * 9 + 32 * 8,
            freq_cis_real: 34 * 9 + 32 * 12,
            freq_cis_imag: 34 * 9 + 32 * 12,
            wcls: None,
            total_len: 34 * 9 + 32 * 12,
        };
        let mut buf = vec![0u8; layout.total_len];
        buf[layout.tok_embd..layout.tok_embd + 34].copy_from_slice(&q8_0_block_bytes(1.0, 2));
        buf[layout.tok_embd + 34..layout.tok_embd + 68].copy_from_slice(&q8_0_block_bytes(1.0, 3));
        buf[layout.rms_att..layout.rms_att + 32 * 4]
            .copy_from_slice(bytemuck_f32_le(&[6.0; 32]).as_slice());
        buf[layout.wq..layout.wq + 34].copy_from_slice(&q8_0_block_bytes(2.0, 1));
        Q8_0Weights { buf, layout }
    }

    fn bytemuck_f32_le(vals: &[f32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(vals.len() * 4);
        for v in vals {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    #[test]
    fn f32_view_reads_each_section_by_base() {
        let w = f32_weights();
        let view = WeightView::F32(&w);
        let mut out = Vec::new();

        view.token_row(1, 4, &mut out);
        assert_eq!(out, &[2.0, 2.0, 2.0, 2.0]);

        view.attn_norm(0, 4, &mut out);
        assert_eq!(out, &[3.0, 3.0, 3.0, 3.0]);

        view.rms_final(4, &mut out);
        assert_eq!(out, &[5.0, 5.0, 5.0, 5.0]);
    }

    #[test]
    fn f32_view_matvec_dots_each_row() {
        let w = f32_weights();
        let view = WeightView::F32(&w);
        let kernels = Kernels::select(KernelSelector::ForceSse2, false);
        let x = [1.0f32, 1.0, 1.0, 1.0];
        let mut out = [0.0f32; 4];
        let mut scratch = Vec::new();
        view.matvec(MatrixRole::Wq, 0, 4, 4, &x, &mut out, &kernels, &mut scratch);
        assert_eq!(out, [16.0, 16.0, 16.0, 16.0]);
    }

    #[test]
    fn f32_view_classifier_row_falls_back_to_token_row_when_untied_weight_absent() {
        let w = f32_weights();
        let view = WeightView::F32(&w);
        let mut out = Vec::new();
        view.classifier_row(0, 4, &mut out);
        assert_eq!(out, &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn q8_0_view_dequantizes_token_row() {
        let w = q8_0_weights();
        let view = WeightView::Q8_0(&w);
        let mut out = Vec::new();
        view.token_row(1, 32, &mut out);
        assert_eq!(out.len(), 32);
        assert!(out.iter().all(|&v| v == 3.0));
    }

    #[test]
    fn q8_0_view_attn_norm_reads_raw_f32_span() {
        let w = q8_0_weights();
        let view = WeightView::Q8_0(&w);
        let mut out = Vec::new();
        view.attn_norm(0, 32, &mut out);
        assert!(out.iter().all(|&v| v == 6.0));
    }

    #[test]
    fn q8_0_view_matvec_dots_blocked_row() {
        let w = q8_0_weights();
        let view = WeightView::Q8_0(&w);
        let kernels = Kernels::select(KernelSelector::ForceSse2, false);
        let x = [1.0f32; 32];
        let mut out = [0.0f32; 1];
        let mut scratch = Vec::new();
        view.matvec(MatrixRole::Wq, 0, 1, 32, &x, &mut out, &kernels, &mut scratch);
        assert_eq!(out[0], 2.0 * 1.0 * 32.0);
    }
}
