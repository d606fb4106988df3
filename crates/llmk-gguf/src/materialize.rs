//! Weight materialization: stream tensors out of the file into either a
//! contiguous F32 layout (dequantizing on the fly) or a Q8_0 blob layout
//! that keeps matrices block-packed.

use alloc::vec;
use alloc::vec::Vec;

use crate::dequant::dequantize_row;
use crate::error::{GgufError, Result};
use crate::plan::Plan;
use crate::source::Source;
use crate::tensor::{GgmlType, LayerRole, TensorRef};

fn align4(x: usize) -> usize {
    (x + 3) & !3
}

fn align16_bytes(x: usize) -> usize {
    (x + 15) & !15
}

fn row_byte_len(ggml_type: GgmlType, cols: usize) -> usize {
    match ggml_type {
        GgmlType::F32 => cols * 4,
        GgmlType::F16 => cols * 2,
        other => (cols / 32) * other.block_bytes().expect("quantized type has a block size"),
    }
}

/// Read one 2-D tensor's `rows x cols` float values into `out[base..base+rows*cols]`
/// (row-major, `cols` fastest). Accepts the tensor either in direct
/// orientation (`dims[0]=cols, dims[1]=rows`) or transposed
/// (`dims[0]=rows, dims[1]=cols`) per §4.D.
fn materialize_matrix_f32<S: Source + ?Sized>(
    s: &mut S,
    data_start: u64,
    tensor: &TensorRef,
    name: &str,
    rows: u64,
    cols: u64,
    out: &mut [f32],
    base: usize,
    row_scratch: &mut Vec<u8>,
) -> Result<()> {
    s.seek(data_start + tensor.offset)?;
    let d0 = tensor.dims0();
    let d1 = tensor.dims1();

    if d0 == cols && d1 == rows {
        let rb = row_byte_len(tensor.ggml_type, cols as usize);
        row_scratch.resize(rb, 0);
        for r in 0..rows as usize {
            s.read_exact(&mut row_scratch[..rb])?;
            let dst = &mut out[base + r * cols as usize..base + (r + 1) * cols as usize];
            dequantize_row(tensor.ggml_type, &row_scratch[..rb], cols as usize, dst)?;
        }
        Ok(())
    } else if d0 == rows && d1 == cols {
        let rb = row_byte_len(tensor.ggml_type, rows as usize);
        row_scratch.resize(rb, 0);
        let mut col_scratch = vec![0.0f32; rows as usize];
        for c in 0..cols as usize {
            s.read_exact(&mut row_scratch[..rb])?;
            dequantize_row(tensor.ggml_type, &row_scratch[..rb], rows as usize, &mut col_scratch)?;
            for r in 0..rows as usize {
                out[base + r * cols as usize + c] = col_scratch[r];
            }
        }
        Ok(())
    } else {
        Err(GgufError::ShapeMismatch {
            name: name.into(),
            expected_rows: rows,
            expected_cols: cols,
            dims: [d0, d1],
        })
    }
}

fn materialize_vector_f32<S: Source + ?Sized>(
    s: &mut S,
    data_start: u64,
    tensor: &TensorRef,
    len: u64,
    out: &mut [f32],
    base: usize,
    row_scratch: &mut Vec<u8>,
) -> Result<()> {
    s.seek(data_start + tensor.offset)?;
    let rb = row_byte_len(tensor.ggml_type, len as usize);
    row_scratch.resize(rb, 0);
    s.read_exact(&mut row_scratch[..rb])?;
    dequantize_row(tensor.ggml_type, &row_scratch[..rb], len as usize, &mut out[base..base + len as usize])
}

/// Offsets (in `f32` element units) of each section of the contiguous F32
/// weight buffer, in the order fixed by the weight layout.
#[derive(Debug, Clone, Copy)]
pub struct F32Layout {
    pub tok_embd: usize,
    pub rms_att: usize,
    pub wq: usize,
    pub wk: usize,
    pub wv: usize,
    pub wo: usize,
    pub rms_ffn: usize,
    pub w1: usize,
    pub w2: usize,
    pub w3: usize,
    pub rms_final: usize,
    pub freq_cis_real: usize,
    pub freq_cis_imag: usize,
    pub wcls: Option<usize>,
    pub total_len: usize,
}

pub struct F32Weights {
    pub buf: Vec<f32>,
    pub layout: F32Layout,
}

impl F32Weights {
    pub fn token_row(&self, token: usize, dim: usize) -> &[f32] {
        let off = self.layout.tok_embd + token * dim;
        &self.buf[off..off + dim]
    }

    pub fn attn_norm(&self, layer: usize, dim: usize) -> &[f32] {
        let off = self.layout.rms_att + layer * dim;
        &self.buf[off..off + dim]
    }

    pub fn ffn_norm(&self, layer: usize, dim: usize) -> &[f32] {
        let off = self.layout.rms_ffn + layer * dim;
        &self.buf[off..off + dim]
    }

    pub fn wq(&self, layer: usize, dim: usize) -> &[f32] {
        let off = self.layout.wq + layer * dim * dim;
        &self.buf[off..off + dim * dim]
    }

    pub fn wo(&self, layer: usize, dim: usize) -> &[f32] {
        let off = self.layout.wo + layer * dim * dim;
        &self.buf[off..off + dim * dim]
    }

    pub fn wk(&self, layer: usize, kv_dim: usize, dim: usize) -> &[f32] {
        let off = self.layout.wk + layer * kv_dim * dim;
        &self.buf[off..off + kv_dim * dim]
    }

    pub fn wv(&self, layer: usize, kv_dim: usize, dim: usize) -> &[f32] {
        let off = self.layout.wv + layer * kv_dim * dim;
        &self.buf[off..off + kv_dim * dim]
    }

    pub fn w1(&self, layer: usize, hidden: usize, dim: usize) -> &[f32] {
        let off = self.layout.w1 + layer * hidden * dim;
        &self.buf[off..off + hidden * dim]
    }

    pub fn w2(&self, layer: usize, dim: usize, hidden: usize) -> &[f32] {
        let off = self.layout.w2 + layer * dim * hidden;
        &self.buf[off..off + dim * hidden]
    }

    pub fn w3(&self, layer: usize, hidden: usize, dim: usize) -> &[f32] {
        let off = self.layout.w3 + layer * hidden * dim;
        &self.buf[off..off + hidden * dim]
    }

    pub fn rms_final(&self, dim: usize) -> &[f32] {
        &self.buf[self.layout.rms_final..self.layout.rms_final + dim]
    }

    pub fn classifier_row(&self, token: usize, dim: usize) -> &[f32] {
        let base = self.layout.wcls.expect("classifier row requested but plan ties embeddings");
        let off = base + token * dim;
        &self.buf[off..off + dim]
    }
}

/// Materialize the F32 weight layout, dequantizing every source tensor on
/// the fly. Always available regardless of the tensor types in `plan`.
pub fn materialize_f32<S: Source + ?Sized>(s: &mut S, plan: &Plan) -> Result<F32Weights> {
    let h = plan.hparams;
    let (dim, hidden, n_layers, vocab) = (h.dim as usize, h.hidden as usize, h.n_layers as usize, h.vocab as usize);
    let kv_dim = h.kv_dim() as usize;
    let head_size = h.head_size() as usize;
    let seq_len = h.ctx as usize;
    let tie_embeddings = plan.tied_embeddings();

    let mut off = 0usize;
    let tok_embd = off;
    off = align4(off + vocab * dim);
    let rms_att = off;
    off = align4(off + n_layers * dim);
    let wq = off;
    off = align4(off + n_layers * dim * dim);
    let wk = off;
    off = align4(off + n_layers * kv_dim * dim);
    let wv = off;
    off = align4(off + n_layers * kv_dim * dim);
    let wo = off;
    off = align4(off + n_layers * dim * dim);
    let rms_ffn = off;
    off = align4(off + n_layers * dim);
    let w1 = off;
    off = align4(off + n_layers * hidden * dim);
    let w2 = off;
    off = align4(off + n_layers * dim * hidden);
    let w3 = off;
    off = align4(off + n_layers * hidden * dim);
    let rms_final = off;
    off = align4(off + dim);
    let freq_cis_real = off;
    off = align4(off + seq_len * head_size / 2);
    let freq_cis_imag = off;
    off = align4(off + seq_len * head_size / 2);
    let wcls = if tie_embeddings {
        None
    } else {
        let o = off;
        off = align4(off + vocab * dim);
        Some(o)
    };

    let layout = F32Layout {
        tok_embd,
        rms_att,
        wq,
        wk,
        wv,
        wo,
        rms_ffn,
        w1,
        w2,
        w3,
        rms_final,
        freq_cis_real,
        freq_cis_imag,
        wcls,
        total_len: off,
    };

    let mut buf = vec![0.0f32; layout.total_len];
    let mut row_scratch: Vec<u8> =
        Vec::with_capacity(core::cmp::max(plan.max_src_cols as usize * 4, plan.max_row_raw_bytes as usize));

    materialize_matrix_f32(
        s,
        plan.data_start,
        &plan.tok_embd,
        "token_embd.weight",
        vocab as u64,
        dim as u64,
        &mut buf,
        layout.tok_embd,
        &mut row_scratch,
    )?;

    for l in 0..n_layers {
        let layer = &plan.layers[l];
        materialize_vector_f32(
            s,
            plan.data_start,
            layer.get(LayerRole::AttnNorm),
            dim as u64,
            &mut buf,
            layout.rms_att + l * dim,
            &mut row_scratch,
        )?;
        materialize_matrix_f32(
            s,
            plan.data_start,
            layer.get(LayerRole::AttnQ),
            "attn_q",
            dim as u64,
            dim as u64,
            &mut buf,
            layout.wq + l * dim * dim,
            &mut row_scratch,
        )?;
        materialize_matrix_f32(
            s,
            plan.data_start,
            layer.get(LayerRole::AttnK),
            "attn_k",
            kv_dim as u64,
            dim as u64,
            &mut buf,
            layout.wk + l * kv_dim * dim,
            &mut row_scratch,
        )?;
        materialize_matrix_f32(
            s,
            plan.data_start,
            layer.get(LayerRole::AttnV),
            "attn_v",
            kv_dim as u64,
            dim as u64,
            &mut buf,
            layout.wv + l * kv_dim * dim,
            &mut row_scratch,
        )?;
        materialize_matrix_f32(
            s,
            plan.data_start,
            layer.get(LayerRole::AttnOutput),
            "attn_output",
            dim as u64,
            dim as u64,
            &mut buf,
            layout.wo + l * dim * dim,
            &mut row_scratch,
        )?;
        materialize_vector_f32(
            s,
            plan.data_start,
            layer.get(LayerRole::FfnNorm),
            dim as u64,
            &mut buf,
            layout.rms_ffn + l * dim,
            &mut row_scratch,
        )?;
        materialize_matrix_f32(
            s,
            plan.data_start,
            layer.get(LayerRole::FfnGate),
            "ffn_gate",
            hidden as u64,
            dim as u64,
            &mut buf,
            layout.w1 + l * hidden * dim,
            &mut row_scratch,
        )?;
        materialize_matrix_f32(
            s,
            plan.data_start,
            layer.get(LayerRole::FfnDown),
            "ffn_down",
            dim as u64,
            hidden as u64,
            &mut buf,
            layout.w2 + l * dim * hidden,
            &mut row_scratch,
        )?;
        materialize_matrix_f32(
            s,
            plan.data_start,
            layer.get(LayerRole::FfnUp),
            "ffn_up",
            hidden as u64,
            dim as u64,
            &mut buf,
            layout.w3 + l * hidden * dim,
            &mut row_scratch,
        )?;
    }

    materialize_vector_f32(
        s,
        plan.data_start,
        &plan.rms_final,
        dim as u64,
        &mut buf,
        layout.rms_final,
        &mut row_scratch,
    )?;

    // freq_cis_real/imag are left zeroed: RoPE is recomputed from position
    // at inference time. The slots are still reserved so the layout shape
    // matches what a consumer expecting the legacy buffer layout would see
    // (see the recorded decision on this in DESIGN.md).

    if let Some(wcls_off) = layout.wcls {
        materialize_matrix_f32(
            s,
            plan.data_start,
            &plan.output,
            "output.weight",
            vocab as u64,
            dim as u64,
            &mut buf,
            wcls_off,
            &mut row_scratch,
        )?;
    }

    Ok(F32Weights { buf, layout })
}

/// Byte offsets of each section of the Q8_0 blob buffer. Matrix sections
/// hold raw Q8_0 blocks; norm sections hold plain little-endian `f32`.
#[derive(Debug, Clone, Copy)]
pub struct Q8_0Layout {
    pub tok_embd: usize,
    pub rms_att: usize,
    pub wq: usize,
    pub wk: usize,
    pub wv: usize,
    pub wo: usize,
    pub rms_ffn: usize,
    pub w1: usize,
    pub w2: usize,
    pub w3: usize,
    pub rms_final: usize,
    pub freq_cis_real: usize,
    pub freq_cis_imag: usize,
    pub wcls: Option<usize>,
    pub total_len: usize,
}

pub struct Q8_0Weights {
    pub buf: Vec<u8>,
    pub layout: Q8_0Layout,
}

impl Q8_0Weights {
    pub fn blocks_at(&self, byte_offset: usize, n_blocks: usize) -> &[u8] {
        &self.buf[byte_offset..byte_offset + n_blocks * 34]
    }

    pub fn f32_at(&self, byte_offset: usize, len: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let b = &self.buf[byte_offset + i * 4..byte_offset + i * 4 + 4];
            out.push(f32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        }
        out
    }
}

/// Whether every 2-D tensor in `plan` is Q8_0, i.e. the Q8_0 blob path is
/// available for this model.
pub fn supports_q8_0(plan: &Plan) -> bool {
    let is_q8 = |t: &TensorRef| t.ggml_type == GgmlType::Q8_0;
    if !is_q8(&plan.tok_embd) {
        return false;
    }
    if plan.output.present && !is_q8(&plan.output) {
        return false;
    }
    for layer in &plan.layers {
        for role in [
            LayerRole::AttnQ,
            LayerRole::AttnK,
            LayerRole::AttnV,
            LayerRole::AttnOutput,
            LayerRole::FfnGate,
            LayerRole::FfnUp,
            LayerRole::FfnDown,
        ] {
            if !is_q8(layer.get(role)) {
                return false;
            }
        }
    }
    true
}

fn q8_0_matrix_bytes(rows: usize, cols: usize) -> usize {
    (cols / 32) * rows * 34
}

/// Write one direct-orientation Q8_0 matrix's raw blocks into
/// `buf[start..start+byte_len]`.
fn write_q8_0_matrix<S: Source + ?Sized>(
    s: &mut S,
    data_start: u64,
    tensor: &TensorRef,
    name: &str,
    rows: u64,
    cols: u64,
    buf: &mut [u8],
    start: usize,
) -> Result<()> {
    if tensor.dims0() != cols || tensor.dims1() != rows {
        return Err(GgufError::ShapeMismatch {
            name: name.into(),
            expected_rows: rows,
            expected_cols: cols,
            dims: [tensor.dims0(), tensor.dims1()],
        });
    }
    let byte_len = q8_0_matrix_bytes(rows as usize, cols as usize);
    s.seek(data_start + tensor.offset)?;
    s.read_exact(&mut buf[start..start + byte_len])
}

/// Dequantize a vector into `buf[start..start+len*4]` as little-endian `f32`.
fn write_f32_vector<S: Source + ?Sized>(
    s: &mut S,
    data_start: u64,
    tensor: &TensorRef,
    len: u64,
    buf: &mut [u8],
    start: usize,
) -> Result<()> {
    let mut scratch = vec![0.0f32; len as usize];
    let rb = row_byte_len(tensor.ggml_type, len as usize);
    let mut row_scratch = vec![0u8; rb];
    s.seek(data_start + tensor.offset)?;
    s.read_exact(&mut row_scratch)?;
    dequantize_row(tensor.ggml_type, &row_scratch, len as usize, &mut scratch)?;
    for (i, v) in scratch.iter().enumerate() {
        buf[start + i * 4..start + i * 4 + 4].copy_from_slice(&v.to_le_bytes());
    }
    Ok(())
}

/// Materialize the Q8_0 blob layout. Caller must have already checked
/// [`supports_q8_0`]; matrices are direct-orientation only (block
/// structure cannot be cheaply transposed). Section order matches the F32
/// layout; within a section, layers are stored contiguously so a layer's
/// slice is `base + layer * per_layer_bytes`.
pub fn materialize_q8_0<S: Source + ?Sized>(s: &mut S, plan: &Plan) -> Result<Q8_0Weights> {
    let h = plan.hparams;
    let (dim, hidden, n_layers, vocab) = (h.dim as usize, h.hidden as usize, h.n_layers as usize, h.vocab as usize);
    let kv_dim = h.kv_dim() as usize;
    let head_size = h.head_size() as usize;
    let seq_len = h.ctx as usize;
    let tie_embeddings = plan.tied_embeddings();

    let rms_vec_bytes = dim * 4;
    let wq_bytes = q8_0_matrix_bytes(dim, dim);
    let wk_bytes = q8_0_matrix_bytes(kv_dim, dim);
    let wv_bytes = wk_bytes;
    let wo_bytes = wq_bytes;
    let w1_bytes = q8_0_matrix_bytes(hidden, dim);
    let w2_bytes = q8_0_matrix_bytes(dim, hidden);
    let w3_bytes = w1_bytes;

    let mut off = 0usize;
    let tok_embd = off;
    off = align16_bytes(off + q8_0_matrix_bytes(vocab, dim));
    let rms_att = off;
    off = align16_bytes(off + n_layers * rms_vec_bytes);
    let wq = off;
    off = align16_bytes(off + n_layers * wq_bytes);
    let wk = off;
    off = align16_bytes(off + n_layers * wk_bytes);
    let wv = off;
    off = align16_bytes(off + n_layers * wv_bytes);
    let wo = off;
    off = align16_bytes(off + n_layers * wo_bytes);
    let rms_ffn = off;
    off = align16_bytes(off + n_layers * rms_vec_bytes);
    let w1 = off;
    off = align16_bytes(off + n_layers * w1_bytes);
    let w2 = off;
    off = align16_bytes(off + n_layers * w2_bytes);
    let w3 = off;
    off = align16_bytes(off + n_layers * w3_bytes);
    let rms_final = off;
    off = align16_bytes(off + rms_vec_bytes);
    let freq_cis_real = off;
    off = align16_bytes(off + (seq_len * head_size / 2) * 4);
    let freq_cis_imag = off;
    off = align16_bytes(off + (seq_len * head_size / 2) * 4);
    let wcls = if tie_embeddings {
        None
    } else {
        let o = off;
        off = align16_bytes(off + q8_0_matrix_bytes(vocab, dim));
        Some(o)
    };

    let mut buf = vec![0u8; off];

    write_q8_0_matrix(s, plan.data_start, &plan.tok_embd, "token_embd.weight", vocab as u64, dim as u64, &mut buf, tok_embd)?;

    for l in 0..n_layers {
        let layer = &plan.layers[l];
        write_f32_vector(s, plan.data_start, layer.get(LayerRole::AttnNorm), dim as u64, &mut buf, rms_att + l * rms_vec_bytes)?;
        write_q8_0_matrix(s, plan.data_start, layer.get(LayerRole::AttnQ), "attn_q", dim as u64, dim as u64, &mut buf, wq + l * wq_bytes)?;
        write_q8_0_matrix(s, plan.data_start, layer.get(LayerRole::AttnK), "attn_k", kv_dim as u64, dim as u64, &mut buf, wk + l * wk_bytes)?;
        write_q8_0_matrix(s, plan.data_start, layer.get(LayerRole::AttnV), "attn_v", kv_dim as u64, dim as u64, &mut buf, wv + l * wv_bytes)?;
        write_q8_0_matrix(s, plan.data_start, layer.get(LayerRole::AttnOutput), "attn_output", dim as u64, dim as u64, &mut buf, wo + l * wo_bytes)?;
        write_f32_vector(s, plan.data_start, layer.get(LayerRole::FfnNorm), dim as u64, &mut buf, rms_ffn + l * rms_vec_bytes)?;
        write_q8_0_matrix(s, plan.data_start, layer.get(LayerRole::FfnGate), "ffn_gate", hidden as u64, dim as u64, &mut buf, w1 + l * w1_bytes)?;
        write_q8_0_matrix(s, plan.data_start, layer.get(LayerRole::FfnDown), "ffn_down", dim as u64, hidden as u64, &mut buf, w2 + l * w2_bytes)?;
        write_q8_0_matrix(s, plan.data_start, layer.get(LayerRole::FfnUp), "ffn_up", hidden as u64, dim as u64, &mut buf, w3 + l * w3_bytes)?;
    }

    write_f32_vector(s, plan.data_start, &plan.rms_final, dim as u64, &mut buf, rms_final)?;

    // freq_cis_real/imag sections stay zeroed, same rationale as the F32 path.

    if let Some(wcls_off) = wcls {
        write_q8_0_matrix(s, plan.data_start, &plan.output, "output.weight", vocab as u64, dim as u64, &mut buf, wcls_off)?;
    }

    let layout = Q8_0Layout {
        tok_embd,
        rms_att,
        wq,
        wk,
        wv,
        wo,
        rms_ffn,
        w1,
        w2,
        w3,
        rms_final,
        freq_cis_real,
        freq_cis_imag,
        wcls,
        total_len: buf.len(),
    };

    Ok(Q8_0Weights { buf, layout })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header;
    use crate::plan::build_plan;
    use crate::source::SliceSource;

    /// A tiny, fully self-consistent GGUF fixture: `dim=4`, `hidden=4`,
    /// `n_layers=1`, `n_heads=2` (so `n_kv_heads` defaults to 2 and
    /// `kv_dim=dim`), `vocab=4`, tied classifier. Every tensor's bytes are
    /// filled with a distinct constant so materialized sections can be
    /// told apart by value alone.
    fn minimal_fixture() -> Vec<u8> {
        let mut kv = Vec::new();
        let mut kv_count = 0u64;
        let mut push_kv_u32 = |kv: &mut Vec<u8>, key: &str, value: u32| {
            kv.extend_from_slice(&(key.len() as u32).to_le_bytes());
            kv.extend_from_slice(key.as_bytes());
            kv.extend_from_slice(&4u32.to_le_bytes()); // ValueType::U32
            kv.extend_from_slice(&value.to_le_bytes());
            kv_count += 1;
        };
        push_kv_u32(&mut kv, "llama.embedding_length", 4);
        push_kv_u32(&mut kv, "llama.feed_forward_length", 4);
        push_kv_u32(&mut kv, "llama.block_count", 1);
        push_kv_u32(&mut kv, "llama.attention.head_count", 2);
        push_kv_u32(&mut kv, "llama.context_length", 8);
        push_kv_u32(&mut kv, "llama.vocab_size", 4);

        // (name, dims, byte_offset, fill_value, float_count)
        let tensors: [(&str, &[u64], u64, f32, usize); 11] = [
            ("token_embd.weight", &[4, 4], 0, 1.0, 16),
            ("output_norm.weight", &[4], 64, 2.0, 4),
            ("blk.0.attn_norm.weight", &[4], 80, 3.0, 4),
            ("blk.0.attn_q.weight", &[4, 4], 96, 4.0, 16),
            ("blk.0.attn_k.weight", &[4, 4], 160, 5.0, 16),
            ("blk.0.attn_v.weight", &[4, 4], 224, 6.0, 16),
            ("blk.0.attn_output.weight", &[4, 4], 288, 7.0, 16),
            ("blk.0.ffn_norm.weight", &[4], 352, 8.0, 4),
            ("blk.0.ffn_gate.weight", &[4, 4], 368, 9.0, 16),
            ("blk.0.ffn_up.weight", &[4, 4], 432, 10.0, 16),
            ("blk.0.ffn_down.weight", &[4, 4], 496, 11.0, 16),
        ];

        let mut tensor_table = Vec::new();
        for (name, dims, offset, _, _) in tensors {
            tensor_table.extend_from_slice(&(name.len() as u32).to_le_bytes());
            tensor_table.extend_from_slice(name.as_bytes());
            tensor_table.extend_from_slice(&(dims.len() as u32).to_le_bytes());
            for d in dims {
                tensor_table.extend_from_slice(&d.to_le_bytes());
            }
            tensor_table.extend_from_slice(&0u32.to_le_bytes()); // GgmlType::F32
            tensor_table.extend_from_slice(&offset.to_le_bytes());
        }

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&header::MAGIC);
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&(tensors.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&kv_count.to_le_bytes());
        bytes.extend_from_slice(&kv);
        bytes.extend_from_slice(&tensor_table);

        let mut data = vec![0u8; 560];
        for (_, _, offset, value, count) in tensors {
            for i in 0..count {
                let at = offset as usize + i * 4;
                data[at..at + 4].copy_from_slice(&value.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&data);
        bytes
    }

    #[test]
    fn materialize_f32_places_each_section_by_value() {
        let bytes = minimal_fixture();
        let mut src = SliceSource::new(&bytes);
        let plan = build_plan(&mut src).unwrap();
        assert!(plan.tied_embeddings());

        let weights = materialize_f32(&mut src, &plan).unwrap();
        assert_eq!(weights.token_row(0, 4), &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(weights.rms_final(4), &[2.0, 2.0, 2.0, 2.0]);
        assert_eq!(weights.attn_norm(0, 4), &[3.0, 3.0, 3.0, 3.0]);
        assert_eq!(weights.wq(0, 4), &[4.0; 16]);
        assert_eq!(weights.wk(0, 4, 4), &[5.0; 16]);
        assert_eq!(weights.wv(0, 4, 4), &[6.0; 16]);
        assert_eq!(weights.wo(0, 4), &[7.0; 16]);
        assert_eq!(weights.ffn_norm(0, 4), &[8.0, 8.0, 8.0, 8.0]);
        assert_eq!(weights.w1(0, 4, 4), &[9.0; 16]);
        assert_eq!(weights.w3(0, 4, 4), &[10.0; 16]);
        assert_eq!(weights.w2(0, 4, 4), &[11.0; 16]);
    }

    #[test]
    fn materialize_f32_reports_shape_mismatch() {
        let mut bytes = minimal_fixture();
        // Corrupt attn_q's recorded dims (at a known byte offset inside the
        // tensor table) so neither direct nor transposed orientation fits.
        let marker = b"blk.0.attn_q.weight";
        let pos = bytes.windows(marker.len()).position(|w| w == marker).unwrap();
        let dims_pos = pos + marker.len() + 4; // skip name + n_dims(u32)
        bytes[dims_pos..dims_pos + 8].copy_from_slice(&999u64.to_le_bytes());

        let mut src = SliceSource::new(&bytes);
        let plan = build_plan(&mut src).unwrap();
        let err = materialize_f32(&mut src, &plan).unwrap_err();
        assert!(matches!(err, GgufError::ShapeMismatch { .. }), "{err:?}");
    }

    #[test]
    fn supports_q8_0_requires_every_2d_tensor_to_be_q8_0() {
        let bytes = minimal_fixture();
        let mut src = SliceSource::new(&bytes);
        let plan = build_plan(&mut src).unwrap();
        // The fixture is all-F32, so the Q8_0 blob path isn't available.
        assert!(!supports_q8_0(&plan));

        let mut q8_plan = plan.clone();
        q8_plan.tok_embd.ggml_type = GgmlType::Q8_0;
        for role in LayerRole::ALL {
            if role != LayerRole::AttnNorm && role != LayerRole::FfnNorm {
                q8_plan.layers[0].roles[role.index()].ggml_type = GgmlType::Q8_0;
            }
        }
        assert!(supports_q8_0(&q8_plan));
    }
}
