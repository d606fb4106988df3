//! The GGUF plan builder: walks the header, KV table and tensor table once
//! and produces a [`Plan`] the materializer can stream weights against.

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use crate::error::{GgufError, Result};
use crate::header;
use crate::kv::{self, ValueType};
use crate::source::{self, Source};
use crate::tensor::{GgmlType, LayerRole, TensorRef, TensorRole};

/// Per-layer tensor references, indexed by [`LayerRole::index`].
#[derive(Debug, Clone, Copy)]
pub struct LayerRefs {
    pub roles: [TensorRef; 9],
}

impl LayerRefs {
    const EMPTY: LayerRefs = LayerRefs { roles: [TensorRef::MISSING; 9] };

    pub fn get(&self, role: LayerRole) -> &TensorRef {
        &self.roles[role.index()]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HyperParams {
    pub dim: u64,
    pub hidden: u64,
    pub n_layers: u64,
    pub n_heads: u64,
    pub n_kv_heads: u64,
    pub vocab: u64,
    pub ctx: u64,
}

impl HyperParams {
    pub fn head_size(&self) -> u64 {
        self.dim / self.n_heads
    }

    pub fn kv_dim(&self) -> u64 {
        self.dim * self.n_kv_heads / self.n_heads
    }
}

/// Everything the materializer needs to stream weights out of the file.
#[derive(Debug, Clone)]
pub struct Plan {
    pub version: u32,
    pub tensor_count: u64,
    pub kv_count: u64,
    pub data_start: u64,

    pub hparams: HyperParams,

    pub tok_embd: TensorRef,
    pub output: TensorRef,
    pub rms_final: TensorRef,
    pub layers: Vec<LayerRefs>,

    pub max_src_cols: u64,
    pub max_row_raw_bytes: u64,

    /// Diagnostic-only fields the original loader also collects; absent
    /// from a strict GGUF reading but cheap to carry for `/model info`.
    pub architecture: Option<String>,
    pub name: Option<String>,
    pub tokenizer_model: Option<String>,
}

impl Plan {
    /// Whether the classifier stage reuses the token embedding matrix
    /// (no separate `output.weight` tensor was recorded).
    pub fn tied_embeddings(&self) -> bool {
        !self.output.present
    }
}

fn raw_row_bytes(t: &TensorRef) -> u64 {
    match t.ggml_type {
        GgmlType::F32 => t.dims0() * 4,
        GgmlType::F16 => t.dims0() * 2,
        other => {
            let block_bytes = other.block_bytes().expect("quantized type has a block size") as u64;
            (t.dims0() / 32) * block_bytes
        }
    }
}

/// Build a [`Plan`] from a GGUF stream positioned at offset 0.
pub fn build_plan<S: Source + ?Sized>(s: &mut S) -> Result<Plan> {
    let header = header::read_header(s)?;

    let mut hparams = HyperParams::default();
    let mut architecture = None;
    let mut name = None;
    let mut tokenizer_model = None;
    let mut kv_heads_seen = false;

    for _ in 0..header.kv_count {
        let key_len = source::read_u32(s)?;
        if key_len == 0 || key_len > kv::MAX_KEY_LEN {
            return Err(GgufError::Corrupt { offset: s.pos() });
        }
        let mut key_bytes = vec![0u8; key_len as usize];
        s.read_exact(&mut key_bytes)?;
        let key = String::from_utf8(key_bytes).map_err(|_| GgufError::Corrupt { offset: s.pos() })?;

        let vtype_raw = source::read_u32(s)?;
        let vtype = ValueType::from_u32(vtype_raw).ok_or(GgufError::Corrupt { offset: s.pos() })?;

        match key.as_str() {
            "llama.embedding_length" => hparams.dim = kv::read_scalar_as_u64(s, vtype)?,
            "llama.feed_forward_length" => hparams.hidden = kv::read_scalar_as_u64(s, vtype)?,
            "llama.block_count" => hparams.n_layers = kv::read_scalar_as_u64(s, vtype)?,
            "llama.attention.head_count" => hparams.n_heads = kv::read_scalar_as_u64(s, vtype)?,
            "llama.attention.head_count_kv" => {
                hparams.n_kv_heads = kv::read_scalar_as_u64(s, vtype)?;
                kv_heads_seen = true;
            }
            "llama.vocab_size" => hparams.vocab = kv::read_scalar_as_u64(s, vtype)?,
            "llama.context_length" => hparams.ctx = kv::read_scalar_as_u64(s, vtype)?,
            "general.architecture" if vtype == ValueType::String => {
                architecture = Some(kv::read_string(s)?);
            }
            "general.name" if vtype == ValueType::String => {
                name = Some(kv::read_string(s)?);
            }
            "tokenizer.ggml.model" if vtype == ValueType::String => {
                tokenizer_model = Some(kv::read_string(s)?);
            }
            _ => kv::skip_value(s, vtype)?,
        }
    }

    if !kv_heads_seen || hparams.n_kv_heads == 0 {
        hparams.n_kv_heads = hparams.n_heads;
    }

    if hparams.dim == 0 {
        return Err(GgufError::MissingHyperparam("llama.embedding_length".to_string()));
    }
    if hparams.hidden == 0 {
        return Err(GgufError::MissingHyperparam("llama.feed_forward_length".to_string()));
    }
    if hparams.n_layers == 0 {
        return Err(GgufError::MissingHyperparam("llama.block_count".to_string()));
    }
    if hparams.n_heads == 0 {
        return Err(GgufError::MissingHyperparam("llama.attention.head_count".to_string()));
    }
    if hparams.ctx == 0 {
        return Err(GgufError::MissingHyperparam("llama.context_length".to_string()));
    }

    let mut tok_embd = TensorRef::MISSING;
    let mut output = TensorRef::MISSING;
    let mut rms_final = TensorRef::MISSING;
    let mut layers = vec![LayerRefs::EMPTY; hparams.n_layers as usize];

    let mut max_src_cols = 0u64;
    let mut max_row_raw_bytes = 0u64;

    for _ in 0..header.tensor_count {
        let name_len = source::read_u32(s)?;
        if name_len == 0 || name_len > 1024 * 1024 {
            return Err(GgufError::Corrupt { offset: s.pos() });
        }
        let mut name_bytes = vec![0u8; name_len as usize];
        s.read_exact(&mut name_bytes)?;
        let tname = String::from_utf8(name_bytes).map_err(|_| GgufError::Corrupt { offset: s.pos() })?;

        let n_dims = source::read_u32(s)?;
        if n_dims == 0 || n_dims > 16 {
            return Err(GgufError::Corrupt { offset: s.pos() });
        }
        let mut dims = [0u64; 4];
        let stored = core::cmp::min(n_dims, 4);
        for i in 0..stored {
            dims[i as usize] = source::read_u64(s)?;
        }
        for _ in stored..n_dims {
            let _ = source::read_u64(s)?;
        }

        let ggml_type_raw = source::read_u32(s)?;
        let ggml_type = GgmlType::from_u32(ggml_type_raw)?;
        let offset = source::read_u64(s)?;

        let tref = TensorRef { offset, ggml_type, n_dims, dims, present: true };

        max_src_cols = max_src_cols.max(tref.dims0());
        max_row_raw_bytes = max_row_raw_bytes.max(raw_row_bytes(&tref));

        match crate::tensor::classify_name(&tname) {
            TensorRole::TokenEmbd => tok_embd = tref,
            TensorRole::Output => output = tref,
            TensorRole::RmsFinal => rms_final = tref,
            TensorRole::Layer(layer, role) => {
                if let Some(slot) = layers.get_mut(layer as usize) {
                    slot.roles[role.index()] = tref;
                }
            }
            TensorRole::Ignored => {}
        }
    }

    let data_start = s.pos();

    if hparams.vocab == 0 {
        if !tok_embd.present {
            return Err(GgufError::MissingTensor("token_embd.weight".to_string()));
        }
        let a = tok_embd.dims0();
        let b = tok_embd.dims1();
        hparams.vocab = if a == hparams.dim && b == hparams.dim {
            return Err(GgufError::InvalidArgument(
                "token_embd dims are symmetric with llama.embedding_length; vocab size is ambiguous"
                    .to_string(),
            ));
        } else if a == hparams.dim {
            b
        } else if b == hparams.dim {
            a
        } else {
            return Err(GgufError::MissingHyperparam("llama.vocab_size".to_string()));
        };
    }
    if hparams.vocab == 0 {
        return Err(GgufError::MissingHyperparam("llama.vocab_size".to_string()));
    }

    if !tok_embd.present {
        return Err(GgufError::MissingTensor("token_embd.weight".to_string()));
    }
    if !rms_final.present {
        return Err(GgufError::MissingTensor("output_norm.weight".to_string()));
    }
    for (layer_idx, layer) in layers.iter().enumerate() {
        for role in LayerRole::ALL {
            if !layer.get(role).present {
                return Err(GgufError::MissingTensor(alloc::format!("blk.{layer_idx}.{role:?}")));
            }
        }
    }
    if hparams.dim % hparams.n_heads != 0 {
        return Err(GgufError::InvalidArgument(
            "embedding_length is not divisible by head_count".to_string(),
        ));
    }

    Ok(Plan {
        version: header.version,
        tensor_count: header.tensor_count,
        kv_count: header.kv_count,
        data_start,
        hparams,
        tok_embd,
        output,
        rms_final,
        layers,
        max_src_cols,
        max_row_raw_bytes,
        architecture,
        name,
        tokenizer_model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SliceSource;
    use alloc::vec::Vec;

    struct GgufBuilder {
        bytes: Vec<u8>,
        kv: Vec<u8>,
        tensors: Vec<u8>,
        tensor_count: u64,
        kv_count: u64,
    }

    impl GgufBuilder {
        fn new() -> Self {
            GgufBuilder { bytes: Vec::new(), kv: Vec::new(), tensors: Vec::new(), tensor_count: 0, kv_count: 0 }
        }

        fn kv_u32(mut self, key: &str, value: u32) -> Self {
            self.kv.extend_from_slice(&(key.len() as u32).to_le_bytes());
            self.kv.extend_from_slice(key.as_bytes());
            self.kv.extend_from_slice(&4u32.to_le_bytes()); // ValueType::U32
            self.kv.extend_from_slice(&value.to_le_bytes());
            self.kv_count += 1;
            self
        }

        fn tensor_f32(mut self, name: &str, dims: &[u64], offset: u64) -> Self {
            self.tensors.extend_from_slice(&(name.len() as u32).to_le_bytes());
            self.tensors.extend_from_slice(name.as_bytes());
            self.tensors.extend_from_slice(&(dims.len() as u32).to_le_bytes());
            for d in dims {
                self.tensors.extend_from_slice(&d.to_le_bytes());
            }
            self.tensors.extend_from_slice(&0u32.to_le_bytes()); // GgmlType::F32
            self.tensors.extend_from_slice(&offset.to_le_bytes());
            self.tensor_count += 1;
            self
        }

        fn finish(mut self) -> Vec<u8> {
            self.bytes.extend_from_slice(&header::MAGIC);
            self.bytes.extend_from_slice(&3u32.to_le_bytes());
            self.bytes.extend_from_slice(&self.tensor_count.to_le_bytes());
            self.bytes.extend_from_slice(&self.kv_count.to_le_bytes());
            self.bytes.extend_from_slice(&self.kv);
            self.bytes.extend_from_slice(&self.tensors);
            self.bytes
        }
    }

    fn minimal_gguf(vocab: Option<u32>) -> Vec<u8> {
        let mut b = GgufBuilder::new()
            .kv_u32("llama.embedding_length", 8)
            .kv_u32("llama.feed_forward_length", 16)
            .kv_u32("llama.block_count", 1)
            .kv_u32("llama.attention.head_count", 2)
            .kv_u32("llama.context_length", 64);
        if let Some(v) = vocab {
            b = b.kv_u32("llama.vocab_size", v);
        }
        b.tensor_f32("token_embd.weight", &[8, 32], 0)
            .tensor_f32("output_norm.weight", &[8], 0)
            .tensor_f32("blk.0.attn_norm.weight", &[8], 0)
            .tensor_f32("blk.0.attn_q.weight", &[8, 8], 0)
            .tensor_f32("blk.0.attn_k.weight", &[8, 8], 0)
            .tensor_f32("blk.0.attn_v.weight", &[8, 8], 0)
            .tensor_f32("blk.0.attn_output.weight", &[8, 8], 0)
            .tensor_f32("blk.0.ffn_norm.weight", &[8], 0)
            .tensor_f32("blk.0.ffn_gate.weight", &[8, 16], 0)
            .tensor_f32("blk.0.ffn_up.weight", &[8, 16], 0)
            .tensor_f32("blk.0.ffn_down.weight", &[16, 8], 0)
            .finish()
    }

    #[test]
    fn plan_well_formedness_holds_for_minimal_model() {
        let bytes = minimal_gguf(Some(32));
        let mut src = SliceSource::new(&bytes);
        let plan = build_plan(&mut src).unwrap();
        assert!(plan.tok_embd.present);
        assert!(plan.rms_final.present);
        assert_eq!(plan.layers.len(), 1);
        for role in LayerRole::ALL {
            assert!(plan.layers[0].get(role).present);
        }
        assert!(plan.hparams.vocab > 0);
        assert_eq!(plan.hparams.dim % plan.hparams.n_heads, 0);
    }

    #[test]
    fn infers_vocab_from_token_embd_dims() {
        // scenario 2: dim=288 from KV, tok_embd dims [288, 32000] -> vocab=32000
        let bytes = GgufBuilder::new()
            .kv_u32("llama.embedding_length", 288)
            .kv_u32("llama.feed_forward_length", 768)
            .kv_u32("llama.block_count", 1)
            .kv_u32("llama.attention.head_count", 6)
            .kv_u32("llama.context_length", 256)
            .tensor_f32("token_embd.weight", &[288, 32000], 0)
            .tensor_f32("output_norm.weight", &[288], 0)
            .tensor_f32("blk.0.attn_norm.weight", &[288], 0)
            .tensor_f32("blk.0.attn_q.weight", &[288, 288], 0)
            .tensor_f32("blk.0.attn_k.weight", &[288, 288], 0)
            .tensor_f32("blk.0.attn_v.weight", &[288, 288], 0)
            .tensor_f32("blk.0.attn_output.weight", &[288, 288], 0)
            .tensor_f32("blk.0.ffn_norm.weight", &[288], 0)
            .tensor_f32("blk.0.ffn_gate.weight", &[288, 768], 0)
            .tensor_f32("blk.0.ffn_up.weight", &[288, 768], 0)
            .tensor_f32("blk.0.ffn_down.weight", &[768, 288], 0)
            .finish();
        let mut src = SliceSource::new(&bytes);
        let plan = build_plan(&mut src).unwrap();
        assert_eq!(plan.hparams.vocab, 32000);
    }

    #[test]
    fn missing_layer_role_is_missing_tensor() {
        let bytes = GgufBuilder::new()
            .kv_u32("llama.embedding_length", 8)
            .kv_u32("llama.feed_forward_length", 16)
            .kv_u32("llama.block_count", 1)
            .kv_u32("llama.attention.head_count", 2)
            .kv_u32("llama.context_length", 64)
            .kv_u32("llama.vocab_size", 32)
            .tensor_f32("token_embd.weight", &[8, 32], 0)
            .tensor_f32("output_norm.weight", &[8], 0)
            .tensor_f32("blk.0.attn_norm.weight", &[8], 0)
            // attn_q missing
            .tensor_f32("blk.0.attn_k.weight", &[8, 8], 0)
            .tensor_f32("blk.0.attn_v.weight", &[8, 8], 0)
            .tensor_f32("blk.0.attn_output.weight", &[8, 8], 0)
            .tensor_f32("blk.0.ffn_norm.weight", &[8], 0)
            .tensor_f32("blk.0.ffn_gate.weight", &[8, 16], 0)
            .tensor_f32("blk.0.ffn_up.weight", &[8, 16], 0)
            .tensor_f32("blk.0.ffn_down.weight", &[16, 8], 0)
            .finish();
        let mut src = SliceSource::new(&bytes);
        assert!(matches!(build_plan(&mut src), Err(GgufError::MissingTensor(_))));
    }

    #[test]
    fn zero_key_len_is_corrupt() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&header::MAGIC);
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        let mut src = SliceSource::new(&bytes);
        assert!(matches!(build_plan(&mut src), Err(GgufError::Corrupt { .. })));
    }
}
