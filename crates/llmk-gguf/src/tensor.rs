//! Tensor descriptor parsing and name-to-role classification.

use alloc::string::String;

use crate::error::{GgufError, Result};

/// The ggml storage kinds this loader supports. Numeric values match the
/// on-disk ggml type ids; anything else is `UnsupportedType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GgmlType {
    F32,
    F16,
    Q4_0,
    Q4_1,
    Q5_0,
    Q5_1,
    Q8_0,
}

impl GgmlType {
    pub fn from_u32(v: u32) -> Result<Self> {
        Ok(match v {
            0 => GgmlType::F32,
            1 => GgmlType::F16,
            2 => GgmlType::Q4_0,
            3 => GgmlType::Q4_1,
            6 => GgmlType::Q5_0,
            7 => GgmlType::Q5_1,
            8 => GgmlType::Q8_0,
            other => return Err(GgufError::UnsupportedType(other)),
        })
    }

    pub fn is_quantized(self) -> bool {
        !matches!(self, GgmlType::F32 | GgmlType::F16)
    }

    /// Packed byte size of one 32-element block, or `None` for F32/F16
    /// (which are not block-quantized).
    pub fn block_bytes(self) -> Option<usize> {
        match self {
            GgmlType::F32 | GgmlType::F16 => None,
            GgmlType::Q4_0 => Some(2 + 16),
            GgmlType::Q4_1 => Some(2 + 2 + 16),
            GgmlType::Q5_0 => Some(2 + 4 + 16),
            GgmlType::Q5_1 => Some(2 + 2 + 4 + 16),
            GgmlType::Q8_0 => Some(2 + 32),
        }
    }
}

/// A tensor's position and shape as recorded in the tensor descriptor
/// table. `offset` is relative to the data section.
#[derive(Debug, Clone, Copy)]
pub struct TensorRef {
    pub offset: u64,
    pub ggml_type: GgmlType,
    pub n_dims: u32,
    pub dims: [u64; 4],
    pub present: bool,
}

impl TensorRef {
    pub const MISSING: TensorRef = TensorRef {
        offset: 0,
        ggml_type: GgmlType::F32,
        n_dims: 0,
        dims: [0; 4],
        present: false,
    };

    /// `dims[0]`, the fastest-changing (and, for a 2-D tensor, column) axis.
    pub fn dims0(&self) -> u64 {
        self.dims[0]
    }

    pub fn dims1(&self) -> u64 {
        self.dims[1]
    }
}

/// One of the nine weight roles every transformer layer carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    AttnNorm,
    AttnQ,
    AttnK,
    AttnV,
    AttnOutput,
    FfnNorm,
    FfnGate,
    FfnUp,
    FfnDown,
}

impl LayerRole {
    pub const ALL: [LayerRole; 9] = [
        LayerRole::AttnNorm,
        LayerRole::AttnQ,
        LayerRole::AttnK,
        LayerRole::AttnV,
        LayerRole::AttnOutput,
        LayerRole::FfnNorm,
        LayerRole::FfnGate,
        LayerRole::FfnUp,
        LayerRole::FfnDown,
    ];

    pub fn index(self) -> usize {
        match self {
            LayerRole::AttnNorm => 0,
            LayerRole::AttnQ => 1,
            LayerRole::AttnK => 2,
            LayerRole::AttnV => 3,
            LayerRole::AttnOutput => 4,
            LayerRole::FfnNorm => 5,
            LayerRole::FfnGate => 6,
            LayerRole::FfnUp => 7,
            LayerRole::FfnDown => 8,
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "attn_norm" => LayerRole::AttnNorm,
            "attn_q" => LayerRole::AttnQ,
            "attn_k" => LayerRole::AttnK,
            "attn_v" => LayerRole::AttnV,
            "attn_output" => LayerRole::AttnOutput,
            "ffn_norm" => LayerRole::FfnNorm,
            "ffn_gate" => LayerRole::FfnGate,
            "ffn_up" => LayerRole::FfnUp,
            "ffn_down" => LayerRole::FfnDown,
            _ => return None,
        })
    }
}

/// The parsed meaning of a tensor name, or `Ignored` for names outside the
/// recognized alphabet (not fatal — the builder just skips them).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorRole {
    TokenEmbd,
    Output,
    RmsFinal,
    Layer(u32, LayerRole),
    Ignored,
}

/// Classify a tensor name per the `blk.<L>.<role>.weight` alphabet.
pub fn classify_name(name: &str) -> TensorRole {
    match name {
        "token_embd.weight" => return TensorRole::TokenEmbd,
        "output.weight" => return TensorRole::Output,
        "output_norm.weight" | "norm.weight" => return TensorRole::RmsFinal,
        _ => {}
    }

    if let Some(rest) = name.strip_prefix("blk.") {
        if let Some(dot) = rest.find('.') {
            let (layer_str, rest2) = rest.split_at(dot);
            let rest2 = &rest2[1..];
            if let (Ok(layer), Some(role_str)) = (layer_str.parse::<u32>(), rest2.strip_suffix(".weight")) {
                if let Some(role) = LayerRole::from_str(role_str) {
                    return TensorRole::Layer(layer, role);
                }
            }
        }
    }

    TensorRole::Ignored
}

pub fn owned_classify_name(name: &String) -> TensorRole {
    classify_name(name.as_str())
}
