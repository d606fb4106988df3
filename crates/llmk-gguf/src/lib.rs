//! GGUF parsing and weight materialization for llmk-efi.
//!
//! `plan::build_plan` walks the header, KV table and tensor table once and
//! produces a [`plan::Plan`]; `materialize::materialize_f32` /
//! `materialize::materialize_q8_0` then stream tensors out of the file
//! against that plan into one of the two weight layouts described in §3.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod dequant;
pub mod error;
pub mod header;
pub mod kv;
pub mod materialize;
pub mod plan;
pub mod source;
pub mod tensor;

pub use error::{GgufError, Result};
pub use materialize::{materialize_f32, materialize_q8_0, supports_q8_0, F32Layout, F32Weights, Q8_0Layout, Q8_0Weights};
pub use plan::{build_plan, HyperParams, LayerRefs, Plan};
pub use source::Source;
pub use tensor::{GgmlType, LayerRole, TensorRef, TensorRole};
