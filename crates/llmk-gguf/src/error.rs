//! Error kinds surfaced by the plan builder and weight materializer.
//!
//! Bubbled unchanged up to the session driver, which is the only place
//! that turns one of these into a printed diagnostic line.

use alloc::string::String;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GgufError {
    #[error("not a recognized model format")]
    UnsupportedFormat,

    #[error("corrupt input at byte offset {offset}")]
    Corrupt { offset: u64 },

    #[error("ggml tensor type {0} is not in the supported set")]
    UnsupportedType(u32),

    #[error("missing hyperparameter: {0}")]
    MissingHyperparam(String),

    #[error("missing tensor: {0}")]
    MissingTensor(String),

    #[error("short read at offset {offset}: wanted {wanted} bytes, got {got}")]
    IoShort { offset: u64, wanted: usize, got: usize },

    #[error("shape mismatch for tensor {name}: expected {expected_rows}x{expected_cols}, found dims {dims:?}")]
    ShapeMismatch { name: String, expected_rows: u64, expected_cols: u64, dims: [u64; 2] },

    #[error("destination buffer too small: needed {needed}, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = core::result::Result<T, GgufError>;
