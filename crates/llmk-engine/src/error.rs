//! Construction-time errors for the engine. Once a session is running,
//! an out-of-range index is a bug, not a recoverable error (§7: "Inside
//! the inference loop, there are no expected failures... should assert").
//! This type only covers the one place failure is still expected:
//! building an [`crate::transformer::Engine`] from a plan whose shape is
//! unusable for decoding.

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("hyperparameter {0} must be non-zero")]
    ZeroHyperparam(&'static str),
    #[error("dim {dim} is not a multiple of head_size {head_size}")]
    HeadSizeMismatch { dim: usize, head_size: usize },
    #[error("n_heads {n_heads} is not a multiple of n_kv_heads {n_kv_heads}")]
    GroupSizeMismatch { n_heads: usize, n_kv_heads: usize },
}

pub type Result<T> = core::result::Result<T, EngineError>;
