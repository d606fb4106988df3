//! Math kernels for llmk-efi: SSE2 baseline, AVX2+FMA fast path, and the
//! Q8_0 blocked matmul that avoids dequantizing whole weight tensors into
//! RAM before multiplying.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod avx2;
pub mod dispatch;
pub mod q8_0;
pub mod sse2;

pub use dispatch::{ActiveKernel, KernelSelector, Kernels};
