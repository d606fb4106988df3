//! Runtime kernel selection.
//!
//! The SSE2/AVX2 choice is made once, at model load, and stored as a pair
//! of function pointers rather than branched on at every call site (see
//! design notes: "implement as a function-pointer pair chosen at model
//! load, not a per-call branch").

use crate::{avx2, sse2};

/// Caller-requested kernel preference.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum KernelSelector {
    /// Use AVX2 iff both CPUID and XCR0 confirmed support at boot.
    #[default]
    Auto,
    ForceSse2,
    ForceAvx2,
}

/// Which kernel a [`Kernels`] instance actually resolved to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActiveKernel {
    Sse2,
    Avx2,
}

type DotFn = fn(&[f32], &[f32]) -> f32;
type AxpyFn = fn(&mut [f32], &[f32], f32);

/// A resolved, callable pair of dot/axpy kernels.
#[derive(Clone, Copy)]
pub struct Kernels {
    pub active: ActiveKernel,
    dot_fn: DotFn,
    axpy_fn: AxpyFn,
}

impl Kernels {
    /// Resolve `selector` against the CPU capabilities detected at boot.
    /// `avx2_supported` must already account for both CPUID leaf 7 and the
    /// XCR0 YMM-state check (§4.A) — this function does not re-probe.
    pub fn select(selector: KernelSelector, avx2_supported: bool) -> Self {
        let use_avx2 = match selector {
            KernelSelector::ForceSse2 => false,
            KernelSelector::ForceAvx2 => true,
            KernelSelector::Auto => avx2_supported,
        };
        if use_avx2 {
            Kernels { active: ActiveKernel::Avx2, dot_fn: avx2::dot, axpy_fn: avx2::axpy }
        } else {
            Kernels { active: ActiveKernel::Sse2, dot_fn: sse2::dot, axpy_fn: sse2::axpy }
        }
    }

    #[inline]
    pub fn dot(&self, a: &[f32], b: &[f32]) -> f32 {
        (self.dot_fn)(a, b)
    }

    #[inline]
    pub fn axpy(&self, dst: &mut [f32], src: &[f32], alpha: f32) {
        (self.axpy_fn)(dst, src, alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_sse2_never_resolves_to_avx2() {
        let k = Kernels::select(KernelSelector::ForceSse2, true);
        assert_eq!(k.active, ActiveKernel::Sse2);
    }

    #[test]
    fn auto_without_support_falls_back_to_sse2() {
        let k = Kernels::select(KernelSelector::Auto, false);
        assert_eq!(k.active, ActiveKernel::Sse2);
    }

    #[test]
    fn auto_with_support_picks_avx2() {
        let k = Kernels::select(KernelSelector::Auto, true);
        assert_eq!(k.active, ActiveKernel::Avx2);
    }
}
