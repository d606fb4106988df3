//! AVX2+FMA math kernels.
//!
//! 8-wide `f32` lanes with fused multiply-add. Only installed into the
//! active [`crate::dispatch::Kernels`] after CPUID and XCR0 have both
//! confirmed AVX2 support (see `llmk-firmware::cpu`), so the inner
//! `#[target_feature]` functions are never reached on hardware that
//! doesn't support them.

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn dot_impl(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len();
    let ap = a.as_ptr();
    let bp = b.as_ptr();

    let mut acc = _mm256_setzero_ps();
    let chunks8 = len / 8;
    for i in 0..chunks8 {
        let off = i * 8;
        let av = _mm256_loadu_ps(ap.add(off));
        let bv = _mm256_loadu_ps(bp.add(off));
        acc = _mm256_fmadd_ps(av, bv, acc);
    }

    // Horizontal sum of the 8 lanes.
    let hi = _mm256_extractf128_ps(acc, 1);
    let lo = _mm256_castps256_ps128(acc);
    let sum4 = _mm_add_ps(hi, lo);
    let hi2 = _mm_movehl_ps(sum4, sum4);
    let sum2 = _mm_add_ps(sum4, hi2);
    let shuf = _mm_shuffle_ps(sum2, sum2, 1);
    let total = _mm_add_ss(sum2, shuf);
    let mut result = _mm_cvtss_f32(total);

    for i in (chunks8 * 8)..len {
        result += *ap.add(i) * *bp.add(i);
    }
    result
}

/// `Σ a[i]*b[i]` for `i in 0..a.len()`. `a` and `b` must have equal length.
///
/// # Safety (caller contract enforced by dispatch)
/// Only ever installed as the active kernel once the CPU has been
/// confirmed to support AVX2 and FMA; see [`crate::dispatch::Kernels::select`].
#[cfg(target_arch = "x86_64")]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    unsafe { dot_impl(a, b) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn axpy_impl(dst: &mut [f32], src: &[f32], alpha: f32) {
    let len = dst.len();
    let dp = dst.as_mut_ptr();
    let sp = src.as_ptr();
    let alpha_v = _mm256_set1_ps(alpha);

    let chunks8 = len / 8;
    for i in 0..chunks8 {
        let off = i * 8;
        let d = _mm256_loadu_ps(dp.add(off));
        let s = _mm256_loadu_ps(sp.add(off));
        _mm256_storeu_ps(dp.add(off), _mm256_fmadd_ps(s, alpha_v, d));
    }
    for i in (chunks8 * 8)..len {
        *dp.add(i) += alpha * *sp.add(i);
    }
}

/// `dst[i] += alpha * src[i]` for `i in 0..dst.len()`.
#[cfg(target_arch = "x86_64")]
pub fn axpy(dst: &mut [f32], src: &[f32], alpha: f32) {
    debug_assert_eq!(dst.len(), src.len());
    unsafe { axpy_impl(dst, src, alpha) }
}

#[cfg(not(target_arch = "x86_64"))]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    super::sse2::dot(a, b)
}

#[cfg(not(target_arch = "x86_64"))]
pub fn axpy(dst: &mut [f32], src: &[f32], alpha: f32) {
    super::sse2::axpy(dst, src, alpha)
}

#[cfg(all(test, target_arch = "x86_64"))]
mod tests {
    use super::*;

    #[test]
    fn avx2_dot_agrees_with_sse2_within_tolerance() {
        if !is_x86_feature_detected!("avx2") || !is_x86_feature_detected!("fma") {
            return;
        }
        let a: alloc::vec::Vec<f32> = (0..4096).map(|i| ((i * 7) % 113) as f32 * 0.01 - 5.0).collect();
        let b: alloc::vec::Vec<f32> = (0..4096).map(|i| ((i * 13) % 97) as f32 * 0.02 - 1.0).collect();
        let d_avx2 = dot(&a, &b);
        let d_sse2 = super::super::sse2::dot(&a, &b);
        let rel = (d_avx2 - d_sse2).abs() / d_sse2.abs().max(1.0);
        assert!(rel < 1e-5, "relative error {rel} too large");
    }
}
