//! SSE2 math kernels.
//!
//! 4-wide `f32` lanes, four independent accumulators for instruction-level
//! parallelism, scalar tail for lengths not divisible by 16. SSE2 is the
//! x86_64 baseline, so these are always safe to call.

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

/// `Σ a[i]*b[i]` for `i in 0..a.len()`. `a` and `b` must have equal length.
#[cfg(target_arch = "x86_64")]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let len = a.len();
    unsafe {
        let ap = a.as_ptr();
        let bp = b.as_ptr();

        let mut acc0 = _mm_setzero_ps();
        let mut acc1 = _mm_setzero_ps();
        let mut acc2 = _mm_setzero_ps();
        let mut acc3 = _mm_setzero_ps();

        let chunks16 = len / 16;
        for i in 0..chunks16 {
            let base = i * 16;
            acc0 = _mm_add_ps(acc0, _mm_mul_ps(_mm_loadu_ps(ap.add(base)), _mm_loadu_ps(bp.add(base))));
            acc1 = _mm_add_ps(acc1, _mm_mul_ps(_mm_loadu_ps(ap.add(base + 4)), _mm_loadu_ps(bp.add(base + 4))));
            acc2 = _mm_add_ps(acc2, _mm_mul_ps(_mm_loadu_ps(ap.add(base + 8)), _mm_loadu_ps(bp.add(base + 8))));
            acc3 = _mm_add_ps(acc3, _mm_mul_ps(_mm_loadu_ps(ap.add(base + 12)), _mm_loadu_ps(bp.add(base + 12))));
        }
        acc0 = _mm_add_ps(acc0, acc1);
        acc2 = _mm_add_ps(acc2, acc3);
        acc0 = _mm_add_ps(acc0, acc2);

        let rem_start = chunks16 * 16;
        let rem4 = (len - rem_start) / 4;
        for i in 0..rem4 {
            let off = rem_start + i * 4;
            acc0 = _mm_add_ps(acc0, _mm_mul_ps(_mm_loadu_ps(ap.add(off)), _mm_loadu_ps(bp.add(off))));
        }

        let hi = _mm_movehl_ps(acc0, acc0);
        let sum = _mm_add_ps(acc0, hi);
        let shuf = _mm_shuffle_ps(sum, sum, 1);
        let total = _mm_add_ss(sum, shuf);
        let mut result = _mm_cvtss_f32(total);

        let scalar_start = rem_start + rem4 * 4;
        for i in scalar_start..len {
            result += *ap.add(i) * *bp.add(i);
        }
        result
    }
}

/// `dst[i] += alpha * src[i]` for `i in 0..dst.len()`.
#[cfg(target_arch = "x86_64")]
pub fn axpy(dst: &mut [f32], src: &[f32], alpha: f32) {
    debug_assert_eq!(dst.len(), src.len());
    let len = dst.len();
    unsafe {
        let dp = dst.as_mut_ptr();
        let sp = src.as_ptr();
        let alpha_v = _mm_set1_ps(alpha);

        let chunks4 = len / 4;
        for i in 0..chunks4 {
            let off = i * 4;
            let d = _mm_loadu_ps(dp.add(off));
            let s = _mm_loadu_ps(sp.add(off));
            _mm_storeu_ps(dp.add(off), _mm_add_ps(d, _mm_mul_ps(s, alpha_v)));
        }
        for i in (chunks4 * 4)..len {
            *dp.add(i) += alpha * *sp.add(i);
        }
    }
}

#[cfg(not(target_arch = "x86_64"))]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(not(target_arch = "x86_64"))]
pub fn axpy(dst: &mut [f32], src: &[f32], alpha: f32) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d += alpha * s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_matches_scalar_reference() {
        let a: alloc::vec::Vec<f32> = (0..37).map(|i| i as f32 * 0.5).collect();
        let b: alloc::vec::Vec<f32> = (0..37).map(|i| (i as f32 * 0.25).sin()).collect();
        let scalar: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let simd = dot(&a, &b);
        approx::assert_relative_eq!(simd, scalar, epsilon = 1e-3);
    }

    #[test]
    fn axpy_matches_scalar_reference() {
        let mut dst = alloc::vec![1.0f32; 20];
        let src: alloc::vec::Vec<f32> = (0..20).map(|i| i as f32).collect();
        let mut scalar = alloc::vec![1.0f32; 20];
        for (d, s) in scalar.iter_mut().zip(src.iter()) {
            *d += 2.5 * s;
        }
        axpy(&mut dst, &src, 2.5);
        for (got, want) in dst.iter().zip(scalar.iter()) {
            approx::assert_relative_eq!(got, want, epsilon = 1e-4);
        }
    }
}
