//! Shared scalar math: RMSNorm, softmax, SiLU (§4.E).
//!
//! The teacher's own inference path (`kernel/src/jarvis/inference.rs`)
//! inlines fast bit-twiddling approximations for `exp`/`sqrt` because it
//! has no libm in scope. `llmk-engine` instead pulls in `libm` (the same
//! crate the teacher already uses elsewhere for its `no_std` float math,
//! e.g. `kernel/src/gui`/`cosmic` via `micromath`/`libm`) because §8's
//! "Sampling determinism" and "AVX2/SSE2 agreement" properties are framed
//! in terms of exact float semantics, not an approximation's error budget.

pub const RMS_EPS: f32 = 1e-5;

/// `y_i = x_i * w_i / sqrt(mean(x^2) + eps)` (§4.E step 2a).
pub fn rmsnorm(out: &mut [f32], x: &[f32], weight: &[f32]) {
    debug_assert_eq!(out.len(), x.len());
    debug_assert_eq!(weight.len(), x.len());
    let n = x.len() as f32;
    let mut ss = 0.0f32;
    for &v in x {
        ss += v * v;
    }
    let inv_rms = 1.0 / libm::sqrtf(ss / n + RMS_EPS);
    for i in 0..x.len() {
        out[i] = x[i] * inv_rms * weight[i];
    }
}

/// Numerically stable softmax in place, subtracting the max before
/// exponentiating (§4.E step 2d, §4.F step 3b).
pub fn softmax(data: &mut [f32]) {
    if data.is_empty() {
        return;
    }
    let mut max = data[0];
    for &v in data.iter() {
        if v > max {
            max = v;
        }
    }
    let mut sum = 0.0f32;
    for v in data.iter_mut() {
        *v = libm::expf(*v - max);
        sum += *v;
    }
    if sum > 0.0 {
        let inv = 1.0 / sum;
        for v in data.iter_mut() {
            *v *= inv;
        }
    }
}

/// `silu(z) = z / (1 + e^-z)` (§4.E step 2g, GLOSSARY).
pub fn silu(z: f32) -> f32 {
    z / (1.0 + libm::expf(-z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn rmsnorm_identity_on_unit_input() {
        // scenario 5: x=[1,1,1,1], w=[1,1,1,1] -> output ~= [1,1,1,1]
        let x = vec![1.0f32; 4];
        let w = vec![1.0f32; 4];
        let mut out = vec![0.0f32; 4];
        rmsnorm(&mut out, &x, &w);
        for v in out {
            approx::assert_relative_eq!(v, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn softmax_sums_to_one() {
        let mut v = vec![1.0f32, 2.0, 3.0, -1.0];
        softmax(&mut v);
        let sum: f32 = v.iter().sum();
        approx::assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn softmax_is_shift_invariant() {
        let mut a = vec![1.0f32, 2.0, 3.0];
        let mut b = vec![101.0f32, 102.0, 103.0];
        softmax(&mut a);
        softmax(&mut b);
        for (x, y) in a.iter().zip(b.iter()) {
            approx::assert_relative_eq!(x, y, epsilon = 1e-5);
        }
    }

    #[test]
    fn silu_zero_is_zero() {
        approx::assert_relative_eq!(silu(0.0), 0.0, epsilon = 1e-6);
    }
}
