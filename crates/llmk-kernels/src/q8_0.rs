//! Q8_0 blocked matmul.
//!
//! A Q8_0 tensor is stored as a sequence of 34-byte blocks, each covering
//! 32 consecutive elements: a `f16` scale `d` followed by 32 signed-byte
//! quants `qs`. Dequantizing a whole row before multiplying would defeat
//! the point of keeping weights quantized in RAM, so this multiplies
//! block-by-block: dequantize one group of 32 into a scratch buffer,
//! dot it against the matching slice of the activation vector, scale by
//! `d`, and accumulate.

use half::f16;

pub const BLOCK_LEN: usize = 32;

/// One Q8_0 block: scale plus 32 signed-byte quants.
#[derive(Clone, Copy)]
pub struct Block {
    pub d: f16,
    pub qs: [i8; BLOCK_LEN],
}

impl Block {
    /// Read one block from a raw byte slice (34 bytes: 2-byte `d`, 32 `qs`).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= 34);
        let d = f16::from_le_bytes([bytes[0], bytes[1]]);
        let mut qs = [0i8; BLOCK_LEN];
        for i in 0..BLOCK_LEN {
            qs[i] = bytes[2 + i] as i8;
        }
        Block { d, qs }
    }
}

/// Dot a row of Q8_0 blocks against an `f32` activation vector of length
/// `blocks.len() * 32`.
pub fn dot(blocks: &[Block], activations: &[f32]) -> f32 {
    debug_assert_eq!(blocks.len() * BLOCK_LEN, activations.len());
    let mut total = 0.0f32;
    for (bi, block) in blocks.iter().enumerate() {
        let scale = block.d.to_f32();
        let base = bi * BLOCK_LEN;
        let mut group_acc = 0.0f32;
        for i in 0..BLOCK_LEN {
            group_acc += block.qs[i] as f32 * activations[base + i];
        }
        total += group_acc * scale;
    }
    total
}

/// Multiply an `n_rows x n_cols` Q8_0 weight matrix (row-major, each row
/// `n_cols / 32` blocks) against a single activation vector of length
/// `n_cols`, writing `n_rows` outputs.
pub fn matmul(row_blocks: &[&[Block]], activations: &[f32], out: &mut [f32]) {
    debug_assert_eq!(row_blocks.len(), out.len());
    for (row, slot) in row_blocks.iter().zip(out.iter_mut()) {
        *slot = dot(row, activations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn make_block(vals: [i32; BLOCK_LEN], d: f32) -> Block {
        let mut qs = [0i8; BLOCK_LEN];
        for i in 0..BLOCK_LEN {
            qs[i] = vals[i] as i8;
        }
        Block { d: f16::from_f32(d), qs }
    }

    #[test]
    fn dot_matches_manual_dequant_reference() {
        let mut vals = [0i32; BLOCK_LEN];
        for i in 0..BLOCK_LEN {
            vals[i] = (i as i32) - 16;
        }
        let block = make_block(vals, 0.1);
        let activations: Vec<f32> = (0..BLOCK_LEN).map(|i| i as f32 * 0.3 - 4.0).collect();

        let scale = block.d.to_f32();
        let reference: f32 = block
            .qs
            .iter()
            .zip(activations.iter())
            .map(|(q, a)| (*q as f32 * scale) * a)
            .sum();

        let got = dot(&[block], &activations);
        approx::assert_relative_eq!(got, reference, epsilon = 1e-4);
    }

    #[test]
    fn matmul_writes_one_output_per_row() {
        let block_a = make_block([1; BLOCK_LEN], 1.0);
        let block_b = make_block([2; BLOCK_LEN], 0.5);
        let rows: [&[Block]; 2] = [core::slice::from_ref(&block_a), core::slice::from_ref(&block_b)];
        let activations = alloc::vec![1.0f32; BLOCK_LEN];
        let mut out = [0.0f32; 2];
        matmul(&rows, &activations, &mut out);
        approx::assert_relative_eq!(out[0], 32.0, epsilon = 1e-4);
        approx::assert_relative_eq!(out[1], 32.0, epsilon = 1e-4);
    }
}
