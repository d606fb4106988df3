//! Per-block dequantization. Every quantized kind here covers 32 elements
//! per block (`cols % 32 == 0` is a loader-wide invariant); F32 and F16
//! rows are not block-structured but are handled by the same entry point
//! for uniformity.

use half::f16;

use crate::error::{GgufError, Result};
use crate::tensor::GgmlType;

/// Dequantize one row of `cols` elements from its raw on-disk encoding
/// into `out[0..cols]`. `row_bytes` must hold exactly the encoded bytes
/// for this row (as computed from [`GgmlType::block_bytes`] or the F32/F16
/// element size).
pub fn dequantize_row(ggml_type: GgmlType, row_bytes: &[u8], cols: usize, out: &mut [f32]) -> Result<()> {
    if out.len() < cols {
        return Err(GgufError::BufferTooSmall { needed: cols, have: out.len() });
    }
    match ggml_type {
        GgmlType::F32 => {
            if row_bytes.len() < cols * 4 {
                return Err(GgufError::Corrupt { offset: 0 });
            }
            for i in 0..cols {
                let b = [row_bytes[i * 4], row_bytes[i * 4 + 1], row_bytes[i * 4 + 2], row_bytes[i * 4 + 3]];
                out[i] = f32::from_le_bytes(b);
            }
            Ok(())
        }
        GgmlType::F16 => {
            if row_bytes.len() < cols * 2 {
                return Err(GgufError::Corrupt { offset: 0 });
            }
            for i in 0..cols {
                let b = [row_bytes[i * 2], row_bytes[i * 2 + 1]];
                out[i] = f16::from_le_bytes(b).to_f32();
            }
            Ok(())
        }
        GgmlType::Q4_0 => dequant_q4_0(row_bytes, cols, out),
        GgmlType::Q4_1 => dequant_q4_1(row_bytes, cols, out),
        GgmlType::Q5_0 => dequant_q5_0(row_bytes, cols, out),
        GgmlType::Q5_1 => dequant_q5_1(row_bytes, cols, out),
        GgmlType::Q8_0 => dequant_q8_0(row_bytes, cols, out),
    }
}

fn check_row(row_bytes: &[u8], cols: usize, block_bytes: usize) -> Result<usize> {
    if cols % 32 != 0 {
        return Err(GgufError::Corrupt { offset: 0 });
    }
    let n_blocks = cols / 32;
    if row_bytes.len() < n_blocks * block_bytes {
        return Err(GgufError::Corrupt { offset: 0 });
    }
    Ok(n_blocks)
}

fn dequant_q4_0(row_bytes: &[u8], cols: usize, out: &mut [f32]) -> Result<()> {
    const BLOCK: usize = 2 + 16;
    let n_blocks = check_row(row_bytes, cols, BLOCK)?;
    for bi in 0..n_blocks {
        let block = &row_bytes[bi * BLOCK..(bi + 1) * BLOCK];
        let d = f16::from_le_bytes([block[0], block[1]]).to_f32();
        let qs = &block[2..18];
        let base = bi * 32;
        for i in 0..16 {
            let byte = qs[i];
            let x0 = (byte & 0x0F) as i32 - 8;
            let x1 = (byte >> 4) as i32 - 8;
            out[base + i] = x0 as f32 * d;
            out[base + i + 16] = x1 as f32 * d;
        }
    }
    Ok(())
}

fn dequant_q4_1(row_bytes: &[u8], cols: usize, out: &mut [f32]) -> Result<()> {
    const BLOCK: usize = 2 + 2 + 16;
    let n_blocks = check_row(row_bytes, cols, BLOCK)?;
    for bi in 0..n_blocks {
        let block = &row_bytes[bi * BLOCK..(bi + 1) * BLOCK];
        let d = f16::from_le_bytes([block[0], block[1]]).to_f32();
        let m = f16::from_le_bytes([block[2], block[3]]).to_f32();
        let qs = &block[4..20];
        let base = bi * 32;
        for i in 0..16 {
            let byte = qs[i];
            let x0 = (byte & 0x0F) as f32;
            let x1 = (byte >> 4) as f32;
            out[base + i] = x0 * d + m;
            out[base + i + 16] = x1 * d + m;
        }
    }
    Ok(())
}

fn dequant_q5_0(row_bytes: &[u8], cols: usize, out: &mut [f32]) -> Result<()> {
    const BLOCK: usize = 2 + 4 + 16;
    let n_blocks = check_row(row_bytes, cols, BLOCK)?;
    for bi in 0..n_blocks {
        let block = &row_bytes[bi * BLOCK..(bi + 1) * BLOCK];
        let d = f16::from_le_bytes([block[0], block[1]]).to_f32();
        let qh = u32::from_le_bytes([block[2], block[3], block[4], block[5]]);
        let qs = &block[6..22];
        let base = bi * 32;
        for i in 0..16 {
            let byte = qs[i];
            let xh_0 = ((qh >> i) << 4) & 0x10;
            let xh_1 = (qh >> (i + 12)) & 0x10;
            let x0 = ((byte & 0x0F) as u32 | xh_0) as i32 - 16;
            let x1 = ((byte >> 4) as u32 | xh_1) as i32 - 16;
            out[base + i] = x0 as f32 * d;
            out[base + i + 16] = x1 as f32 * d;
        }
    }
    Ok(())
}

fn dequant_q5_1(row_bytes: &[u8], cols: usize, out: &mut [f32]) -> Result<()> {
    const BLOCK: usize = 2 + 2 + 4 + 16;
    let n_blocks = check_row(row_bytes, cols, BLOCK)?;
    for bi in 0..n_blocks {
        let block = &row_bytes[bi * BLOCK..(bi + 1) * BLOCK];
        let d = f16::from_le_bytes([block[0], block[1]]).to_f32();
        let m = f16::from_le_bytes([block[2], block[3]]).to_f32();
        let qh = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
        let qs = &block[8..24];
        let base = bi * 32;
        for i in 0..16 {
            let byte = qs[i];
            let xh_0 = ((qh >> i) << 4) & 0x10;
            let xh_1 = (qh >> (i + 12)) & 0x10;
            let x0 = ((byte & 0x0F) as u32 | xh_0) as f32;
            let x1 = ((byte >> 4) as u32 | xh_1) as f32;
            out[base + i] = x0 * d + m;
            out[base + i + 16] = x1 * d + m;
        }
    }
    Ok(())
}

fn dequant_q8_0(row_bytes: &[u8], cols: usize, out: &mut [f32]) -> Result<()> {
    const BLOCK: usize = 2 + 32;
    let n_blocks = check_row(row_bytes, cols, BLOCK)?;
    for bi in 0..n_blocks {
        let block = &row_bytes[bi * BLOCK..(bi + 1) * BLOCK];
        let d = f16::from_le_bytes([block[0], block[1]]).to_f32();
        let qs = &block[2..34];
        let base = bi * 32;
        for i in 0..32 {
            out[base + i] = qs[i] as i8 as f32 * d;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_dequant_round_trips_bit_for_bit() {
        let values: [f32; 4] = [1.0, -2.5, 0.0, 12345.625];
        let mut bytes = [0u8; 16];
        for (i, v) in values.iter().enumerate() {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
        let mut out = [0.0f32; 4];
        dequantize_row(GgmlType::F32, &bytes, 4, &mut out).unwrap();
        assert_eq!(out, values);
    }

    #[test]
    fn q8_0_dequant_matches_manual_scale() {
        let d = f16::from_f32(0.25);
        let mut bytes = alloc::vec![0u8; 34];
        bytes[0..2].copy_from_slice(&d.to_le_bytes());
        for i in 0..32 {
            bytes[2 + i] = (i as i32 - 16) as u8;
        }
        let mut out = [0.0f32; 32];
        dequantize_row(GgmlType::Q8_0, &bytes, 32, &mut out).unwrap();
        for i in 0..32 {
            let expected = (i as i32 - 16) as f32 * 0.25;
            approx::assert_relative_eq!(out[i], expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn q4_0_centers_nibbles_at_eight() {
        let d = f16::from_f32(2.0);
        let mut bytes = alloc::vec![0u8; 18];
        bytes[0..2].copy_from_slice(&d.to_le_bytes());
        // all nibbles = 8 -> centered value 0
        for b in bytes[2..18].iter_mut() {
            *b = 0x88;
        }
        let mut out = [0.0f32; 32];
        dequantize_row(GgmlType::Q4_0, &bytes, 32, &mut out).unwrap();
        for v in out {
            approx::assert_relative_eq!(v, 0.0, epsilon = 1e-6);
        }
    }
}
