//! A narrow byte-source trait the plan builder and materializer read
//! through, so this crate never has to depend on `llmk-firmware` directly
//! — `llmk-efi` wires a firmware-backed implementation in, and tests use
//! an in-memory one.

use crate::error::{GgufError, Result};

pub trait Source {
    /// Fill `buf` completely or fail. A short read on a GGUF body is
    /// always `Corrupt`, never silently retried (offsets are authoritative).
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Current byte offset from the start of the source.
    fn pos(&self) -> u64;

    /// Absolute seek.
    fn seek(&mut self, pos: u64) -> Result<()>;
}

/// An in-memory cursor over a byte slice. Used by tests and by callers
/// that already hold the whole file in a pool-allocated buffer.
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: u64,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource { data, pos: 0 }
    }
}

pub fn read_u8<S: Source + ?Sized>(s: &mut S) -> Result<u8> {
    let mut b = [0u8; 1];
    s.read_exact(&mut b)?;
    Ok(b[0])
}

pub fn read_u32<S: Source + ?Sized>(s: &mut S) -> Result<u32> {
    let mut b = [0u8; 4];
    s.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

pub fn read_i32<S: Source + ?Sized>(s: &mut S) -> Result<i32> {
    let mut b = [0u8; 4];
    s.read_exact(&mut b)?;
    Ok(i32::from_le_bytes(b))
}

pub fn read_u64<S: Source + ?Sized>(s: &mut S) -> Result<u64> {
    let mut b = [0u8; 8];
    s.read_exact(&mut b)?;
    Ok(u64::from_le_bytes(b))
}

pub fn read_i64<S: Source + ?Sized>(s: &mut S) -> Result<i64> {
    let mut b = [0u8; 8];
    s.read_exact(&mut b)?;
    Ok(i64::from_le_bytes(b))
}

pub fn read_f32<S: Source + ?Sized>(s: &mut S) -> Result<f32> {
    let mut b = [0u8; 4];
    s.read_exact(&mut b)?;
    Ok(f32::from_le_bytes(b))
}

pub fn read_f64<S: Source + ?Sized>(s: &mut S) -> Result<f64> {
    let mut b = [0u8; 8];
    s.read_exact(&mut b)?;
    Ok(f64::from_le_bytes(b))
}

pub fn skip<S: Source + ?Sized>(s: &mut S, mut n: u64) -> Result<()> {
    let mut scratch = [0u8; 256];
    while n > 0 {
        let chunk = core::cmp::min(n, scratch.len() as u64) as usize;
        s.read_exact(&mut scratch[..chunk])?;
        n -= chunk as u64;
    }
    Ok(())
}

impl<'a> Source for SliceSource<'a> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.pos as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(GgufError::Corrupt { offset: self.pos });
        }
        buf.copy_from_slice(&self.data[start..end]);
        self.pos = end as u64;
        Ok(())
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.data.len() as u64 {
            return Err(GgufError::Corrupt { offset: pos });
        }
        self.pos = pos;
        Ok(())
    }
}
