//! GGUF key-value metadata: value-type tags and the scan/skip logic used
//! while walking the KV table.

use alloc::string::String;
use alloc::vec;

use crate::error::{GgufError, Result};
use crate::source::{self, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    Bool,
    String,
    Array,
    U64,
    I64,
    F64,
}

impl ValueType {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => ValueType::U8,
            1 => ValueType::I8,
            2 => ValueType::U16,
            3 => ValueType::I16,
            4 => ValueType::U32,
            5 => ValueType::I32,
            6 => ValueType::F32,
            7 => ValueType::Bool,
            8 => ValueType::String,
            9 => ValueType::Array,
            10 => ValueType::U64,
            11 => ValueType::I64,
            12 => ValueType::F64,
            _ => return None,
        })
    }

    fn scalar_size(self) -> Option<usize> {
        match self {
            ValueType::U8 | ValueType::I8 | ValueType::Bool => Some(1),
            ValueType::U16 | ValueType::I16 => Some(2),
            ValueType::U32 | ValueType::I32 | ValueType::F32 => Some(4),
            ValueType::U64 | ValueType::I64 | ValueType::F64 => Some(8),
            ValueType::String | ValueType::Array => None,
        }
    }
}

/// Longest key we're willing to read; anything beyond is `Corrupt`.
pub const MAX_KEY_LEN: u32 = 4096;
/// Defensive cap on string value length; GGUF strings are not expected to
/// approach this in practice.
const MAX_STRING_LEN: u64 = 16 * 1024 * 1024;

/// Read a `u64 length + bytes` GGUF string.
pub fn read_string<S: Source + ?Sized>(s: &mut S) -> Result<String> {
    let len = source::read_u64(s)?;
    if len > MAX_STRING_LEN {
        return Err(GgufError::Corrupt { offset: s.pos() });
    }
    let mut buf = vec![0u8; len as usize];
    s.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| GgufError::Corrupt { offset: s.pos() })
}

/// Read a scalar integer-ish value and widen it to `u64`. Used for the
/// handful of recognized hyperparameter keys, which are always stored as
/// one of the integer types.
pub fn read_scalar_as_u64<S: Source + ?Sized>(s: &mut S, vtype: ValueType) -> Result<u64> {
    match vtype {
        ValueType::U8 => Ok(source::read_u8(s)? as u64),
        ValueType::U16 => {
            let mut b = [0u8; 2];
            s.read_exact(&mut b)?;
            Ok(u16::from_le_bytes(b) as u64)
        }
        ValueType::U32 => Ok(source::read_u32(s)? as u64),
        ValueType::I32 => {
            let v = source::read_i32(s)?;
            if v < 0 {
                return Err(GgufError::Corrupt { offset: s.pos() });
            }
            Ok(v as u64)
        }
        ValueType::U64 => source::read_u64(s),
        ValueType::I64 => {
            let v = source::read_i64(s)?;
            if v < 0 {
                return Err(GgufError::Corrupt { offset: s.pos() });
            }
            Ok(v as u64)
        }
        _ => Err(GgufError::Corrupt { offset: s.pos() }),
    }
}

/// Skip a value of the given type without interpreting it. Array-of-string
/// is walked element by element (each element is itself variable length);
/// arrays of fixed-size elements are skipped in one `n * elem_size` jump.
pub fn skip_value<S: Source + ?Sized>(s: &mut S, vtype: ValueType) -> Result<()> {
    match vtype {
        ValueType::String => {
            let len = source::read_u64(s)?;
            if len > MAX_STRING_LEN {
                return Err(GgufError::Corrupt { offset: s.pos() });
            }
            source::skip(s, len)
        }
        ValueType::Array => {
            let elem_type_raw = source::read_u32(s)?;
            let elem_type =
                ValueType::from_u32(elem_type_raw).ok_or(GgufError::Corrupt { offset: s.pos() })?;
            let count = source::read_u64(s)?;
            if elem_type == ValueType::String {
                for _ in 0..count {
                    let len = source::read_u64(s)?;
                    source::skip(s, len)?;
                }
                Ok(())
            } else if let Some(sz) = elem_type.scalar_size() {
                source::skip(s, count * sz as u64)
            } else {
                for _ in 0..count {
                    skip_value(s, elem_type)?;
                }
                Ok(())
            }
        }
        other => {
            let sz = other.scalar_size().expect("scalar_size defined for all non-container types");
            source::skip(s, sz as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SliceSource;
    use alloc::vec::Vec;

    #[test]
    fn read_string_round_trips() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&5u64.to_le_bytes());
        bytes.extend_from_slice(b"hello");
        let mut src = SliceSource::new(&bytes);
        assert_eq!(read_string(&mut src).unwrap(), "hello");
    }

    #[test]
    fn skip_value_array_of_string_consumes_every_element() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&8u32.to_le_bytes()); // elem type = String
        bytes.extend_from_slice(&2u64.to_le_bytes()); // count
        bytes.extend_from_slice(&3u64.to_le_bytes());
        bytes.extend_from_slice(b"abc");
        bytes.extend_from_slice(&2u64.to_le_bytes());
        bytes.extend_from_slice(b"xy");
        bytes.extend_from_slice(b"TAIL");
        let mut src = SliceSource::new(&bytes);
        skip_value(&mut src, ValueType::Array).unwrap();
        let mut tail = [0u8; 4];
        src.read_exact(&mut tail).unwrap();
        assert_eq!(&tail, b"TAIL");
    }
}
