//! Typed scalar and row encode/decode over a [`crate::buffer::ReadBuffer`]/
//! [`crate::buffer::WriteBuffer`] pair (spec.md §4.4).
//!
//! One dispatch function per direction (`read_scalar`/`write_scalar`)
//! rather than one function per type, mirroring the type-dispatch match
//! the teacher's field decoder uses for MySQL column types. Byte swaps
//! happen once, immediately after a scalar is read (or immediately before
//! it's written) — never inside a loop over row count, matching spec.md
//! §4.4's "swap-around-boundary" rule: the inner copy loop never branches
//! on byte order, only the boundary does.

use crate::buffer::{ReadBuffer, ReadOutcome, WriteBuffer};
use crate::byteorder::{self, ByteOrderKind};
use crate::layout::ScalarType;

/// One decoded scalar value. `F80` values are narrowed to `f64` on read
/// (spec.md §4.1) and never round-tripped back to 80 bits on write.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(u8),
    Str(String),
}

impl Value {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Value::I16(_) => ScalarType::I16,
            Value::U16(_) => ScalarType::U16,
            Value::I32(_) => ScalarType::I32,
            Value::U32(_) => ScalarType::U32,
            Value::I64(_) => ScalarType::I64,
            Value::U64(_) => ScalarType::U64,
            Value::F32(_) => ScalarType::F32,
            Value::F64(_) => ScalarType::F64,
            Value::Char(_) => ScalarType::Char,
            Value::Str(_) => ScalarType::Str,
        }
    }

    /// Interpret this value as `f64` if its type supports aggregate
    /// statistics (spec.md §4.5), else `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }
}

/// Read one scalar of `scalar_type` from `buf`, swapping in place if
/// `order` disagrees with host endianness. Returns [`ReadOutcome::Eof`]
/// only when nothing at all had been consumed for this value (i.e. at a
/// clean page boundary); a value torn in the middle surfaces as
/// [`crate::SddsError::ShortRead`] via [`ReadBuffer::read`].
pub fn read_scalar(buf: &mut ReadBuffer, scalar_type: ScalarType, order: ByteOrderKind) -> crate::Result<(Value, ReadOutcome)> {
    let swap = byteorder::needs_swap(order);

    macro_rules! read_fixed {
        ($n:expr) => {{
            let mut bytes = [0u8; $n];
            let outcome = buf.read(Some(&mut bytes), $n)?;
            (bytes, outcome)
        }};
    }

    Ok(match scalar_type {
        ScalarType::Char => {
            let (bytes, outcome) = read_fixed!(1);
            (Value::Char(bytes[0]), outcome)
        }
        ScalarType::I16 => {
            let (bytes, outcome) = read_fixed!(2);
            let mut v = i16::from_ne_bytes(bytes);
            if swap {
                let mut u = v as u16;
                byteorder::swap16(&mut u);
                v = u as i16;
            }
            (Value::I16(v), outcome)
        }
        ScalarType::U16 => {
            let (bytes, outcome) = read_fixed!(2);
            let mut v = u16::from_ne_bytes(bytes);
            if swap {
                byteorder::swap16(&mut v);
            }
            (Value::U16(v), outcome)
        }
        ScalarType::I32 => {
            let (bytes, outcome) = read_fixed!(4);
            let mut v = i32::from_ne_bytes(bytes);
            if swap {
                let mut u = v as u32;
                byteorder::swap32(&mut u);
                v = u as i32;
            }
            (Value::I32(v), outcome)
        }
        ScalarType::U32 => {
            let (bytes, outcome) = read_fixed!(4);
            let mut v = u32::from_ne_bytes(bytes);
            if swap {
                byteorder::swap32(&mut v);
            }
            (Value::U32(v), outcome)
        }
        ScalarType::I64 => {
            let (bytes, outcome) = read_fixed!(8);
            let mut v = i64::from_ne_bytes(bytes);
            if swap {
                let mut u = v as u64;
                byteorder::swap64(&mut u);
                v = u as i64;
            }
            (Value::I64(v), outcome)
        }
        ScalarType::U64 => {
            let (bytes, outcome) = read_fixed!(8);
            let mut v = u64::from_ne_bytes(bytes);
            if swap {
                byteorder::swap64(&mut v);
            }
            (Value::U64(v), outcome)
        }
        ScalarType::F32 => {
            let (bytes, outcome) = read_fixed!(4);
            let mut v = f32::from_ne_bytes(bytes);
            if swap {
                byteorder::swap_f32(&mut v);
            }
            (Value::F32(v), outcome)
        }
        ScalarType::F64 => {
            let (bytes, outcome) = read_fixed!(8);
            let mut v = f64::from_ne_bytes(bytes);
            if swap {
                byteorder::swap_f64(&mut v);
            }
            (Value::F64(v), outcome)
        }
        ScalarType::F80 => {
            // Always narrowed via the bit-exact routine below, regardless
            // of `SDDS_LONGDOUBLE_64BITS`: `Value` has no 80-bit variant,
            // so there is no alternate representation for that knob to
            // select between in this implementation (see DESIGN.md).
            let (mut record, outcome) = read_fixed!(crate::constants::F80_RECORD_SIZE);
            let v = byteorder::float80_to_f64(&record, order);
            // record is consumed in wire order already; float80_to_f64
            // does its own swap of a local copy, so nothing else to do.
            let _ = &mut record;
            (Value::F64(v), outcome)
        }
        ScalarType::Str => {
            let (len_bytes, outcome) = read_fixed!(4);
            if outcome == ReadOutcome::Eof {
                (Value::Str(String::new()), outcome)
            } else {
                let mut len = i32::from_ne_bytes(len_bytes);
                if swap {
                    let mut u = len as u32;
                    byteorder::swap32(&mut u);
                    len = u as i32;
                }
                if len < 0 {
                    return Err(crate::SddsError::Format(format!("negative string length: {len}")));
                }
                let len = len as usize;
                let mut bytes = vec![0u8; len];
                let outcome2 = buf.read(Some(&mut bytes), len)?;
                let s = String::from_utf8(bytes)
                    .map_err(|e| crate::SddsError::Format(format!("invalid utf-8 string: {e}")))?;
                (Value::Str(s), outcome2)
            }
        }
    })
}

/// Skip one scalar of `scalar_type` without decoding it (used by
/// sparsing: rows outside the selected interval are skipped, not read).
pub fn skip_scalar(buf: &mut ReadBuffer, scalar_type: ScalarType, order: ByteOrderKind) -> crate::Result<ReadOutcome> {
    match scalar_type {
        ScalarType::Str => {
            let mut len_bytes = [0u8; 4];
            let outcome = buf.read(Some(&mut len_bytes), 4)?;
            if outcome == ReadOutcome::Eof {
                return Ok(outcome);
            }
            let mut len = i32::from_ne_bytes(len_bytes);
            if byteorder::needs_swap(order) {
                let mut u = len as u32;
                byteorder::swap32(&mut u);
                len = u as i32;
            }
            if len < 0 {
                return Err(crate::SddsError::Format(format!("negative string length: {len}")));
            }
            buf.read(None, len as usize)
        }
        other => {
            let size = other
                .fixed_size()
                .expect("non-Str scalar types always have a fixed size");
            buf.read(None, size)
        }
    }
}

/// Write one scalar, swapping a local copy in place first if `order`
/// disagrees with host endianness.
pub fn write_scalar(buf: &mut WriteBuffer, value: &Value, order: ByteOrderKind) -> crate::Result<()> {
    let swap = byteorder::needs_swap(order);

    match value {
        Value::Char(v) => buf.write(&[*v]),
        Value::I16(v) => {
            let mut u = *v as u16;
            if swap {
                byteorder::swap16(&mut u);
            }
            buf.write(&u.to_ne_bytes())
        }
        Value::U16(v) => {
            let mut u = *v;
            if swap {
                byteorder::swap16(&mut u);
            }
            buf.write(&u.to_ne_bytes())
        }
        Value::I32(v) => {
            let mut u = *v as u32;
            if swap {
                byteorder::swap32(&mut u);
            }
            buf.write(&u.to_ne_bytes())
        }
        Value::U32(v) => {
            let mut u = *v;
            if swap {
                byteorder::swap32(&mut u);
            }
            buf.write(&u.to_ne_bytes())
        }
        Value::I64(v) => {
            let mut u = *v as u64;
            if swap {
                byteorder::swap64(&mut u);
            }
            buf.write(&u.to_ne_bytes())
        }
        Value::U64(v) => {
            let mut u = *v;
            if swap {
                byteorder::swap64(&mut u);
            }
            buf.write(&u.to_ne_bytes())
        }
        Value::F32(v) => {
            let mut f = *v;
            if swap {
                byteorder::swap_f32(&mut f);
            }
            buf.write(&f.to_ne_bytes())
        }
        Value::F64(v) => {
            let mut f = *v;
            if swap {
                byteorder::swap_f64(&mut f);
            }
            buf.write(&f.to_ne_bytes())
        }
        Value::Str(s) => {
            let bytes = s.as_bytes();
            let mut len = bytes.len() as u32;
            if swap {
                byteorder::swap32(&mut len);
            }
            buf.write(&len.to_ne_bytes())?;
            buf.write(bytes)
        }
    }
}

/// Write a fixed-width string for parallel row-major I/O (spec.md §4.6):
/// truncates to `width` bytes, recording a truncation via
/// [`crate::config::record_truncated_string`], and pads short strings
/// with NUL bytes instead of length-prefixing.
pub fn write_fixed_width_string(buf: &mut WriteBuffer, s: &str, width: usize) -> crate::Result<()> {
    let bytes = s.as_bytes();
    let mut fixed = vec![0u8; width];
    if bytes.len() > width {
        fixed.copy_from_slice(&bytes[..width]);
        crate::config::record_truncated_string();
    } else {
        fixed[..bytes.len()].copy_from_slice(bytes);
    }
    buf.write(&fixed)
}

/// Read back a fixed-width string written by [`write_fixed_width_string`],
/// trimming trailing NUL padding.
pub fn read_fixed_width_string(buf: &mut ReadBuffer, width: usize) -> crate::Result<(String, ReadOutcome)> {
    let mut bytes = vec![0u8; width];
    let outcome = buf.read(Some(&mut bytes), width)?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(width);
    let s = String::from_utf8_lossy(&bytes[..end]).into_owned();
    Ok((s, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{ReadBackend, WriteBackend};
    use tempfile::NamedTempFile;

    fn roundtrip(values: &[Value], order: ByteOrderKind) -> Vec<Value> {
        let tmp = NamedTempFile::new().unwrap();
        {
            let backend = WriteBackend::create(tmp.path()).unwrap();
            let mut wb = WriteBuffer::new(backend, 64);
            for v in values {
                write_scalar(&mut wb, v, order).unwrap();
            }
            wb.flush().unwrap();
        }
        let backend = ReadBackend::open(tmp.path()).unwrap();
        let mut rb = ReadBuffer::new(backend, 64);
        let mut out = Vec::new();
        for v in values {
            let (decoded, _) = read_scalar(&mut rb, v.scalar_type(), order).unwrap();
            out.push(decoded);
        }
        out
    }

    #[test]
    fn roundtrip_native_order_scalars() {
        let values = vec![
            Value::I32(-7),
            Value::U64(0xDEAD_BEEF_0000_0001),
            Value::F64(3.5),
            Value::Char(b'z'),
            Value::Str("hello sdds".to_string()),
        ];
        let order = if byteorder::is_big_endian_host() {
            ByteOrderKind::Big
        } else {
            ByteOrderKind::Little
        };
        assert_eq!(roundtrip(&values, order), values);
    }

    #[test]
    fn roundtrip_foreign_order_scalars_swap_correctly() {
        let values = vec![Value::I32(123_456), Value::F32(1.5)];
        let foreign = if byteorder::is_big_endian_host() {
            ByteOrderKind::Little
        } else {
            ByteOrderKind::Big
        };
        assert_eq!(roundtrip(&values, foreign), values);
    }

    #[test]
    fn fixed_width_string_truncates_and_counts() {
        let tmp = NamedTempFile::new().unwrap();
        let before = crate::config::truncated_string_count();
        {
            let backend = WriteBackend::create(tmp.path()).unwrap();
            let mut wb = WriteBuffer::new(backend, 64);
            write_fixed_width_string(&mut wb, "this is way too long", 8).unwrap();
            wb.flush().unwrap();
        }
        assert_eq!(crate::config::truncated_string_count(), before + 1);

        let backend = ReadBackend::open(tmp.path()).unwrap();
        let mut rb = ReadBuffer::new(backend, 64);
        let (s, _) = read_fixed_width_string(&mut rb, 8).unwrap();
        assert_eq!(s, "this is ");
    }

    #[test]
    fn skip_scalar_advances_past_a_string_without_decoding() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let backend = WriteBackend::create(tmp.path()).unwrap();
            let mut wb = WriteBuffer::new(backend, 64);
            write_scalar(&mut wb, &Value::Str("skip-me".into()), ByteOrderKind::Little).unwrap();
            write_scalar(&mut wb, &Value::I32(99), ByteOrderKind::Little).unwrap();
            wb.flush().unwrap();
        }
        let backend = ReadBackend::open(tmp.path()).unwrap();
        let mut rb = ReadBuffer::new(backend, 64);
        skip_scalar(&mut rb, ScalarType::Str, ByteOrderKind::Little).unwrap();
        let (v, _) = read_scalar(&mut rb, ScalarType::I32, ByteOrderKind::Little).unwrap();
        assert_eq!(v, Value::I32(99));
    }

    #[test]
    fn read_scalar_rejects_negative_string_length() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let backend = WriteBackend::create(tmp.path()).unwrap();
            let mut wb = WriteBuffer::new(backend, 64);
            wb.write(&(-1i32).to_ne_bytes()).unwrap();
            wb.flush().unwrap();
        }
        let backend = ReadBackend::open(tmp.path()).unwrap();
        let mut rb = ReadBuffer::new(backend, 64);
        let err = read_scalar(&mut rb, ScalarType::Str, ByteOrderKind::Little).unwrap_err();
        assert!(matches!(err, crate::SddsError::Format(_)));
    }

    #[test]
    fn skip_scalar_rejects_negative_string_length() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let backend = WriteBackend::create(tmp.path()).unwrap();
            let mut wb = WriteBuffer::new(backend, 64);
            wb.write(&(-5i32).to_ne_bytes()).unwrap();
            wb.flush().unwrap();
        }
        let backend = ReadBackend::open(tmp.path()).unwrap();
        let mut rb = ReadBuffer::new(backend, 64);
        let err = skip_scalar(&mut rb, ScalarType::Str, ByteOrderKind::Little).unwrap_err();
        assert!(matches!(err, crate::SddsError::Format(_)));
    }
}
