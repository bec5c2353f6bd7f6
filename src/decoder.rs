//! Low-level primitive reads over a byte slice with a cursor (C3).
//!
//! Mirrors the teacher's `bb_transfer::read::MessageReader` private
//! `read_byte`/`read_varint`/`read_float`/`read_double`/`read_buf` helpers,
//! generalized from bamboo's 3-bit header framing to protobuf's
//! byte-oriented varint/fixed layout.

use std::borrow::Cow;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::DecodeError;
use crate::utf8::{self, Utf8Policy};

type Result<T> = std::result::Result<T, DecodeError>;

/// Construction-time policy for [`Decoder`]. See the Data Model section of
/// `SPEC_FULL.md` for why this collapses the original's mutable/immutable
/// decision table down to two flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderOptions {
  /// When set, `read_bytes`/`read_byte_string` may return a borrowed view
  /// instead of copying.
  pub alias_bytes_fields: bool,
  /// Gates the borrowed branch of `read_byte_string` alongside
  /// `alias_bytes_fields`.
  pub treat_new_data_as_immutable: bool,
}

/// A cursor-tracked view over a borrowed byte slice, with primitive reads
/// for every wire-level scalar shape.
pub struct Decoder<'a> {
  buffer: &'a [u8],
  start: usize,
  end: usize,
  cursor: usize,
  options: DecoderOptions,
}

impl<'a> Decoder<'a> {
  /// Binds a new decoder over `buffer[start..start+length]` (or the whole
  /// buffer, if `length` is `None`). The cursor starts at `start`.
  pub fn new(buffer: &'a [u8], options: DecoderOptions) -> Self {
    let mut d = Decoder { buffer, start: 0, end: 0, cursor: 0, options };
    d.attach(buffer, None, None);
    d
  }

  /// Re-binds this decoder to a new byte source, resetting the cursor.
  /// `start` defaults to 0 and `length` defaults to the whole slice.
  pub fn attach(&mut self, buffer: &'a [u8], start: Option<usize>, length: Option<usize>) {
    let start = start.unwrap_or(0);
    let length = length.unwrap_or(buffer.len() - start);
    self.buffer = buffer;
    self.start = start;
    self.end = start + length;
    self.cursor = start;
  }

  pub fn cursor(&self) -> usize { self.cursor }
  pub fn set_cursor(&mut self, cursor: usize) { self.cursor = cursor; }
  pub fn advance(&mut self, by: usize) { self.cursor += by; }
  pub fn end(&self) -> usize { self.end }
  pub fn set_end(&mut self, end: usize) { self.end = end; }
  pub fn at_end(&self) -> bool { self.cursor >= self.end }
  pub fn past_end(&self) -> bool { self.cursor > self.end }

  fn ensure(&self, len: usize) -> Result<()> {
    let available = self.end.saturating_sub(self.cursor);
    if len > available {
      Err(DecodeError::ReadPastEnd { requested: len, available })
    } else {
      Ok(())
    }
  }

  fn bytes(&self, len: usize) -> Result<&'a [u8]> {
    self.ensure(len)?;
    Ok(&self.buffer[self.cursor..self.cursor + len])
  }

  pub fn read_u8(&mut self) -> Result<u8> {
    let b = self.bytes(1)?[0];
    self.cursor += 1;
    Ok(b)
  }
  pub fn read_i8(&mut self) -> Result<i8> { Ok(self.read_u8()? as i8) }

  pub fn read_u16(&mut self) -> Result<u16> {
    let b = self.bytes(2)?;
    let v = LittleEndian::read_u16(b);
    self.cursor += 2;
    Ok(v)
  }
  pub fn read_i16(&mut self) -> Result<i16> { Ok(self.read_u16()? as i16) }

  pub fn read_u32(&mut self) -> Result<u32> {
    let b = self.bytes(4)?;
    let v = LittleEndian::read_u32(b);
    self.cursor += 4;
    Ok(v)
  }
  pub fn read_i32(&mut self) -> Result<i32> { Ok(self.read_u32()? as i32) }

  /// Reads an unsigned base-128 varint of up to 5 value bytes. If the
  /// fifth byte still has the continuation bit set, up to 5 more bytes
  /// are consumed and their value bits discarded (truncation, not
  /// failure) — this tolerance is preserved verbatim per spec.md's open
  /// question; it is not "fixed" here. If the stream is still continuing
  /// after the tenth byte total, this fails with `InvalidVarint`.
  pub fn read_unsigned_varint32(&mut self) -> Result<u32> {
    let mut result: u32 = 0;
    let mut shift = 0u32;
    for _ in 0..5 {
      let b = self.read_u8()?;
      if shift < 32 {
        result |= ((b & 0x7F) as u32).wrapping_shl(shift);
      }
      shift += 7;
      if b & 0x80 == 0 {
        return Ok(result);
      }
    }
    // Fifth byte still continues: discard up to 5 more bytes' value bits.
    for _ in 0..5 {
      let b = self.read_u8()?;
      if b & 0x80 == 0 {
        return Ok(result);
      }
    }
    Err(DecodeError::InvalidVarint)
  }

  pub fn read_signed_varint32(&mut self) -> Result<i32> { Ok(self.read_unsigned_varint32()? as i32) }

  /// Reads an unsigned base-128 varint of up to 10 bytes into a split-64
  /// pair, calling `convert(lo, hi)` to produce the result.
  pub fn read_split_varint64<T>(&mut self, convert: impl FnOnce(u32, u32) -> T) -> Result<T> {
    let mut lo: u32 = 0;
    let mut hi: u32 = 0;
    let mut shift = 0u32;
    for i in 0..10 {
      let b = self.read_u8()?;
      let bits = (b & 0x7F) as u32;
      if shift < 32 {
        lo |= bits.wrapping_shl(shift);
        if shift > 25 {
          // spills into hi
          hi |= bits >> (32 - shift);
        }
      } else {
        hi |= bits.wrapping_shl(shift - 32);
      }
      if b & 0x80 == 0 {
        return Ok(convert(lo, hi));
      }
      shift += 7;
      if i == 9 {
        return Err(DecodeError::InvalidVarint);
      }
    }
    Err(DecodeError::InvalidVarint)
  }

  pub fn read_split_fixed64<T>(&mut self, convert: impl FnOnce(u32, u32) -> T) -> Result<T> {
    let lo = self.read_u32()?;
    let hi = self.read_u32()?;
    Ok(convert(lo, hi))
  }

  pub fn read_float(&mut self) -> Result<f32> { Ok(f32::from_bits(self.read_u32()?)) }

  pub fn read_double(&mut self) -> Result<f64> {
    let b = self.bytes(8)?;
    let v = LittleEndian::read_u64(b);
    self.cursor += 8;
    Ok(f64::from_bits(v))
  }

  /// Reads a varint and returns whether any of its value bits were set
  /// (logical OR of all bits != 0). A malformed varint (continuation past
  /// the bound) is fatal.
  pub fn read_bool(&mut self) -> Result<bool> {
    self.read_split_varint64(|lo, hi| lo != 0 || hi != 0)
  }

  /// Optimistic tag match: if the upcoming bytes are exactly the canonical
  /// varint encoding of `expected`, advances past them and returns the
  /// pre-match cursor. Otherwise rewinds (a no-op, since nothing was
  /// consumed on mismatch) and returns `None`. Never fails on EOF or
  /// mismatch — this is a hot-loop optimization, not a parse.
  pub fn read_unsigned_varint32_if_equal(&mut self, expected: u32) -> Option<usize> {
    let start = self.cursor;
    let mut probe = Decoder { buffer: self.buffer, start: self.start, end: self.end, cursor: self.cursor, options: self.options };
    match probe.read_unsigned_varint32() {
      Ok(v) if v == expected => {
        self.cursor = probe.cursor;
        Some(start)
      }
      _ => None,
    }
  }

  /// Advances past `length` bytes and delegates to [`utf8::decode`]. The
  /// outer `Result` is the buffer-bounds check; the inner one is the UTF-8
  /// validity check under `policy` (kept separate so the Reader layer can
  /// surface `ReadError::InvalidUtf8` distinctly from `ReadPastEnd`).
  pub fn read_string(
    &mut self,
    length: usize,
    policy: Utf8Policy,
  ) -> Result<std::result::Result<String, utf8::Utf8DecodeError>> {
    let bytes = self.bytes(length)?;
    self.cursor += length;
    Ok(utf8::decode(bytes, policy))
  }

  /// Returns an independent byte copy, or (if `alias_bytes_fields` is set)
  /// a borrowed view over the backing slice.
  pub fn read_bytes(&mut self, length: usize) -> Result<Cow<'a, [u8]>> {
    let slice = self.bytes(length)?;
    self.cursor += length;
    Ok(if self.options.alias_bytes_fields { Cow::Borrowed(slice) } else { Cow::Owned(slice.to_vec()) })
  }

  /// As [`read_bytes`](Self::read_bytes), but only aliases when both
  /// `alias_bytes_fields` and `treat_new_data_as_immutable` are set —
  /// returning a view over mutable data would break the immutability
  /// guarantee of a byte-string result.
  pub fn read_byte_string(&mut self, length: usize) -> Result<Cow<'a, [u8]>> {
    let slice = self.bytes(length)?;
    self.cursor += length;
    Ok(
      if self.options.alias_bytes_fields && self.options.treat_new_data_as_immutable {
        Cow::Borrowed(slice)
      } else {
        Cow::Owned(slice.to_vec())
      },
    )
  }

  /// Bulk-reads `count` consecutive little-endian doubles into `out`,
  /// matching the per-element semantics of repeated [`read_double`]
  /// calls. Uses `byteorder`'s bulk helper rather than a manual loop,
  /// since this path exists purely as a throughput optimization.
  pub fn read_double_array_into(&mut self, count: usize, out: &mut Vec<f64>) -> Result<()> {
    let byte_len = count * 8;
    let slice = self.bytes(byte_len)?;
    let start = out.len();
    out.resize(start + count, 0.0);
    LittleEndian::read_f64_into(slice, &mut out[start..]);
    self.cursor += byte_len;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn dec(buf: &[u8]) -> Decoder { Decoder::new(buf, DecoderOptions::default()) }

  #[test]
  fn fixed_width_round_trip() {
    let mut d = dec(&[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(d.read_u8().unwrap(), 0x01);
    assert_eq!(d.read_u8().unwrap(), 0x02);
    let mut d = dec(&[0x34, 0x12]);
    assert_eq!(d.read_u16().unwrap(), 0x1234);
    let mut d = dec(&[0x78, 0x56, 0x34, 0x12]);
    assert_eq!(d.read_u32().unwrap(), 0x1234_5678);
  }

  #[test]
  fn varint_single_byte() {
    let mut d = dec(&[0x00]);
    assert_eq!(d.read_unsigned_varint32().unwrap(), 0);
    let mut d = dec(&[0x7F]);
    assert_eq!(d.read_unsigned_varint32().unwrap(), 127);
  }

  #[test]
  fn varint_multi_byte() {
    let mut d = dec(&[0x96, 0x01]); // 150
    assert_eq!(d.read_unsigned_varint32().unwrap(), 150);
  }

  #[test]
  fn varint_past_end_fails() {
    let mut d = dec(&[0x80]);
    assert!(matches!(d.read_unsigned_varint32().unwrap_err(), DecodeError::ReadPastEnd { .. }));
  }

  #[test]
  fn varint64_round_trip() {
    for v in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX, 1u64 << 40] {
      let mut buf = Vec::new();
      let mut remaining = v;
      loop {
        let byte = (remaining & 0x7F) as u8;
        remaining >>= 7;
        if remaining == 0 {
          buf.push(byte);
          break;
        } else {
          buf.push(byte | 0x80);
        }
      }
      let mut d = dec(&buf);
      let got = d.read_split_varint64(|lo, hi| (hi as u64) << 32 | lo as u64).unwrap();
      assert_eq!(got, v, "roundtrip for {v}");
    }
  }

  #[test]
  fn optimistic_tag_match() {
    let mut d = dec(&[0x08, 0xFF]);
    assert_eq!(d.read_unsigned_varint32_if_equal(1).unwrap(), 0);
    assert_eq!(d.cursor(), 1);

    let mut d = dec(&[0x09, 0xFF]);
    assert!(d.read_unsigned_varint32_if_equal(1).is_none());
    assert_eq!(d.cursor(), 0, "must not move the cursor on mismatch");

    let mut d = dec(&[]);
    assert!(d.read_unsigned_varint32_if_equal(1).is_none());
    assert_eq!(d.cursor(), 0, "must not panic or move on eof");
  }

  #[test]
  fn bytes_alias_policy() {
    let data = [1u8, 2, 3, 4, 5];
    let mut d = Decoder::new(&data, DecoderOptions { alias_bytes_fields: true, ..Default::default() });
    let v = d.read_bytes(3).unwrap();
    assert!(matches!(v, Cow::Borrowed(_)));

    let mut d = Decoder::new(&data, DecoderOptions::default());
    let v = d.read_bytes(3).unwrap();
    assert!(matches!(v, Cow::Owned(_)));
  }

  #[test]
  fn double_array_bulk() {
    let values = [1.5f64, -2.25, 0.0, f64::INFINITY];
    let mut buf = Vec::new();
    for v in values {
      buf.extend_from_slice(&v.to_le_bytes());
    }
    let mut d = dec(&buf);
    let mut out = Vec::new();
    d.read_double_array_into(values.len(), &mut out).unwrap();
    assert_eq!(out, values);
  }
}
