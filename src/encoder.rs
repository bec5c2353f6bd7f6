//! Low-level primitive writes into a growable byte buffer (C4).
//!
//! Mirrors the teacher's `bb_transfer::write::MessageWriter` private
//! `write_byte`/`write_varint`/`write_float`/`write_double`/`write_buf`
//! helpers, generalized to protobuf's byte-oriented varint/fixed layout.

use crate::int64;

/// A growable output buffer with primitive writes for every wire-level
/// scalar shape. Unlike [`Decoder`](crate::decoder::Decoder), writes never
/// fail on space (the buffer grows), so every method here is infallible.
#[derive(Debug, Default)]
pub struct Encoder {
  buf: Vec<u8>,
}

/// Accepts either a native float/double or one of the literal strings
/// `"Infinity"`, `"-Infinity"`, `"NaN"` as an alias for the corresponding
/// value, matching the original JS API surface for `write_float`/
/// `write_double`.
pub trait FloatLiteral<T> {
  fn resolve(self) -> T;
}
impl FloatLiteral<f32> for f32 {
  fn resolve(self) -> f32 { self }
}
impl FloatLiteral<f32> for &str {
  fn resolve(self) -> f32 {
    match self {
      "Infinity" => f32::INFINITY,
      "-Infinity" => f32::NEG_INFINITY,
      "NaN" => f32::NAN,
      other => other.parse().expect("float literal string must be numeric or a recognized alias"),
    }
  }
}
impl FloatLiteral<f64> for f64 {
  fn resolve(self) -> f64 { self }
}
impl FloatLiteral<f64> for &str {
  fn resolve(self) -> f64 {
    match self {
      "Infinity" => f64::INFINITY,
      "-Infinity" => f64::NEG_INFINITY,
      "NaN" => f64::NAN,
      other => other.parse().expect("float literal string must be numeric or a recognized alias"),
    }
  }
}

impl Encoder {
  pub fn new() -> Self { Encoder { buf: Vec::new() } }

  /// Current number of bytes written.
  pub fn length(&self) -> usize { self.buf.len() }

  /// Atomically detaches and returns the accumulated bytes, resetting the
  /// internal buffer to empty.
  pub fn end(&mut self) -> Vec<u8> { std::mem::take(&mut self.buf) }

  /// Borrows the bytes written so far without detaching them.
  pub fn as_slice(&self) -> &[u8] { &self.buf }

  pub fn write_u8(&mut self, v: u8) { self.buf.push(v); }
  pub fn write_i8(&mut self, v: i8) { self.write_u8(v as u8); }
  pub fn write_u16(&mut self, v: u16) { self.buf.extend_from_slice(&v.to_le_bytes()); }
  pub fn write_i16(&mut self, v: i16) { self.write_u16(v as u16); }
  pub fn write_u32(&mut self, v: u32) { self.buf.extend_from_slice(&v.to_le_bytes()); }
  pub fn write_i32(&mut self, v: i32) { self.write_u32(v as u32); }

  /// Writes a canonical base-128 unsigned varint, 1-5 bytes.
  pub fn write_unsigned_varint32(&mut self, mut v: u32) {
    loop {
      if v < 0x80 {
        self.write_u8(v as u8);
        return;
      }
      self.write_u8((v & 0x7F) as u8 | 0x80);
      v >>= 7;
    }
  }
  pub fn write_signed_varint32(&mut self, v: i32) { self.write_unsigned_varint32(v as u32); }

  /// Writes a split-64 pair as a canonical base-128 unsigned varint, 1-10
  /// bytes.
  pub fn write_split_varint64(&mut self, lo: u32, hi: u32) {
    let mut lo = lo;
    let mut hi = hi;
    loop {
      if hi == 0 && lo < 0x80 {
        self.write_u8(lo as u8);
        return;
      }
      self.write_u8((lo & 0x7F) as u8 | 0x80);
      let carry = (hi & 0x7F) << 25;
      lo = (lo >> 7) | carry;
      hi >>= 7;
    }
  }

  pub fn write_split_fixed64(&mut self, lo: u32, hi: u32) {
    self.write_u32(lo);
    self.write_u32(hi);
  }

  pub fn write_split_zigzag_varint64(&mut self, lo: u32, hi: u32) {
    let (lo, hi) = int64::zigzag_encode64((lo, hi));
    self.write_split_varint64(lo, hi);
  }

  /// Native-path unsigned 64-bit varint write.
  pub fn write_unsigned_varint64(&mut self, mut v: u64) {
    loop {
      if v < 0x80 {
        self.write_u8(v as u8);
        return;
      }
      self.write_u8((v & 0x7F) as u8 | 0x80);
      v >>= 7;
    }
  }
  /// Native-path signed 64-bit varint write (zig-zag encoded).
  pub fn write_signed_varint64(&mut self, v: i64) {
    self.write_unsigned_varint64(int64::zigzag_encode_i64(v));
  }

  pub fn write_zigzag_varint32(&mut self, v: i32) {
    self.write_unsigned_varint32(int64::zigzag_encode_i32(v));
  }
  pub fn write_zigzag_varint64(&mut self, v: i64) {
    self.write_unsigned_varint64(int64::zigzag_encode_i64(v));
  }
  /// Parses a decimal string (truncating mod 2^64, per `int64`), zig-zags
  /// it, and writes it as a varint.
  pub fn write_zigzag_varint64_string(&mut self, s: &str) -> Result<(), int64::Int64ParseError> {
    let split = int64::from_decimal_string(s, true)?;
    self.write_split_zigzag_varint64(split.0, split.1);
    Ok(())
  }

  pub fn write_float(&mut self, v: impl FloatLiteral<f32>) { self.write_u32(v.resolve().to_bits()); }
  pub fn write_double(&mut self, v: impl FloatLiteral<f64>) {
    self.buf.extend_from_slice(&v.resolve().to_bits().to_le_bytes());
  }

  pub fn write_bool(&mut self, v: bool) { self.write_u8(if v { 1 } else { 0 }); }

  pub fn write_buf(&mut self, bytes: &[u8]) { self.buf.extend_from_slice(bytes); }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decoder::{Decoder, DecoderOptions};

  #[test]
  fn fixed_width() {
    let mut e = Encoder::new();
    e.write_u32(0x1234_5678);
    assert_eq!(e.end(), vec![0x78, 0x56, 0x34, 0x12]);
  }

  #[test]
  fn varint_matches_canonical_protobuf_encoding() {
    let mut e = Encoder::new();
    e.write_unsigned_varint32(150);
    assert_eq!(e.end(), vec![0x96, 0x01]);
  }

  #[test]
  fn split_varint64_round_trip_via_decoder() {
    for v in [0u64, 1, 127, 128, u32::MAX as u64, u64::MAX, 1u64 << 40] {
      let mut e = Encoder::new();
      let (lo, hi) = int64::u64_to_split64(v);
      e.write_split_varint64(lo, hi);
      let bytes = e.end();
      let mut d = Decoder::new(&bytes, DecoderOptions::default());
      let got = d.read_split_varint64(|lo, hi| int64::split64_to_u64((lo, hi))).unwrap();
      assert_eq!(got, v);
      assert_eq!(d.cursor(), bytes.len());
    }
  }

  #[test]
  fn float_literal_aliases() {
    let mut e = Encoder::new();
    e.write_float("Infinity");
    e.write_float("-Infinity");
    e.write_float("NaN");
    let bytes = e.end();
    assert_eq!(f32::from_le_bytes(bytes[0..4].try_into().unwrap()), f32::INFINITY);
    assert_eq!(f32::from_le_bytes(bytes[4..8].try_into().unwrap()), f32::NEG_INFINITY);
    assert!(f32::from_le_bytes(bytes[8..12].try_into().unwrap()).is_nan());
  }

  #[test]
  fn zigzag_string_write() {
    let mut e = Encoder::new();
    e.write_zigzag_varint64_string("-9223372036854775808").unwrap();
    let bytes = e.end();
    let mut d = Decoder::new(&bytes, DecoderOptions::default());
    let split = d.read_split_varint64(|lo, hi| (lo, hi)).unwrap();
    assert_eq!(int64::split64_to_u64(split), u64::MAX); // canonical pair from spec.md §8
  }
}
