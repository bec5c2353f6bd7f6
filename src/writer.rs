//! The writer half of the field-tag state machine (C6): field headers,
//! ranged scalar writes, submessage/group/MessageSet framing, and packed
//! repeated writes.
//!
//! Generalizes the shape of the teacher's `bb_transfer::write::MessageWriter`
//! (header-then-payload writes chained off `&mut self`) to protobuf's
//! tag/length framing. Submessages and packed runs are built into a
//! scratch `Encoder` first so their exact length is known before the
//! minimal-width length varint is written — `bb_transfer` never needed
//! this since its own struct framing carries no length prefix.

use log::trace;

use crate::encoder::Encoder;
use crate::error::WriteError;
use crate::{make_tag, WireType};

type Result<T> = std::result::Result<T, WriteError>;

/// Runtime configuration for a [`Writer`]. Presently empty; kept as a
/// struct (rather than a unit type) so new knobs can land without
/// changing `Writer::new`'s signature, the way `ReaderOptions` already
/// does on the read side.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriterOptions {}

/// Chains primitive writes from [`Encoder`] behind protobuf's tag/length
/// framing.
pub struct Writer {
  encoder: Encoder,
  #[allow(dead_code)]
  options: WriterOptions,
}

impl Default for Writer {
  fn default() -> Self { Self::new() }
}

impl Writer {
  pub fn new() -> Self { Writer::with_options(WriterOptions::default()) }
  pub fn with_options(options: WriterOptions) -> Self { Writer { encoder: Encoder::new(), options } }

  /// Detaches and returns the accumulated bytes, resetting the writer.
  pub fn get_result_buffer(&mut self) -> Vec<u8> { self.encoder.end() }
  pub fn length(&self) -> usize { self.encoder.length() }

  fn write_tag(&mut self, field: u32, wt: WireType) -> Result<()> {
    if field < 1 {
      return Err(WriteError::InvalidFieldNumber(field));
    }
    self.encoder.write_unsigned_varint32(make_tag(field, wt as u8));
    Ok(())
  }

  // ---- typed scalar writes -------------------------------------------

  pub fn write_int32(&mut self, field: u32, v: i32) -> Result<()> {
    self.write_tag(field, WireType::Varint)?;
    self.encoder.write_signed_varint32(v);
    Ok(())
  }
  pub fn write_uint32(&mut self, field: u32, v: u32) -> Result<()> {
    self.write_tag(field, WireType::Varint)?;
    self.encoder.write_unsigned_varint32(v);
    Ok(())
  }
  pub fn write_sint32(&mut self, field: u32, v: i32) -> Result<()> {
    self.write_tag(field, WireType::Varint)?;
    self.encoder.write_zigzag_varint32(v);
    Ok(())
  }
  pub fn write_int64(&mut self, field: u32, v: i64) -> Result<()> {
    self.write_tag(field, WireType::Varint)?;
    self.encoder.write_signed_varint64(v);
    Ok(())
  }
  pub fn write_uint64(&mut self, field: u32, v: u64) -> Result<()> {
    self.write_tag(field, WireType::Varint)?;
    self.encoder.write_unsigned_varint64(v);
    Ok(())
  }
  pub fn write_sint64(&mut self, field: u32, v: i64) -> Result<()> {
    self.write_tag(field, WireType::Varint)?;
    self.encoder.write_zigzag_varint64(v);
    Ok(())
  }
  pub fn write_fixed32(&mut self, field: u32, v: u32) -> Result<()> {
    self.write_tag(field, WireType::Fixed32)?;
    self.encoder.write_u32(v);
    Ok(())
  }
  pub fn write_sfixed32(&mut self, field: u32, v: i32) -> Result<()> {
    self.write_tag(field, WireType::Fixed32)?;
    self.encoder.write_i32(v);
    Ok(())
  }
  pub fn write_fixed64(&mut self, field: u32, v: u64) -> Result<()> {
    self.write_tag(field, WireType::Fixed64)?;
    let (lo, hi) = crate::int64::u64_to_split64(v);
    self.encoder.write_split_fixed64(lo, hi);
    Ok(())
  }
  pub fn write_sfixed64(&mut self, field: u32, v: i64) -> Result<()> {
    self.write_tag(field, WireType::Fixed64)?;
    let (lo, hi) = crate::int64::i64_to_split64(v);
    self.encoder.write_split_fixed64(lo, hi);
    Ok(())
  }
  pub fn write_float(&mut self, field: u32, v: f32) -> Result<()> {
    self.write_tag(field, WireType::Fixed32)?;
    self.encoder.write_float(v);
    Ok(())
  }
  pub fn write_double(&mut self, field: u32, v: f64) -> Result<()> {
    self.write_tag(field, WireType::Fixed64)?;
    self.encoder.write_double(v);
    Ok(())
  }
  pub fn write_bool(&mut self, field: u32, v: bool) -> Result<()> {
    self.write_tag(field, WireType::Varint)?;
    self.encoder.write_bool(v);
    Ok(())
  }
  pub fn write_enum(&mut self, field: u32, v: i32) -> Result<()> { self.write_int32(field, v) }

  pub fn write_uint64_string(&mut self, field: u32, s: &str) -> Result<()> {
    self.write_tag(field, WireType::Varint)?;
    let split = crate::int64::from_decimal_string(s, false)
      .map_err(|_| WriteError::OutOfRange { value: 0, min: 0, max: u64::MAX as i128, type_name: "uint64" })?;
    self.encoder.write_split_varint64(split.0, split.1);
    Ok(())
  }
  pub fn write_int64_string(&mut self, field: u32, s: &str) -> Result<()> {
    self.write_tag(field, WireType::Varint)?;
    let split = crate::int64::from_decimal_string(s, true)
      .map_err(|_| WriteError::OutOfRange { value: 0, min: i64::MIN as i128, max: i64::MAX as i128, type_name: "int64" })?;
    self.encoder.write_split_varint64(split.0, split.1);
    Ok(())
  }

  pub fn write_string(&mut self, field: u32, s: &str) -> Result<()> {
    self.write_tag(field, WireType::Delimited)?;
    self.encoder.write_unsigned_varint32(s.len() as u32);
    self.encoder.write_buf(s.as_bytes());
    Ok(())
  }

  pub fn write_bytes(&mut self, field: u32, bytes: &[u8]) -> Result<()> {
    self.write_tag(field, WireType::Delimited)?;
    self.encoder.write_unsigned_varint32(bytes.len() as u32);
    self.encoder.write_buf(bytes);
    Ok(())
  }

  // ---- submessage / group framing -------------------------------------

  /// Writes a length-delimited submessage. `writer_cb` writes its nested
  /// fields into a scratch `Encoder` swapped in for the duration of the
  /// call, so the exact body length is known before the length prefix is
  /// written — the prefix is always the canonical minimal-width varint,
  /// matching what a protobuf decoder expects byte-for-byte.
  pub fn write_message(&mut self, field: u32, writer_cb: impl FnOnce(&mut Writer) -> Result<()>) -> Result<()> {
    self.write_tag(field, WireType::Delimited)?;
    let mut inner = Encoder::new();
    std::mem::swap(&mut self.encoder, &mut inner);
    let result = writer_cb(self);
    std::mem::swap(&mut self.encoder, &mut inner);
    result?;
    let body = inner.end();
    trace!("write_message: field {field} body length {}", body.len());
    self.encoder.write_unsigned_varint32(body.len() as u32);
    self.encoder.write_buf(&body);
    Ok(())
  }

  /// Writes a group: `field` opens with `START_GROUP`, `writer_cb` emits
  /// the nested fields, and a matching `END_GROUP` tag closes it. Unlike
  /// `write_message`, there is no length prefix to bookmark.
  pub fn write_group(&mut self, field: u32, writer_cb: impl FnOnce(&mut Writer) -> Result<()>) -> Result<()> {
    self.write_tag(field, WireType::StartGroup)?;
    writer_cb(self)?;
    self.write_tag(field, WireType::EndGroup)?;
    Ok(())
  }

  /// Writes one MessageSet item: `{ group = 1 { uint32 type_id = 2; bytes
  /// message = 3; } }`, with `message_cb` supplying the encoded payload
  /// bytes for the extension identified by `type_id`.
  pub fn write_message_set_item(&mut self, type_id: u32, message: &[u8]) -> Result<()> {
    self.write_group(1, |w| {
      w.write_uint32(2, type_id)?;
      w.write_bytes(3, message)?;
      Ok(())
    })
  }

  // ---- packed repeated writes ------------------------------------------

  /// Writes a packed repeated field: one length-delimited run of
  /// concatenated native-form values, built into a scratch `Encoder` so
  /// the minimal-width length varint can be written up front, same as
  /// `write_message`.
  fn write_packed(&mut self, field: u32, mut write_each: impl FnMut(&mut Encoder)) -> Result<()> {
    self.write_tag(field, WireType::Delimited)?;
    let mut inner = Encoder::new();
    write_each(&mut inner);
    let body = inner.end();
    self.encoder.write_unsigned_varint32(body.len() as u32);
    self.encoder.write_buf(&body);
    Ok(())
  }

  pub fn write_packed_double(&mut self, field: u32, values: impl Iterator<Item = f64>) -> Result<()> {
    let values: Vec<f64> = values.collect();
    self.write_packed(field, |e| {
      for v in &values {
        e.write_double(*v);
      }
    })
  }
  pub fn write_packed_float(&mut self, field: u32, values: impl Iterator<Item = f32>) -> Result<()> {
    let values: Vec<f32> = values.collect();
    self.write_packed(field, |e| {
      for v in &values {
        e.write_float(*v);
      }
    })
  }
  pub fn write_packed_int32(&mut self, field: u32, values: impl Iterator<Item = i32>) -> Result<()> {
    let values: Vec<i32> = values.collect();
    self.write_packed(field, |e| {
      for v in &values {
        e.write_signed_varint32(*v);
      }
    })
  }
  pub fn write_packed_uint32(&mut self, field: u32, values: impl Iterator<Item = u32>) -> Result<()> {
    let values: Vec<u32> = values.collect();
    self.write_packed(field, |e| {
      for v in &values {
        e.write_unsigned_varint32(*v);
      }
    })
  }
  pub fn write_packed_bool(&mut self, field: u32, values: impl Iterator<Item = bool>) -> Result<()> {
    let values: Vec<bool> = values.collect();
    self.write_packed(field, |e| {
      for v in &values {
        e.write_bool(*v);
      }
    })
  }
  pub fn write_packed_fixed32(&mut self, field: u32, values: impl Iterator<Item = u32>) -> Result<()> {
    let values: Vec<u32> = values.collect();
    self.write_packed(field, |e| {
      for v in &values {
        e.write_u32(*v);
      }
    })
  }
}
