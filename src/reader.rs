//! The field-tag state machine (C5) — `advance_field`, typed reads,
//! submessage/group framing, skip, and packed reads.
//!
//! Generalizes the shape of the teacher's `bb_transfer::read::MessageReader`
//! (header-then-payload loop, forward-compatible field skipping in
//! `StructReader`/`EnumReader`) from bamboo's bespoke 3-bit framing to
//! protobuf's tag-then-payload wire format and its group/MessageSet
//! framing, which `bb_transfer` has no equivalent of.

use std::borrow::Cow;

use log::{trace, warn};

use crate::decoder::{Decoder, DecoderOptions};
use crate::error::{DecodeError, ReadError};
use crate::utf8::Utf8Policy;
use crate::{field_number, make_tag, wire_type, WireType};

type Result<T> = std::result::Result<T, ReadError>;

/// Runtime configuration for a [`Reader`]. See the Data Model section of
/// `SPEC_FULL.md` for how this maps onto the original's decision table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
  pub discard_unknown_fields: bool,
  pub alias_bytes_fields: bool,
  pub treat_new_data_as_immutable: bool,
}

impl From<ReaderOptions> for DecoderOptions {
  fn from(o: ReaderOptions) -> Self {
    DecoderOptions {
      alias_bytes_fields: o.alias_bytes_fields,
      treat_new_data_as_immutable: o.treat_new_data_as_immutable,
    }
  }
}

/// The tag most recently read by [`Reader::advance_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldInfo {
  field_number: u32,
  wire_type: WireType,
}

/// A field-tag state machine over a [`Decoder`].
pub struct Reader<'a> {
  decoder: Decoder<'a>,
  options: ReaderOptions,
  /// Cursor position immediately before the most recently read tag.
  field_cursor: usize,
  next: Option<FieldInfo>,
  /// Debug-only: whether the payload for `next` has been consumed yet
  /// (via a typed read or `skip_field`). Checked by the next
  /// `advance_field` call.
  #[cfg(debug_assertions)]
  consumed: bool,
}

impl<'a> Reader<'a> {
  pub fn new(data: &'a [u8], options: ReaderOptions) -> Self {
    Reader {
      decoder: Decoder::new(data, options.into()),
      options,
      field_cursor: 0,
      next: None,
      #[cfg(debug_assertions)]
      consumed: true,
    }
  }

  pub fn cursor(&self) -> usize { self.decoder.cursor() }
  pub fn at_end(&self) -> bool { self.decoder.at_end() }

  /// Rebinds this reader to an empty source and clears its read-position
  /// state, so a pooled instance comes back out of a
  /// [`Pool`](crate::pool::Pool) ready for a fresh `Reader::new`-like
  /// rebind via a subsequent `attach` on its decoder.
  pub(crate) fn rebind_empty(&mut self) {
    self.decoder.attach(&[], None, None);
    self.field_cursor = 0;
    self.next = None;
    #[cfg(debug_assertions)]
    {
      self.consumed = true;
    }
  }

  /// Reads the next field's tag. Returns `false` (preserving terminal
  /// state) if the decoder is already at its end boundary.
  ///
  /// # Panics (debug builds only)
  /// If the previous field's payload was not consumed by a typed read or
  /// `skip_field`, this is a programmer error and panics under
  /// `debug_assertions`.
  pub fn advance_field(&mut self) -> Result<bool> {
    #[cfg(debug_assertions)]
    {
      if !self.consumed {
        panic!("advance_field called again before the previous field was read or skipped");
      }
    }
    if self.decoder.at_end() {
      return Ok(false);
    }
    self.field_cursor = self.decoder.cursor();
    let header = self.decoder.read_unsigned_varint32().map_err(|e| self.note_decode_err(e))?;
    let wt = wire_type(header);
    let fnum = field_number(header);
    let wire_type = WireType::from_id(wt).ok_or_else(|| {
      warn!("invalid wire type {wt} at byte {}", self.field_cursor);
      ReadError::InvalidWireType { value: wt, position: self.field_cursor }
    })?;
    if fnum < 1 {
      warn!("invalid field number {fnum} at byte {}", self.field_cursor);
      return Err(ReadError::InvalidFieldNumber { value: fnum, position: self.field_cursor });
    }
    trace!("advance_field: field={fnum} wire_type={wire_type:?} at {}", self.field_cursor);
    self.next = Some(FieldInfo { field_number: fnum, wire_type });
    #[cfg(debug_assertions)]
    {
      self.consumed = false;
    }
    Ok(true)
  }

  /// Optimistic variant of `advance_field`: if the upcoming bytes are
  /// exactly the canonical encoding of `tag`, consumes them and populates
  /// the next-field state; otherwise leaves everything untouched.
  pub fn advance_field_if_tag_equals(&mut self, tag: u32) -> bool {
    let before = self.decoder.cursor();
    match self.decoder.read_unsigned_varint32_if_equal(tag) {
      Some(cursor) => {
        self.field_cursor = cursor;
        let wt = wire_type(tag);
        let fnum = field_number(tag);
        self.next =
          Some(FieldInfo { field_number: fnum, wire_type: WireType::from_id(wt).expect("caller-supplied tag must already be valid") });
        #[cfg(debug_assertions)]
        {
          self.consumed = false;
        }
        true
      }
      None => {
        debug_assert_eq!(self.decoder.cursor(), before);
        false
      }
    }
  }

  pub fn next_field_number(&self) -> Option<u32> { self.next.map(|f| f.field_number) }
  pub fn next_wire_type(&self) -> Option<WireType> { self.next.map(|f| f.wire_type) }

  fn mark_consumed(&mut self) {
    #[cfg(debug_assertions)]
    {
      self.consumed = true;
    }
  }

  fn expect_wire_type(&self, expected: WireType) {
    debug_assert_eq!(
      self.next.map(|f| f.wire_type),
      Some(expected),
      "caller contract violation: wrong wire type for this read"
    );
  }

  /// Logs a data-driven decode failure at its cursor position before it
  /// propagates up as a `ReadError`.
  fn note_decode_err(&self, e: DecodeError) -> ReadError {
    warn!("decode error at byte {}: {e}", self.decoder.cursor());
    ReadError::Decode(e)
  }

  /// Logs any other data-driven `ReadError` before it propagates.
  fn note_err(&self, e: ReadError) -> ReadError {
    warn!("read error at byte {}: {e}", self.decoder.cursor());
    e
  }

  // ---- typed reads -------------------------------------------------

  pub fn read_int32(&mut self) -> Result<i32> {
    self.expect_wire_type(WireType::Varint);
    let v = self.decoder.read_signed_varint32().map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }
  pub fn read_uint32(&mut self) -> Result<u32> {
    self.expect_wire_type(WireType::Varint);
    let v = self.decoder.read_unsigned_varint32().map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }
  pub fn read_sint32(&mut self) -> Result<i32> {
    self.expect_wire_type(WireType::Varint);
    let v = crate::int64::zigzag_decode_i32(self.decoder.read_unsigned_varint32().map_err(|e| self.note_decode_err(e))?);
    self.mark_consumed();
    Ok(v)
  }
  pub fn read_int64(&mut self) -> Result<i64> {
    self.expect_wire_type(WireType::Varint);
    let v = self.decoder.read_split_varint64(crate::int64::split64_to_i64).map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }
  pub fn read_uint64(&mut self) -> Result<u64> {
    self.expect_wire_type(WireType::Varint);
    let v = self.decoder.read_split_varint64(crate::int64::split64_to_u64).map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }
  pub fn read_sint64(&mut self) -> Result<i64> {
    self.expect_wire_type(WireType::Varint);
    let split = self.decoder.read_split_varint64(|lo, hi| (lo, hi)).map_err(|e| self.note_decode_err(e))?;
    let decoded = crate::int64::zigzag_decode64(split);
    self.mark_consumed();
    Ok(crate::int64::split64_to_i64(decoded))
  }
  pub fn read_fixed32(&mut self) -> Result<u32> {
    self.expect_wire_type(WireType::Fixed32);
    let v = self.decoder.read_u32().map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }
  pub fn read_sfixed32(&mut self) -> Result<i32> {
    self.expect_wire_type(WireType::Fixed32);
    let v = self.decoder.read_i32().map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }
  pub fn read_fixed64(&mut self) -> Result<u64> {
    self.expect_wire_type(WireType::Fixed64);
    let v = self.decoder.read_split_fixed64(crate::int64::split64_to_u64).map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }
  pub fn read_sfixed64(&mut self) -> Result<i64> {
    self.expect_wire_type(WireType::Fixed64);
    let v = self.decoder.read_split_fixed64(crate::int64::split64_to_i64).map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }
  pub fn read_float(&mut self) -> Result<f32> {
    self.expect_wire_type(WireType::Fixed32);
    let v = self.decoder.read_float().map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }
  pub fn read_double(&mut self) -> Result<f64> {
    self.expect_wire_type(WireType::Fixed64);
    let v = self.decoder.read_double().map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }
  pub fn read_bool(&mut self) -> Result<bool> {
    self.expect_wire_type(WireType::Varint);
    let v = self.decoder.read_bool().map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }
  pub fn read_enum(&mut self) -> Result<i32> { self.read_int32() }

  /// Decimal-string variants, for 64-bit fields carried as split-64 text
  /// (byte-for-byte parity with the original exchange format).
  pub fn read_uint64_string(&mut self) -> Result<String> {
    self.expect_wire_type(WireType::Varint);
    let split = self.decoder.read_split_varint64(|lo, hi| (lo, hi)).map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(crate::int64::to_unsigned_decimal_string(split))
  }
  pub fn read_int64_string(&mut self) -> Result<String> {
    self.expect_wire_type(WireType::Varint);
    let split = self.decoder.read_split_varint64(|lo, hi| (lo, hi)).map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(crate::int64::to_signed_decimal_string(split))
  }

  fn read_length(&mut self) -> Result<usize> {
    let raw = self.decoder.read_unsigned_varint32().map_err(|e| self.note_decode_err(e))?;
    if (raw as i32) < 0 {
      let err = DecodeError::NegativeLength(raw as i32 as i64);
      return Err(self.note_decode_err(err));
    }
    Ok(raw as usize)
  }

  pub fn read_string(&mut self) -> Result<String> {
    self.expect_wire_type(WireType::Delimited);
    let len = self.read_length()?;
    let v = self.decoder.read_string(len, Utf8Policy::Replace).map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v.unwrap_or_else(|_| unreachable!("Replace policy never fails")))
  }

  /// Enforces UTF-8 validity on a string field. Under the default
  /// `utf8-always` feature this always rejects invalid bytes; under
  /// `utf8-deprecated-proto3-only` it instead degrades to the same
  /// replace-on-error behavior as [`Reader::read_string`], for hosts
  /// migrating off lenient proto2-era decoding.
  pub fn read_string_require_utf8(&mut self) -> Result<String> {
    self.expect_wire_type(WireType::Delimited);
    let len = self.read_length()?;
    #[cfg(feature = "utf8-deprecated-proto3-only")]
    let policy = Utf8Policy::Replace;
    #[cfg(not(feature = "utf8-deprecated-proto3-only"))]
    let policy = Utf8Policy::Fatal;
    let v = self.decoder.read_string(len, policy).map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    v.map_err(|_| {
      warn!("invalid utf8 at byte {}", self.decoder.cursor());
      ReadError::InvalidUtf8
    })
  }

  pub fn read_bytes(&mut self) -> Result<Cow<'a, [u8]>> {
    self.expect_wire_type(WireType::Delimited);
    let len = self.read_length()?;
    let v = self.decoder.read_bytes(len).map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }

  pub fn read_byte_string(&mut self) -> Result<Cow<'a, [u8]>> {
    self.expect_wire_type(WireType::Delimited);
    let len = self.read_length()?;
    let v = self.decoder.read_byte_string(len).map_err(|e| self.note_decode_err(e))?;
    self.mark_consumed();
    Ok(v)
  }

  // ---- submessage / group framing -----------------------------------

  /// Reads a length-delimited submessage, narrowing the decoder's end
  /// boundary for the duration of `reader_cb`, then restoring it.
  pub fn read_message<T>(&mut self, reader_cb: impl FnOnce(&mut Reader<'a>) -> Result<T>) -> Result<T> {
    self.expect_wire_type(WireType::Delimited);
    let len = self.read_length()?;
    let old_end = self.decoder.end();
    let new_end = self.decoder.cursor() + len;
    if new_end > old_end {
      let err = ReadError::MessageLengthMismatch { declared: len, actual: old_end - self.decoder.cursor() };
      return Err(self.note_err(err));
    }
    self.decoder.set_end(new_end);
    trace!("read_message: entering submessage, end narrowed to {new_end}");
    let result = reader_cb(self);
    let result = result.and_then(|v| {
      if self.decoder.cursor() != new_end {
        let err = ReadError::MessageLengthMismatch { declared: len, actual: self.decoder.cursor() - (new_end - len) };
        Err(self.note_err(err))
      } else {
        Ok(v)
      }
    });
    self.decoder.set_end(old_end);
    self.decoder.set_cursor(new_end);
    self.mark_consumed();
    result
  }

  /// Reads a group. `reader_cb` is called once and must loop internally —
  /// calling `advance_field`, dispatching on `next_field_number()`/
  /// `next_wire_type()` the same way a top-level field loop would — and
  /// stop (without consuming) the moment it sees a field whose wire type
  /// is `END_GROUP`. This method then consumes that terminating tag
  /// itself and checks it matches `field`.
  pub fn read_group<T>(&mut self, field: u32, reader_cb: impl FnOnce(&mut Reader<'a>) -> Result<T>) -> Result<T> {
    debug_assert_eq!(self.next.map(|f| f.wire_type), Some(WireType::StartGroup));
    debug_assert_eq!(self.next.map(|f| f.field_number), Some(field));
    self.mark_consumed();
    trace!("read_group: entering group {field}");
    let value = reader_cb(self)?;
    match self.next {
      Some(FieldInfo { wire_type: WireType::EndGroup, field_number }) if field_number == field => {
        self.mark_consumed();
        Ok(value)
      }
      Some(FieldInfo { wire_type: WireType::EndGroup, field_number }) => {
        let err = ReadError::UnmatchedStartGroup { expected: field, found: field_number };
        Err(self.note_err(err))
      }
      _ if self.decoder.at_end() => Err(self.note_err(ReadError::UnmatchedStartGroupEof)),
      _ => Err(self.note_err(ReadError::GroupDidNotEndWithEndGroup)),
    }
  }

  /// Dispatches by the current wire type and advances past the field's
  /// payload without materializing it.
  pub fn skip_field(&mut self) -> Result<()> {
    let wt = self.next.map(|f| f.wire_type).expect("skip_field called with no current field");
    match wt {
      WireType::Varint => {
        self.decoder.read_split_varint64(|_, _| ()).map_err(|e| self.note_decode_err(e))?;
      }
      WireType::Fixed32 => {
        self.decoder.read_u32().map_err(|e| self.note_decode_err(e))?;
      }
      WireType::Fixed64 => {
        self.decoder.read_split_fixed64(|_, _| ()).map_err(|e| self.note_decode_err(e))?;
      }
      WireType::Delimited => {
        let len = self.read_length()?;
        self.decoder.read_bytes(len).map_err(|e| self.note_decode_err(e))?;
      }
      WireType::StartGroup => {
        self.skip_group()?;
      }
      WireType::EndGroup => {
        let err = ReadError::InvalidWireType { value: wt as u8, position: self.field_cursor };
        return Err(self.note_err(err));
      }
    }
    self.mark_consumed();
    Ok(())
  }

  /// Repeatedly advances and skips until an `END_GROUP` matching the
  /// field number of the `START_GROUP` that is currently `next` appears.
  fn skip_group(&mut self) -> Result<()> {
    let field = self.next.map(|f| f.field_number).expect("skip_group called without a START_GROUP");
    loop {
      if !self.advance_field()? {
        return Err(self.note_err(ReadError::UnmatchedStartGroupEof));
      }
      match self.next {
        Some(FieldInfo { wire_type: WireType::EndGroup, field_number }) if field_number == field => {
          self.mark_consumed();
          return Ok(());
        }
        Some(FieldInfo { wire_type: WireType::EndGroup, field_number }) => {
          let err = ReadError::UnmatchedStartGroup { expected: field, found: field_number };
          return Err(self.note_err(err));
        }
        _ => self.skip_field()?,
      }
    }
  }

  // ---- packed repeated reads -----------------------------------------

  /// Reads a repeated scalar field, handling both the packed
  /// (length-delimited run of native-form values) and unpacked (one
  /// tagged field per element) encodings transparently.
  ///
  /// `read_one` reads exactly one native-form value at the current cursor
  /// (no length framing); it's called once for unpacked fields and
  /// repeatedly, until the inner window is exhausted, for packed ones.
  pub fn read_packable<T>(&mut self, read_one: impl Fn(&mut Decoder<'a>) -> std::result::Result<T, DecodeError>) -> Result<Vec<T>> {
    if self.next.map(|f| f.wire_type) == Some(WireType::Delimited) {
      let len = self.read_length()?;
      let old_end = self.decoder.end();
      let new_end = self.decoder.cursor() + len;
      if new_end > old_end {
        let err = ReadError::MessageLengthMismatch { declared: len, actual: old_end - self.decoder.cursor() };
        return Err(self.note_err(err));
      }
      self.decoder.set_end(new_end);
      let mut out = Vec::new();
      while self.decoder.cursor() < new_end {
        out.push(read_one(&mut self.decoder).map_err(|e| self.note_decode_err(e))?);
      }
      self.decoder.set_end(old_end);
      self.mark_consumed();
      Ok(out)
    } else {
      let v = read_one(&mut self.decoder).map_err(|e| self.note_decode_err(e))?;
      self.mark_consumed();
      Ok(vec![v])
    }
  }

  // ---- MessageSet -----------------------------------------------------

  /// True when the current tag is `makeTag(1, START_GROUP)`, the shape of
  /// a MessageSet item.
  pub fn is_message_set_item(&self) -> bool {
    self.next == Some(FieldInfo { field_number: 1, wire_type: WireType::StartGroup })
  }

  /// Parses one MessageSet item: `{ repeated group Item = 1 { required
  /// uint32 type_id = 2; required bytes message = 3; } }`. First-seen
  /// `type_id` and first-seen `message` win. If the payload precedes the
  /// type id, the cursor is saved and the payload is skipped; on seeing
  /// the type id, the cursor is restored and `cb(type_id, reader)` is
  /// invoked. Ends only on a well-formed `END_GROUP` matching field 1.
  pub fn read_message_set_item(
    &mut self,
    mut cb: impl FnMut(u32, &mut Reader<'a>) -> Result<()>,
  ) -> Result<()> {
    debug_assert!(self.is_message_set_item());
    self.mark_consumed();

    let mut type_id: Option<u32> = None;
    let mut payload_cursor: Option<usize> = None;
    let mut dispatched = false;

    loop {
      if !self.advance_field()? {
        return Err(self.note_err(ReadError::MalformedMessageSet));
      }
      match self.next {
        Some(FieldInfo { wire_type: WireType::EndGroup, field_number: 1 }) => {
          self.mark_consumed();
          return Ok(());
        }
        Some(FieldInfo { wire_type: WireType::EndGroup, .. }) => {
          return Err(self.note_err(ReadError::MalformedMessageSet));
        }
        Some(FieldInfo { field_number: 2, wire_type: WireType::Varint }) if type_id.is_none() => {
          let id = self.read_uint32()?;
          type_id = Some(id);
          if !dispatched {
            if let Some(cursor) = payload_cursor.take() {
              // payload was seen first; rewind (internal, non-observable)
              let saved = self.decoder.cursor();
              self.decoder.set_cursor(cursor);
              self.replay_message_payload(id, &mut cb)?;
              self.decoder.set_cursor(saved);
              dispatched = true;
            }
          }
        }
        Some(FieldInfo { field_number: 3, wire_type: WireType::Delimited }) if payload_cursor.is_none() && !dispatched => {
          if let Some(id) = type_id {
            cb(id, self)?;
            dispatched = true;
          } else {
            payload_cursor = Some(self.field_cursor);
            self.skip_field()?;
          }
        }
        _ => self.skip_field()?,
      }
    }
  }

  /// Replays the field-3 payload at `field_cursor` (already known to be
  /// `DELIMITED`) to dispatch `cb`, used by the payload-before-type-id
  /// rewind path in `read_message_set_item`. Bypasses the consumed-field
  /// assertion deliberately — this rewind is an internal implementation
  /// detail, not something the outer caller observes.
  fn replay_message_payload(&mut self, id: u32, cb: &mut impl FnMut(u32, &mut Reader<'a>) -> Result<()>) -> Result<()> {
    self.decoder.read_unsigned_varint32().map_err(|e| self.note_decode_err(e))?; // re-read the tag
    self.next = Some(FieldInfo { field_number: 3, wire_type: WireType::Delimited });
    #[cfg(debug_assertions)]
    {
      self.consumed = false;
    }
    cb(id, self)
  }

  // ---- unknown fields --------------------------------------------------

  /// Snapshots `field_cursor`, skips the field, and returns the raw byte
  /// range `[field_cursor, cursor)` for verbatim round-trip storage —
  /// unless `discard_unknown_fields` is set, in which case `None` is
  /// returned after still skipping the field.
  pub fn read_unknown_field(&mut self, full_data: &'a [u8]) -> Result<Option<&'a [u8]>> {
    let start = self.field_cursor;
    self.skip_field()?;
    let end = self.decoder.cursor();
    Ok(if self.options.discard_unknown_fields { None } else { Some(&full_data[start..end]) })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::writer::Writer;
  use pretty_assertions::assert_eq;

  #[test]
  fn round_trip_all_wire_types_scenario() {
    // Scenario 1 from spec.md §8.
    let mut w = Writer::new();
    w.write_int32(1, 100).unwrap();
    w.write_string(2, "Hello world").unwrap();
    w.write_bytes(3, &[1, 2, 3]).unwrap();
    w.write_uint32(4, 200).unwrap();
    let bytes = w.get_result_buffer();
    let expected = hex("0864120b48656c6c6f20776f726c641a0301020320c801");
    assert_eq!(bytes, expected);

    let mut r = Reader::new(&bytes, ReaderOptions::default());
    assert!(r.advance_field().unwrap());
    assert_eq!(r.next_field_number(), Some(1));
    assert_eq!(r.read_int32().unwrap(), 100);
    assert!(r.advance_field().unwrap());
    assert_eq!(r.read_string().unwrap(), "Hello world");
    assert!(r.advance_field().unwrap());
    assert_eq!(r.read_bytes().unwrap().as_ref(), &[1, 2, 3]);
    assert!(r.advance_field().unwrap());
    assert_eq!(r.read_uint32().unwrap(), 200);
    assert!(!r.advance_field().unwrap());
  }

  #[test]
  fn nested_submessage_bookmark_scenario() {
    // Scenario 3 from spec.md §8.
    let mut w = Writer::new();
    w.write_message(1, |w| {
      w.write_message(1, |w| {
        w.write_bytes(1, &[1, 2, 3, 4, 5])?;
        Ok(())
      })?;
      Ok(())
    })
    .unwrap();
    let bytes = w.get_result_buffer();
    // Canonical minimal-varint encoding: innermost bytes field is
    // 0A 05 <5 bytes> (7), wrapped twice as 0A <len> <body> — each wrap
    // adding exactly 2 bytes of tag+length, so outer length = inner
    // length + 4, total 11 bytes. A fixed-width bookmark would instead
    // pad every length prefix out to 5 bytes.
    assert_eq!(bytes, hex("0a090a070a050102030405"));

    let mut r = Reader::new(&bytes, ReaderOptions::default());
    assert!(r.advance_field().unwrap());
    r.read_message(|r| {
      assert!(r.advance_field().unwrap());
      r.read_message(|r| {
        assert!(r.advance_field().unwrap());
        assert_eq!(r.read_bytes().unwrap().as_ref(), &[1, 2, 3, 4, 5]);
        Ok(())
      })
    })
    .unwrap();
    assert!(!r.advance_field().unwrap());
  }

  #[test]
  fn skip_field_sentinel_scenario() {
    // Scenario 4 from spec.md §8 (simplified): sentinel field 1 interleaved
    // with noise fields of the same field number.
    let mut w = Writer::new();
    w.write_int32(1, 123456789).unwrap();
    w.write_string(1, "noise").unwrap();
    w.write_fixed32(1, 0xDEAD_BEEF).unwrap();
    w.write_int32(1, 123456789).unwrap();
    let bytes = w.get_result_buffer();

    let mut r = Reader::new(&bytes, ReaderOptions::default());
    assert!(r.advance_field().unwrap());
    assert_eq!(r.read_int32().unwrap(), 123456789);
    assert!(r.advance_field().unwrap());
    r.skip_field().unwrap();
    assert!(r.advance_field().unwrap());
    r.skip_field().unwrap();
    assert!(r.advance_field().unwrap());
    assert_eq!(r.read_int32().unwrap(), 123456789);
  }

  /// A group-reading callback loops internally, stopping (without
  /// consuming) the moment it sees the terminating `END_GROUP` tag.
  fn read_hello_group_body(r: &mut Reader<'_>) -> Result<Option<String>> {
    let mut got = None;
    while r.advance_field()? {
      if r.next_wire_type() == Some(WireType::EndGroup) {
        break;
      }
      got = Some(r.read_string()?);
    }
    Ok(got)
  }

  #[test]
  fn group_framing_scenario() {
    // Scenario 5 from spec.md §8.
    let mut w = Writer::new();
    w.write_group(1, |w| {
      w.write_string(1, "hello")?;
      Ok(())
    })
    .unwrap();
    let bytes = w.get_result_buffer();

    let mut r = Reader::new(&bytes, ReaderOptions::default());
    assert!(r.advance_field().unwrap());
    let got = r.read_group(1, read_hello_group_body).unwrap();
    assert_eq!(got.as_deref(), Some("hello"));
  }

  #[test]
  fn group_mismatched_end_field_number() {
    let mut w = Writer::new();
    w.write_group(1, |w| {
      w.write_string(1, "hello")?;
      Ok(())
    })
    .unwrap();
    let mut bytes = w.get_result_buffer();
    // corrupt the terminal END_GROUP(1) tag to END_GROUP(2)
    let last = bytes.len() - 1;
    bytes[last] = make_tag(2, WireType::EndGroup as u8) as u8;

    let mut r = Reader::new(&bytes, ReaderOptions::default());
    assert!(r.advance_field().unwrap());
    let err = r.read_group(1, read_hello_group_body).unwrap_err();
    assert!(matches!(err, ReadError::UnmatchedStartGroup { expected: 1, found: 2 }));
  }

  #[test]
  fn group_truncated_end_tag_eof() {
    let mut w = Writer::new();
    w.write_group(1, |w| {
      w.write_string(1, "hello")?;
      Ok(())
    })
    .unwrap();
    let bytes = w.get_result_buffer();
    let truncated = &bytes[..bytes.len() - 1];

    let mut r = Reader::new(truncated, ReaderOptions::default());
    assert!(r.advance_field().unwrap());
    let err = r.read_group(1, read_hello_group_body).unwrap_err();
    assert!(matches!(err, ReadError::UnmatchedStartGroupEof));
  }

  #[test]
  fn group_callback_returns_without_end_group() {
    // A callback that stops early, before reaching the terminating
    // END_GROUP tag, must be caught rather than silently accepted.
    let mut w = Writer::new();
    w.write_group(1, |w| {
      w.write_string(1, "hello")?;
      w.write_string(1, "world")?;
      Ok(())
    })
    .unwrap();
    let bytes = w.get_result_buffer();

    let mut r = Reader::new(&bytes, ReaderOptions::default());
    assert!(r.advance_field().unwrap());
    let err = r
      .read_group(1, |r| {
        assert!(r.advance_field().unwrap());
        r.read_string()
      })
      .unwrap_err();
    assert!(matches!(err, ReadError::GroupDidNotEndWithEndGroup));
  }

  #[test]
  fn packed_doubles_scenario() {
    let values: Vec<f64> = (1..=10).map(|i| (i as f32 * 1.1) as f64).collect();
    let mut w = Writer::new();
    w.write_packed_double(2, values.iter().copied()).unwrap();
    let bytes = w.get_result_buffer();

    let mut r = Reader::new(&bytes, ReaderOptions::default());
    assert!(r.advance_field().unwrap());
    let got = r.read_packable(|d| d.read_double()).unwrap();
    assert_eq!(got, values);
  }

  fn hex(s: &str) -> Vec<u8> {
    (0..s.len()).step_by(2).map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap()).collect()
  }
}
