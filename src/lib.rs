//! Byte-accurate Protocol Buffers binary wire format codec.
//!
//! Four layers, from the bytes up:
//!
//! - [`decoder`] / [`encoder`] — primitive reads/writes over a cursor
//!   (varints, zig-zag, fixed scalars, length-delimited blobs).
//! - [`reader`] / [`writer`] — the field-tag state machine: `advance_field`,
//!   typed field reads, submessage/group framing, packed repeated fields.
//! - [`int64`] — split-64 `(lo, hi)` arithmetic, kept alongside native
//!   `i64`/`u64` paths for exchange-format parity.
//! - [`utf8`] — hand-rolled UTF-8 decode/encode with the exact
//!   overlong/surrogate rejection rules this format requires.
//!
//! [`pool`] is an optional, explicit instance-reuse facility; nothing in
//! the codec paths requires it.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod int64;
pub mod pool;
pub mod reader;
pub mod utf8;
pub mod writer;

pub use error::{DecodeError, ReadError, WriteError};
pub use reader::{Reader, ReaderOptions};
pub use writer::{Writer, WriterOptions};

/// The low three bits of a field tag, identifying the shape of the
/// payload that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
  /// Base-128 varint: int32, int64, uint32, uint64, sint32, sint64, bool,
  /// enum.
  Varint = 0,
  /// 8-byte little-endian: fixed64, sfixed64, double.
  Fixed64 = 1,
  /// Length-prefixed: string, bytes, embedded messages, packed repeated
  /// fields.
  Delimited = 2,
  /// Deprecated group framing: opens a run of fields terminated by the
  /// matching `EndGroup`.
  StartGroup = 3,
  /// Deprecated group framing: closes a `StartGroup`.
  EndGroup = 4,
  /// 4-byte little-endian: fixed32, sfixed32, float.
  Fixed32 = 5,
}

impl WireType {
  pub fn from_id(id: u8) -> Option<WireType> {
    match id {
      0 => Some(WireType::Varint),
      1 => Some(WireType::Fixed64),
      2 => Some(WireType::Delimited),
      3 => Some(WireType::StartGroup),
      4 => Some(WireType::EndGroup),
      5 => Some(WireType::Fixed32),
      _ => None,
    }
  }
}

/// Packs a field number and wire type into a single tag varint:
/// `(field_number << 3) | wire_type`.
pub fn make_tag(field_number: u32, wire_type: u8) -> u32 { (field_number << 3) | (wire_type as u32 & 0x7) }

/// Extracts the wire type (low 3 bits) from a tag.
pub fn wire_type(tag: u32) -> u8 { (tag & 0x7) as u8 }

/// Extracts the field number (upper 29 bits) from a tag.
pub fn field_number(tag: u32) -> u32 { tag >> 3 }
