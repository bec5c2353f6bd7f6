//! Error taxonomy for the decoder/encoder/reader/writer.
//!
//! Data-driven failures (malformed bytes on the wire) are always reported,
//! regardless of build mode. Caller contract violations (wrong wire type
//! passed to a typed read, a negative field number passed to a writer) are
//! instead `debug_assert!`-guarded: checked in debug builds, elided in
//! release, matching the teacher's use of `assert!`/`debug_assert!` for
//! invariants such as `StructReader::read`'s field-ordering check.

use thiserror::Error;

/// Errors from the low-level [`Decoder`](crate::decoder::Decoder).
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum DecodeError {
  #[error("read past end: wanted {requested} bytes, {available} available")]
  ReadPastEnd { requested: usize, available: usize },
  #[error("a delimited field advertised a negative length: {0}")]
  NegativeLength(i64),
  #[error("varint did not terminate within its maximum length")]
  InvalidVarint,
}

/// Errors from the field-tag state machine in [`Reader`](crate::reader::Reader).
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum ReadError {
  #[error(transparent)]
  Decode(#[from] DecodeError),
  #[error("invalid utf8 in a string field")]
  InvalidUtf8,
  #[error("invalid wire type {value} at byte {position}")]
  InvalidWireType { value: u8, position: usize },
  #[error("invalid field number {value} at byte {position}")]
  InvalidFieldNumber { value: u32, position: usize },
  #[error("submessage declared length {declared}, callback consumed {actual}")]
  MessageLengthMismatch { declared: usize, actual: usize },
  #[error("hit eof before a matching END_GROUP")]
  UnmatchedStartGroupEof,
  #[error("END_GROUP field {found} did not match START_GROUP field {expected}")]
  UnmatchedStartGroup { expected: u32, found: u32 },
  #[error("group callback returned without consuming a matching END_GROUP tag")]
  GroupDidNotEndWithEndGroup,
  #[error("message-set group was structurally invalid")]
  MalformedMessageSet,
}

impl From<crate::utf8::Utf8DecodeError> for ReadError {
  fn from(_: crate::utf8::Utf8DecodeError) -> Self { ReadError::InvalidUtf8 }
}

/// Errors from the low-level [`Encoder`](crate::encoder::Encoder) and the
/// high-level [`Writer`](crate::writer::Writer).
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum WriteError {
  #[error("value {value} is out of range for {type_name} ({min}..{max})")]
  OutOfRange { value: i128, min: i128, max: i128, type_name: &'static str },
  #[error("field number must be >= 1, got {0}")]
  InvalidFieldNumber(u32),
}
