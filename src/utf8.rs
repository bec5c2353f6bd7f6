//! Hand-rolled UTF-8 decode/encode, matching the exact overlong- and
//! surrogate-rejection rules of the original implementation byte-for-byte,
//! rather than delegating to `std::str::from_utf8` (whose error reporting
//! doesn't expose the "resume at the disproving byte, don't consume it"
//! replacement rule this crate needs for lenient decoding).

use std::fmt;

/// What to do when a decode hits an invalid byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf8Policy {
  /// Stop and return [`Utf8DecodeError`].
  Fatal,
  /// Emit U+FFFD and resume scanning at the byte that disproved the
  /// sequence (that byte is not consumed; it may start a new sequence).
  Replace,
}

/// What to do when an unpaired UTF-16 surrogate is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurrogatePolicy {
  /// Reject with [`Utf8EncodeError`].
  Strict,
  /// Emit U+FFFD in its place.
  Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utf8DecodeError;
impl fmt::Display for Utf8DecodeError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "invalid utf-8 byte sequence") }
}
impl std::error::Error for Utf8DecodeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utf8EncodeError;
impl fmt::Display for Utf8EncodeError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "unpaired utf-16 surrogate") }
}
impl std::error::Error for Utf8EncodeError {}

const REPLACEMENT: char = '\u{FFFD}';

/// Decodes a byte slice to a `String` per the policy. On `Fatal`, any
/// invalid sequence aborts the whole decode. On `Replace`, each invalid
/// sequence becomes one U+FFFD and scanning resumes at the byte that
/// disproved the sequence, without consuming it.
pub fn decode(bytes: &[u8], policy: Utf8Policy) -> Result<String, Utf8DecodeError> {
  let mut out = String::with_capacity(bytes.len());
  let mut i = 0;
  while i < bytes.len() {
    match decode_one(bytes, i) {
      Some((ch, len)) => {
        out.push(ch);
        i += len;
      }
      None => match policy {
        Utf8Policy::Fatal => return Err(Utf8DecodeError),
        Utf8Policy::Replace => {
          out.push(REPLACEMENT);
          i += 1;
        }
      },
    }
  }
  Ok(out)
}

/// Attempts to decode a single codepoint starting at `i`. Returns the
/// decoded `char` and the number of bytes consumed, or `None` if the byte
/// at `i` does not start a valid sequence (the caller advances by exactly
/// one byte and retries, per the "resume at the disproving byte" rule).
fn decode_one(bytes: &[u8], i: usize) -> Option<(char, usize)> {
  let b0 = bytes[i];
  if b0 < 0x80 {
    return Some((b0 as char, 1));
  }
  if b0 < 0xC2 {
    // continuation byte or overlong two-byte lead (C0/C1)
    return None;
  }
  if b0 < 0xE0 {
    let b1 = *bytes.get(i + 1)?;
    if !is_cont(b1) {
      return None;
    }
    let cp = ((b0 as u32 & 0x1F) << 6) | (b1 as u32 & 0x3F);
    return Some((char::from_u32(cp)?, 2));
  }
  if b0 < 0xF0 {
    let b1 = *bytes.get(i + 1)?;
    if !is_cont(b1) {
      return None;
    }
    // overlong: E0 with second byte < A0
    if b0 == 0xE0 && b1 < 0xA0 {
      return None;
    }
    // surrogate range: ED with second byte >= A0
    if b0 == 0xED && b1 >= 0xA0 {
      return None;
    }
    let b2 = *bytes.get(i + 2)?;
    if !is_cont(b2) {
      return None;
    }
    let cp = ((b0 as u32 & 0x0F) << 12) | ((b1 as u32 & 0x3F) << 6) | (b2 as u32 & 0x3F);
    return Some((char::from_u32(cp)?, 3));
  }
  if b0 <= 0xF4 {
    let b1 = *bytes.get(i + 1)?;
    if !is_cont(b1) {
      return None;
    }
    // overlong: F0 with second byte < 90
    if b0 == 0xF0 && b1 < 0x90 {
      return None;
    }
    // out of range: F4 with second byte > 8F (would exceed U+10FFFF)
    if b0 == 0xF4 && b1 > 0x8F {
      return None;
    }
    let b2 = *bytes.get(i + 2)?;
    if !is_cont(b2) {
      return None;
    }
    let b3 = *bytes.get(i + 3)?;
    if !is_cont(b3) {
      return None;
    }
    let cp = ((b0 as u32 & 0x07) << 18)
      | ((b1 as u32 & 0x3F) << 12)
      | ((b2 as u32 & 0x3F) << 6)
      | (b3 as u32 & 0x3F);
    return Some((char::from_u32(cp)?, 4));
  }
  None
}

#[inline]
fn is_cont(b: u8) -> bool { b & 0xC0 == 0x80 }

/// Encodes a `&str` to UTF-8 bytes. Infallible: Rust's `&str` is already
/// guaranteed to be valid UTF-8, so this is just a borrow of the bytes.
pub fn encode_str(s: &str) -> &[u8] { s.as_bytes() }

/// The [`SurrogatePolicy`] selected by the `strict-surrogates` feature:
/// `Strict` when enabled, `Replace` (the default) otherwise.
pub const fn default_surrogate_policy() -> SurrogatePolicy {
  if cfg!(feature = "strict-surrogates") {
    SurrogatePolicy::Strict
  } else {
    SurrogatePolicy::Replace
  }
}

/// [`encode_utf16`] under [`default_surrogate_policy`].
pub fn encode_utf16_default(units: &[u16]) -> Result<Vec<u8>, Utf8EncodeError> {
  encode_utf16(units, default_surrogate_policy())
}

/// Encodes a sequence of UTF-16 code units to UTF-8, pairing high+low
/// surrogates into a codepoint. An unpaired surrogate is rejected
/// (`Strict`) or replaced with U+FFFD (`Replace`).
pub fn encode_utf16(units: &[u16], policy: SurrogatePolicy) -> Result<Vec<u8>, Utf8EncodeError> {
  let mut out = Vec::with_capacity(units.len() * 3);
  let mut i = 0;
  while i < units.len() {
    let unit = units[i];
    let ch = if (0xD800..=0xDBFF).contains(&unit) {
      // high surrogate; look for a following low surrogate
      match units.get(i + 1) {
        Some(&low) if (0xDC00..=0xDFFF).contains(&low) => {
          i += 1;
          let cp = 0x10000 + ((unit as u32 - 0xD800) << 10) + (low as u32 - 0xDC00);
          char::from_u32(cp).unwrap()
        }
        _ => match policy {
          SurrogatePolicy::Strict => return Err(Utf8EncodeError),
          SurrogatePolicy::Replace => REPLACEMENT,
        },
      }
    } else if (0xDC00..=0xDFFF).contains(&unit) {
      // lone low surrogate
      match policy {
        SurrogatePolicy::Strict => return Err(Utf8EncodeError),
        SurrogatePolicy::Replace => REPLACEMENT,
      }
    } else {
      char::from_u32(unit as u32).unwrap()
    };
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    i += 1;
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ascii() {
    assert_eq!(decode(b"hello", Utf8Policy::Fatal).unwrap(), "hello");
  }

  #[test]
  fn overlong_rejected() {
    assert!(decode(&[0xC0, 0x80], Utf8Policy::Fatal).is_err());
    assert!(decode(&[0xC1, 0xBF], Utf8Policy::Fatal).is_err());
    assert!(decode(&[0xE0, 0x80, 0x80], Utf8Policy::Fatal).is_err());
    assert!(decode(&[0xF0, 0x80, 0x80, 0x80], Utf8Policy::Fatal).is_err());
  }

  #[test]
  fn surrogate_range_rejected() {
    assert!(decode(&[0xED, 0xA0, 0x80], Utf8Policy::Fatal).is_err());
  }

  #[test]
  fn codepoint_too_large_rejected() {
    assert!(decode(&[0xF4, 0x90, 0x80, 0x80], Utf8Policy::Fatal).is_err());
    assert!(decode(&[0xF4, 0x8F, 0xBF, 0xBF], Utf8Policy::Fatal).is_ok());
  }

  #[test]
  fn truncated_rejected() {
    assert!(decode(&[0xE2, 0x82], Utf8Policy::Fatal).is_err());
  }

  // The scenario from the spec: `4A 06 2A 65 A9 60 F8 27 48 38 05 C0`.
  #[test]
  fn scenario_lenient_vs_fatal() {
    let bytes = [0x4A, 0x06, 0x2A, 0x65, 0xA9, 0x60, 0xF8, 0x27, 0x48, 0x38, 0x05, 0xC0];
    let lenient = decode(&bytes, Utf8Policy::Replace).unwrap();
    assert_eq!(lenient.chars().count(), 12);
    assert!(decode(&bytes, Utf8Policy::Fatal).is_err());
  }

  #[test]
  fn utf16_surrogate_pair() {
    // U+1F600 GRINNING FACE as a surrogate pair.
    let units = [0xD83D, 0xDE00];
    let bytes = encode_utf16(&units, SurrogatePolicy::Strict).unwrap();
    assert_eq!(decode(&bytes, Utf8Policy::Fatal).unwrap(), "\u{1F600}");
  }

  #[test]
  fn utf16_unpaired_surrogate() {
    let units = [0xD800u16];
    assert!(encode_utf16(&units, SurrogatePolicy::Strict).is_err());
    let bytes = encode_utf16(&units, SurrogatePolicy::Replace).unwrap();
    assert_eq!(decode(&bytes, Utf8Policy::Fatal).unwrap(), "\u{FFFD}");
  }
}
