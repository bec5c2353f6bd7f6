//! An explicit, opt-in free-list for reusing heap-allocated scratch
//! buffers (e.g. a `Writer`'s backing `Vec<u8>`) across many encode calls.
//!
//! Nothing in [`crate::reader`] or [`crate::writer`] reaches for this
//! implicitly — a caller that wants pooling constructs a `Pool` and passes
//! guards through explicitly, rather than the reuse happening behind a
//! hidden global the way some teacher-adjacent server code pools its
//! connection buffers.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;

struct Inner<T> {
  free: Mutex<Vec<T>>,
  cap: usize,
}

/// A bounded free-list of reusable `T` instances.
pub struct Pool<T> {
  inner: Arc<Inner<T>>,
}

impl<T> Clone for Pool<T> {
  fn clone(&self) -> Self { Pool { inner: self.inner.clone() } }
}

impl<T> Pool<T> {
  /// Creates a pool that retains at most `cap` returned instances;
  /// instances returned beyond that are simply dropped.
  pub fn new(cap: usize) -> Self { Pool { inner: Arc::new(Inner { free: Mutex::new(Vec::new()), cap }) } }

  /// Takes an instance from the free list, or builds a fresh one with
  /// `make` if the list is empty.
  pub fn take(&self, make: impl FnOnce() -> T) -> PoolGuard<T> {
    let value = self.inner.free.lock().pop().unwrap_or_else(make);
    PoolGuard { pool: self.clone(), value: Some(value) }
  }

  /// Current number of instances sitting in the free list.
  pub fn len(&self) -> usize { self.inner.free.lock().len() }
  pub fn is_empty(&self) -> bool { self.len() == 0 }

  fn give_back(&self, mut value: T, reset: impl FnOnce(&mut T)) {
    let mut free = self.inner.free.lock();
    if free.len() < self.inner.cap {
      reset(&mut value);
      free.push(value);
    }
  }
}

/// A checked-out `T`. Dropping it returns the value to its `Pool`, unless
/// it's been explicitly detached with [`PoolGuard::into_inner`].
pub struct PoolGuard<T> {
  pool: Pool<T>,
  value: Option<T>,
}

impl<T> PoolGuard<T> {
  /// Detaches the value from pool management — it will not be returned on
  /// drop.
  pub fn into_inner(mut self) -> T { self.value.take().expect("value present until drop") }
}

impl<T> Deref for PoolGuard<T> {
  type Target = T;
  fn deref(&self) -> &T { self.value.as_ref().expect("value present until drop") }
}
impl<T> DerefMut for PoolGuard<T> {
  fn deref_mut(&mut self) -> &mut T { self.value.as_mut().expect("value present until drop") }
}

impl<T: Resettable> Drop for PoolGuard<T> {
  fn drop(&mut self) {
    if let Some(value) = self.value.take() {
      self.pool.give_back(value, |v| v.reset());
    }
  }
}

/// Implemented by pooled types to describe how they're cleared before
/// being handed back out by [`Pool::take`].
pub trait Resettable {
  fn reset(&mut self);
}

impl Resettable for Vec<u8> {
  fn reset(&mut self) { self.clear(); }
}

impl Resettable for crate::encoder::Encoder {
  fn reset(&mut self) { self.end(); }
}

/// Per spec.md §3's "read position monotonic until reset; free returns to
/// pool" — rebinding to an empty slice drops the borrow of whatever buffer
/// the instance was last attached to and zeroes its cursor/end state, so
/// the next `take` gets a clean instance ready for `attach`/`Reader::new`
/// over a fresh source. A pooled `Decoder<'a>`/`Reader<'a>` only makes
/// sense for a `Pool` whose `'a` can outlive every checkout, e.g. `'static`
/// byte sources; shorter-lived borrows don't fit a long-lived free list.
impl<'a> Resettable for crate::decoder::Decoder<'a> {
  fn reset(&mut self) { self.attach(&[], None, None); }
}

impl<'a> Resettable for crate::reader::Reader<'a> {
  fn reset(&mut self) { self.rebind_empty(); }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reuses_returned_instances() {
    let pool: Pool<Vec<u8>> = Pool::new(4);
    {
      let mut g = pool.take(Vec::new);
      g.extend_from_slice(&[1, 2, 3]);
    }
    assert_eq!(pool.len(), 1);
    let g = pool.take(Vec::new);
    assert!(g.is_empty(), "returned instance must be reset before reuse");
  }

  #[test]
  fn respects_capacity() {
    let pool: Pool<Vec<u8>> = Pool::new(1);
    let a = pool.take(Vec::new);
    let b = pool.take(Vec::new);
    drop(a);
    drop(b);
    assert_eq!(pool.len(), 1);
  }

  #[test]
  fn detach_skips_return() {
    let pool: Pool<Vec<u8>> = Pool::new(4);
    let g = pool.take(Vec::new);
    let _v = g.into_inner();
    assert_eq!(pool.len(), 0);
  }

  #[test]
  fn decoder_and_reader_are_poolable() {
    use crate::decoder::{Decoder, DecoderOptions};
    use crate::reader::{Reader, ReaderOptions};

    static BYTES: &[u8] = &[0x08, 0x01];

    let decoders: Pool<Decoder<'static>> = Pool::new(4);
    {
      let mut g = decoders.take(|| Decoder::new(BYTES, DecoderOptions::default()));
      assert_eq!(g.read_unsigned_varint32().unwrap(), 0x08);
    }
    assert_eq!(decoders.len(), 1);
    let g = decoders.take(|| Decoder::new(BYTES, DecoderOptions::default()));
    assert_eq!(g.cursor(), 0, "returned decoder must be reset before reuse");

    let readers: Pool<Reader<'static>> = Pool::new(4);
    {
      let mut g = readers.take(|| Reader::new(BYTES, ReaderOptions::default()));
      assert!(g.advance_field().unwrap());
    }
    assert_eq!(readers.len(), 1);
    let g = readers.take(|| Reader::new(BYTES, ReaderOptions::default()));
    assert!(g.at_end(), "returned reader must be reset before reuse");
  }
}
