use std::{fmt, ptr::NonNull, slice};

use crate::error::{PoolError, Result};

/// A bulk byte buffer owned by one pool for its whole lifetime.
///
/// The buffer does not free itself; it must be handed back to the
/// [`BackingAllocator`] that produced it.
pub struct RawBuffer {
  ptr: NonNull<u8>,
  len: usize,
}

impl RawBuffer {
  /// Wraps memory obtained by a [`BackingAllocator`].
  ///
  /// # Safety
  ///
  /// `ptr` must be valid for reads and writes of `len` initialized bytes and
  /// must not be accessed through any other path until the buffer is released.
  pub unsafe fn from_raw_parts(
    ptr: NonNull<u8>,
    len: usize,
  ) -> Self {
    Self { ptr, len }
  }

  pub fn as_ptr(&self) -> *mut u8 {
    self.ptr.as_ptr()
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub(crate) fn as_slice(&self) -> &[u8] {
    // SAFETY: guaranteed by the `from_raw_parts` contract.
    unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
  }

  pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
    // SAFETY: guaranteed by the `from_raw_parts` contract, and `&mut self`
    // makes the access exclusive.
    unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
  }
}

impl fmt::Debug for RawBuffer {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("RawBuffer")
      .field("ptr", &self.ptr)
      .field("len", &self.len)
      .finish()
  }
}

/// Source of pool arenas. Called once when a pool opens and once when it
/// closes, never per allocation.
pub trait BackingAllocator {
  fn acquire(
    &mut self,
    bytes: usize,
  ) -> Result<RawBuffer>;

  fn release(
    &mut self,
    buffer: RawBuffer,
  );
}

/// Arenas from the C heap, zero-filled with `calloc(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcBacking;

impl BackingAllocator for LibcBacking {
  fn acquire(
    &mut self,
    bytes: usize,
  ) -> Result<RawBuffer> {
    let ptr = unsafe { libc::calloc(1, bytes) }.cast::<u8>();

    match NonNull::new(ptr) {
      // SAFETY: calloc returned `bytes` zeroed bytes that nobody else sees.
      Some(ptr) => Ok(unsafe { RawBuffer::from_raw_parts(ptr, bytes) }),
      None => {
        tracing::warn!(bytes, "calloc failed to provide pool arena");
        Err(PoolError::OutOfMemory { requested: bytes })
      }
    }
  }

  fn release(
    &mut self,
    buffer: RawBuffer,
  ) {
    unsafe { libc::free(buffer.as_ptr().cast()) }
  }
}
