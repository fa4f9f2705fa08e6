// src/internal/cache_padded.rs

//! Cache line padding for atomics that different threads hammer on.

use core::fmt;
use core::ops::{Deref, DerefMut};

#[repr(C)]
#[repr(align(64))]
#[derive(Clone, Copy, Default, Hash, PartialEq, Eq)]
struct AlignedInner64<T> {
  value: T,
}

#[repr(C)]
#[repr(align(128))]
#[derive(Clone, Copy, Default, Hash, PartialEq, Eq)]
struct AlignedInner128<T> {
  value: T,
}

// Per-architecture alignment selection. aarch64 cores prefetch in pairs of
// 64-byte lines, so padding to 128 avoids destructive interference there.
#[cfg(target_arch = "aarch64")]
mod arch_details {
  pub const CACHE_LINE_SIZE: usize = 128;
  pub type ArchAligned<T> = super::AlignedInner128<T>;
}

#[cfg(not(target_arch = "aarch64"))]
mod arch_details {
  pub const CACHE_LINE_SIZE: usize = 64;
  pub type ArchAligned<T> = super::AlignedInner64<T>;
}

/// A value of type `T` padded out to the length of a cache line.
#[derive(Clone, Copy, Default, Hash, PartialEq, Eq)]
pub(crate) struct CachePadded<T> {
  inner: arch_details::ArchAligned<T>,
}

impl<T> CachePadded<T> {
  /// Creates a new cache-padded value.
  #[inline]
  pub(crate) const fn new(value: T) -> Self {
    CachePadded {
      inner: arch_details::ArchAligned { value },
    }
  }

  /// The cache line size assumed for the current architecture.
  #[inline]
  pub(crate) const fn alignment_value() -> usize {
    arch_details::CACHE_LINE_SIZE
  }
}

impl<T> Deref for CachePadded<T> {
  type Target = T;
  #[inline]
  fn deref(&self) -> &T {
    &self.inner.value
  }
}

impl<T> DerefMut for CachePadded<T> {
  #[inline]
  fn deref_mut(&mut self) -> &mut T {
    &mut self.inner.value
  }
}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CachePadded")
      .field("value", &self.inner.value)
      .field("alignment", &Self::alignment_value())
      .finish()
  }
}

unsafe impl<T: Send> Send for CachePadded<T> {}
unsafe impl<T: Sync> Sync for CachePadded<T> {}
