// src/spsc/ring.rs

//! The lock-free single-producer / single-consumer ring buffer.
//!
//! Storage is a fixed array of `capacity + 1` slots split by two atomic
//! cursors: the readable range is `[read_index, write_index)` and the
//! writable range is `[write_index, read_index - 1)`, both modulo the slot
//! count. The cursors meeting means empty; the write cursor one step behind
//! the read cursor means full. One slot is always sacrificed so those two
//! states stay distinguishable.
//!
//! Synchronization is the classical acquire/release pairing: the producer
//! publishes element stores with a Release store of `write_index`, which the
//! consumer observes with an Acquire load before touching the slots (and the
//! mirror image for freed slots through `read_index`). Each cursor has
//! exactly one writing thread, so it can be read Relaxed by its owner.

use crate::error::Full;
use crate::internal::cache_padded::CachePadded;

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{self, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared storage and cursors, owned jointly by the two handles.
pub(crate) struct RingShared<T> {
  buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
  write_index: CachePadded<AtomicUsize>, // next slot to write (producer-owned)
  read_index: CachePadded<AtomicUsize>,  // next slot to read (consumer-owned)
}

// Slot access is partitioned by the cursor protocol: the producer only
// touches slots in the writable range, the consumer only slots in the
// readable range, and the Release/Acquire cursor handoff orders the two.
unsafe impl<T: Send> Send for RingShared<T> {}
unsafe impl<T: Send> Sync for RingShared<T> {}

impl<T> RingShared<T> {
  fn with_capacity(capacity: usize) -> Self {
    assert!(capacity > 0, "ring buffer capacity must be greater than 0");
    // Keeps `idx + advance` computable without overflow in advance().
    assert!(
      capacity < usize::MAX / 2,
      "ring buffer capacity must be below usize::MAX / 2"
    );

    let mut slots = Vec::with_capacity(capacity + 1);
    for _ in 0..capacity + 1 {
      slots.push(UnsafeCell::new(MaybeUninit::uninit()));
    }

    RingShared {
      buffer: slots.into_boxed_slice(),
      write_index: CachePadded::new(AtomicUsize::new(0)),
      read_index: CachePadded::new(AtomicUsize::new(0)),
    }
  }

  /// Number of slots, i.e. `capacity + 1`.
  #[inline]
  fn slots(&self) -> usize {
    self.buffer.len()
  }

  #[inline]
  fn capacity(&self) -> usize {
    self.buffer.len() - 1
  }

  #[inline]
  fn advance(&self, idx: usize, advancement: usize) -> usize {
    debug_assert!(idx < self.slots());
    debug_assert!(advancement <= self.capacity());
    (idx + advancement) % self.slots()
  }

  #[inline]
  fn readable(&self, rd_idx: usize, wr_idx: usize) -> usize {
    debug_assert!(rd_idx < self.slots());
    debug_assert!(wr_idx < self.slots());
    if wr_idx >= rd_idx {
      wr_idx - rd_idx
    } else {
      self.capacity() - (rd_idx - wr_idx - 1)
    }
  }

  #[inline]
  fn writable(&self, rd_idx: usize, wr_idx: usize) -> usize {
    self.capacity() - self.readable(rd_idx, wr_idx)
  }

  #[inline]
  fn is_empty(&self, rd_idx: usize, wr_idx: usize) -> bool {
    wr_idx == rd_idx
  }

  #[inline]
  fn is_full(&self, rd_idx: usize, wr_idx: usize) -> bool {
    (wr_idx + 1) % self.slots() == rd_idx
  }

  #[inline]
  fn slot_ptr(&self, idx: usize) -> *mut T {
    self.buffer[idx].get() as *mut T
  }
}

impl<T> Drop for RingShared<T> {
  fn drop(&mut self) {
    // Last handle gone; drop whatever the consumer never read.
    let wr_idx = *self.write_index.get_mut();
    let mut rd_idx = *self.read_index.get_mut();

    while rd_idx != wr_idx {
      unsafe {
        (*self.buffer[rd_idx].get()).assume_init_drop();
      }
      rd_idx = (rd_idx + 1) % self.buffer.len();
    }
  }
}

impl<T> fmt::Debug for RingShared<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingShared")
      .field("capacity", &self.capacity())
      .field("write_index", &self.write_index.load(Ordering::Relaxed))
      .field("read_index", &self.read_index.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}

/// The producing half of an SPSC ring buffer. One thread at a time.
#[derive(Debug)]
pub struct RingProducer<T> {
  shared: Arc<RingShared<T>>,
  _not_sync: PhantomData<*mut ()>,
}

/// The consuming half of an SPSC ring buffer. One thread at a time.
#[derive(Debug)]
pub struct RingConsumer<T> {
  shared: Arc<RingShared<T>>,
  _not_sync: PhantomData<*mut ()>,
}

unsafe impl<T: Send> Send for RingProducer<T> {}
unsafe impl<T: Send> Send for RingConsumer<T> {}

/// Creates a bounded SPSC ring buffer able to hold `capacity` elements.
///
/// The producer handle may live on one thread and the consumer handle on
/// another; neither operation ever blocks. "Full" and "empty" are reported
/// through the return values.
///
/// # Panics
///
/// Panics if `capacity` is 0 or at least `usize::MAX / 2`.
pub fn ring_buffer<T>(capacity: usize) -> (RingProducer<T>, RingConsumer<T>) {
  let shared = Arc::new(RingShared::with_capacity(capacity));
  // Publish the zeroed cursors and the buffer before either handle can
  // escape to another thread.
  atomic::fence(Ordering::SeqCst);

  (
    RingProducer {
      shared: Arc::clone(&shared),
      _not_sync: PhantomData,
    },
    RingConsumer {
      shared,
      _not_sync: PhantomData,
    },
  )
}

impl<T> RingProducer<T> {
  /// Enqueues one element.
  ///
  /// Returns the element back inside [`Full`] when no writable slot exists.
  pub fn write(&mut self, item: T) -> Result<(), Full<T>> {
    let shared = &*self.shared;
    let rd_idx = shared.read_index.load(Ordering::Acquire);
    let wr_idx = shared.write_index.load(Ordering::Relaxed);

    if shared.is_full(rd_idx, wr_idx) {
      return Err(Full(item));
    }

    unsafe {
      shared.slot_ptr(wr_idx).write(item);
    }
    shared
      .write_index
      .store(shared.advance(wr_idx, 1), Ordering::Release);
    Ok(())
  }

  /// Moves up to `items.len()` elements out of the front of `items` into the
  /// ring and returns the count moved; 0 when the ring is full.
  ///
  /// The written prefix is removed from `items`; the remainder stays in place
  /// for the caller to retry. Elements are relocated in at most two
  /// contiguous segments (before and after the wrap point).
  pub fn write_all(&mut self, items: &mut Vec<T>) -> usize {
    let shared = &*self.shared;
    let rd_idx = shared.read_index.load(Ordering::Acquire);
    let wr_idx = shared.write_index.load(Ordering::Relaxed);

    if shared.is_full(rd_idx, wr_idx) || items.is_empty() {
      return 0;
    }

    let available = shared.writable(rd_idx, wr_idx);
    debug_assert!(available > 0 && available <= shared.capacity());
    let num = items.len().min(available);

    let len = items.len();
    unsafe {
      let src = items.as_ptr();
      // First part: from the write cursor to the end of the buffer.
      let first_part = num.min(shared.slots() - wr_idx);
      ptr::copy_nonoverlapping(src, shared.slot_ptr(wr_idx), first_part);
      // Second part: wrap to the beginning of the buffer.
      ptr::copy_nonoverlapping(src.add(first_part), shared.slot_ptr(0), num - first_part);

      // Ownership of the prefix moved into the ring; close the gap in the
      // source without running any destructors.
      let base = items.as_mut_ptr();
      ptr::copy(base.add(num), base, len - num);
      items.set_len(len - num);
    }

    shared
      .write_index
      .store(shared.advance(wr_idx, num), Ordering::Release);
    num
  }

  /// Number of elements the producer could write right now without the
  /// buffer becoming full.
  pub fn writable_capacity(&self) -> usize {
    let shared = &*self.shared;
    let rd_idx = shared.read_index.load(Ordering::Acquire);
    let wr_idx = shared.write_index.load(Ordering::Relaxed);
    shared.writable(rd_idx, wr_idx)
  }

  /// The fixed capacity the buffer was created with.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.shared.capacity()
  }
}

impl<T> RingConsumer<T> {
  /// Dequeues one element, or `None` when the buffer is empty.
  pub fn read(&mut self) -> Option<T> {
    let shared = &*self.shared;
    let wr_idx = shared.write_index.load(Ordering::Acquire);
    let rd_idx = shared.read_index.load(Ordering::Relaxed);

    if shared.is_empty(rd_idx, wr_idx) {
      return None;
    }

    let item = unsafe { shared.slot_ptr(rd_idx).read() };
    shared
      .read_index
      .store(shared.advance(rd_idx, 1), Ordering::Release);
    Some(item)
  }

  /// Dequeues every currently readable element, in FIFO order.
  pub fn read_all(&mut self) -> Vec<T> {
    let shared = &*self.shared;
    let wr_idx = shared.write_index.load(Ordering::Acquire);
    let rd_idx = shared.read_index.load(Ordering::Relaxed);

    if shared.is_empty(rd_idx, wr_idx) {
      return Vec::new();
    }

    let num = shared.readable(rd_idx, wr_idx);
    debug_assert!(num > 0 && num <= shared.capacity());

    let mut values = Vec::with_capacity(num);
    unsafe {
      let dst = values.as_mut_ptr();
      // First part: from the read cursor to the end of the buffer.
      let first_part = num.min(shared.slots() - rd_idx);
      ptr::copy_nonoverlapping(shared.slot_ptr(rd_idx) as *const T, dst, first_part);
      // Second part: wrap to the beginning of the buffer.
      ptr::copy_nonoverlapping(
        shared.slot_ptr(0) as *const T,
        dst.add(first_part),
        num - first_part,
      );
      values.set_len(num);
    }

    shared
      .read_index
      .store(shared.advance(rd_idx, num), Ordering::Release);
    values
  }

  /// The fixed capacity the buffer was created with.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.shared.capacity()
  }
}
