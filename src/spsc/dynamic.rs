// src/spsc/dynamic.rs

//! A batching layer over the SPSC ring buffer that adapts to rate mismatch.
//!
//! The inner ring carries batches instead of single elements. While the
//! consumer keeps up, each batch holds one element and the channel behaves
//! like the plain ring. When the ring starts filling, the producer doubles
//! the batch size and halves its trigger threshold, so every remaining slot
//! carries twice the payload: after `k` adaptations the total queued element
//! capacity is `(k/2 + 1) * C` for ring capacity `C`. Writes therefore never
//! drop elements; at worst they accumulate in the producer-side `onhold`
//! batch until the consumer drains the ring.
//!
//! The single-producer / single-consumer contract of the inner ring carries
//! over unchanged.

use crate::spsc::ring::{ring_buffer, RingConsumer, RingProducer};
use crate::telemetry;

use std::fmt;

const LOC_DYN_WRITE: &str = "spsc::dynamic::write";
const EVT_ADAPT: &str = "Adapt:BatchDoubled";
const CTR_ADAPTATIONS: &str = "BatchAdaptations";
const CTR_OVERFLOW_RETAINED: &str = "OnholdOverflowWrites";

/// An owned, append-only run of elements moved through the inner ring as one
/// unit. `capacity` is soft: the producer appends past it when the ring is
/// full and the element has nowhere else to go.
struct Batch<T> {
  capacity: usize,
  buf: Vec<T>,
}

impl<T> Batch<T> {
  fn with_capacity(capacity: usize) -> Self {
    assert!(capacity > 0, "batch capacity must be greater than 0");
    Batch {
      capacity,
      buf: Vec::with_capacity(capacity),
    }
  }

  #[inline]
  fn is_full(&self) -> bool {
    self.buf.len() >= self.capacity
  }

  #[inline]
  fn push(&mut self, item: T) {
    self.buf.push(item);
  }

  #[inline]
  fn into_items(self) -> Vec<T> {
    self.buf
  }
}

impl<T> fmt::Debug for Batch<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Batch")
      .field("capacity", &self.capacity)
      .field("len", &self.buf.len())
      .finish()
  }
}

/// The producing half of a dynamic batching ring buffer.
///
/// All adaptive state lives here: it is touched by the producer thread only,
/// so no synchronization is needed beyond the inner ring's cursors.
#[derive(Debug)]
pub struct DynamicProducer<T> {
  ring: RingProducer<Batch<T>>,
  onhold: Option<Batch<T>>,
  batch_size_base: usize,
  batch_size: usize,
  threshold_base: usize,
  threshold: usize,
}

/// The consuming half of a dynamic batching ring buffer.
#[derive(Debug)]
pub struct DynamicConsumer<T> {
  ring: RingConsumer<Batch<T>>,
}

/// Creates a dynamic batching ring buffer over an inner ring of `capacity`
/// batch slots.
///
/// # Panics
///
/// Panics unless `capacity` is a power of two with `capacity / 2 >= 1`.
pub fn dynamic<T>(capacity: usize) -> (DynamicProducer<T>, DynamicConsumer<T>) {
  assert!(capacity > 0, "dynamic ring capacity must be greater than 0");
  assert!(
    capacity & (capacity - 1) == 0,
    "dynamic ring capacity must be a power of two"
  );
  let threshold_base = capacity / 2;
  assert!(
    threshold_base > 0 && threshold_base <= capacity,
    "dynamic ring capacity must leave a usable threshold"
  );

  let (ring_producer, ring_consumer) = ring_buffer(capacity);
  (
    DynamicProducer {
      ring: ring_producer,
      onhold: None,
      batch_size_base: 1,
      batch_size: 1,
      threshold_base,
      threshold: threshold_base,
    },
    DynamicConsumer { ring: ring_consumer },
  )
}

impl<T> DynamicProducer<T> {
  /// Enqueues one element. Never fails.
  ///
  /// The element lands in the currently-filling `onhold` batch; full batches
  /// are submitted to the inner ring. When the ring itself is full the
  /// element is retained in `onhold`, which may grow past its declared
  /// capacity until the consumer frees a slot.
  pub fn write(&mut self, item: T) {
    let writables = self.ring.writable_capacity();

    // First write after the consumer fully drained the ring: the previous
    // back-pressure cycle is over, restart from the base granularity.
    if writables == self.ring.capacity() {
      self.submit_onhold();
      self.threshold = self.threshold_base;
      self.batch_size = self.batch_size_base;
    }

    let batch_size = self.batch_size;
    let onhold = self
      .onhold
      .get_or_insert_with(|| Batch::with_capacity(batch_size));
    onhold.push(item);
    let filled = onhold.is_full();

    // Ring full: keep accumulating in the onhold batch, full or not.
    if writables == 0 {
      telemetry::increment_counter(LOC_DYN_WRITE, CTR_OVERFLOW_RETAINED);
      return;
    }

    if filled {
      self.submit_onhold();
      // The submission cannot have failed, so the ring now holds one more
      // batch; throttle by enlarging the next batch when the remaining
      // writable slots reach the threshold.
      if writables - 1 <= self.threshold {
        debug_assert!(self.onhold.is_none());
        self.threshold /= 2;
        self.batch_size *= 2;
        telemetry::increment_counter(LOC_DYN_WRITE, CTR_ADAPTATIONS);
        telemetry::log_event(
          None,
          LOC_DYN_WRITE,
          EVT_ADAPT,
          Some(format!(
            "batch_size={} threshold={}",
            self.batch_size, self.threshold
          )),
        );
      }
    }
  }

  /// Submits a partially-filled `onhold` batch if the inner ring has room.
  ///
  /// Returns `true` once nothing remains pending on the producer side;
  /// `false` when the ring was full and the caller must retry.
  pub fn drain_writes(&mut self) -> bool {
    if self.onhold.is_none() {
      return true;
    }
    if self.ring.writable_capacity() == 0 {
      return false;
    }
    self.submit_onhold();
    true
  }

  /// The capacity of the inner ring, in batch slots.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.ring.capacity()
  }

  fn submit_onhold(&mut self) {
    if let Some(batch) = self.onhold.take() {
      if self.ring.write(batch).is_err() {
        // Every call site checks the writable capacity first.
        unreachable!("onhold batch submitted while the inner ring was full");
      }
    }
  }
}

impl<T> DynamicConsumer<T> {
  /// Drains every batch currently in the inner ring and returns their
  /// elements flattened in FIFO order.
  pub fn read_all(&mut self) -> Vec<T> {
    let batches = self.ring.read_all();
    let total: usize = batches.iter().map(|batch| batch.buf.len()).sum();

    let mut flattened = Vec::with_capacity(total);
    for batch in batches {
      flattened.extend(batch.into_items());
    }
    flattened
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::thread;
  use std::time::Duration;

  #[test]
  #[should_panic]
  fn capacity_must_be_power_of_two() {
    let _ = dynamic::<u32>(12);
  }

  #[test]
  #[should_panic]
  fn capacity_one_is_too_small() {
    // threshold_base would be 0
    let _ = dynamic::<u32>(1);
  }

  #[test]
  fn single_elements_flow_through() {
    // Capacity 8, threshold_base 4: the first four writes stay below the
    // adaptation trigger, so each element is submitted as its own batch.
    let (mut producer, mut consumer) = dynamic::<u32>(8);
    for value in 0..4 {
      producer.write(value);
    }
    assert_eq!(consumer.read_all(), vec![0, 1, 2, 3]);
  }

  #[test]
  fn batch_size_doubles_under_pressure() {
    // Capacity 4, threshold_base 2. With no consumer, the batch sizes grow
    // 1, 1, 2, 4 as the ring fills, so the first 8 elements land in the ring
    // and writes 8..16 accumulate in the onhold batch.
    let (mut producer, mut consumer) = dynamic::<u32>(4);

    for value in 0..16 {
      producer.write(value);
    }
    assert!(!producer.drain_writes());

    let mut collected = consumer.read_all();
    assert_eq!(collected.len(), 8);

    // Slots are free again, so the retained batch goes through.
    assert!(producer.drain_writes());
    collected.extend(consumer.read_all());
    assert_eq!(collected, (0..16).collect::<Vec<_>>());
  }

  #[test]
  fn ring_full_retains_in_onhold() {
    // Capacity 2, threshold_base 1: the ring holds {0} and {1, 2}; the other
    // 61 elements pile into the onhold batch far past its declared capacity.
    let (mut producer, mut consumer) = dynamic::<u32>(2);

    for value in 0..64 {
      producer.write(value);
    }
    assert!(!producer.drain_writes());

    let mut collected = consumer.read_all();
    assert_eq!(collected.len(), 3);

    assert!(producer.drain_writes());
    collected.extend(consumer.read_all());
    assert_eq!(collected, (0..64).collect::<Vec<_>>());
  }

  #[test]
  fn cycle_resets_after_full_drain() {
    let (mut producer, mut consumer) = dynamic::<u32>(4);

    for value in 0..12 {
      producer.write(value);
    }
    let mut first_cycle = Vec::new();
    while !producer.drain_writes() {
      first_cycle.extend(consumer.read_all());
    }
    first_cycle.extend(consumer.read_all());
    assert_eq!(first_cycle, (0..12).collect::<Vec<_>>());

    // The ring is empty again; the next write starts a fresh cycle at batch
    // size 1, so a lone element is immediately visible to the consumer.
    producer.write(100);
    assert_eq!(consumer.read_all(), vec![100]);
  }

  #[test]
  fn lossless_across_threads() {
    const MESSAGES: usize = 10_000;

    let (mut producer, mut consumer) = dynamic::<usize>(16);

    let producer_handle = thread::spawn(move || {
      for i in 0..MESSAGES {
        producer.write(i);
        if i % 97 == 0 {
          thread::sleep(Duration::from_micros(50));
        }
      }
      while !producer.drain_writes() {
        thread::yield_now();
      }
    });

    let consumer_handle = thread::spawn(move || {
      let mut collected = Vec::with_capacity(MESSAGES);
      while collected.len() < MESSAGES {
        let drained = consumer.read_all();
        if drained.is_empty() {
          thread::yield_now();
        }
        collected.extend(drained);
      }
      collected
    });

    producer_handle.join().unwrap();
    let collected = consumer_handle.join().unwrap();
    assert_eq!(collected, (0..MESSAGES).collect::<Vec<_>>());
  }
}
