// src/spsc/mod.rs

//! Single-producer / single-consumer ring buffers.
//!
//! Two layers share one contract: exactly one thread writes, exactly one
//! thread reads, and neither operation ever blocks.
//!
//! - [`ring_buffer`] is the base layer: a fixed-capacity circular buffer
//!   whose producer and consumer synchronize purely through acquire/release
//!   loads and stores of two cursors. "Full" and "empty" are reported through
//!   return values, never by waiting.
//! - [`dynamic`] layers adaptive batching on top: when the consumer falls
//!   behind, the producer packs more elements per ring slot instead of
//!   dropping them, and relaxes back to single-element batches once the ring
//!   drains.
//!
//! Both constructors return a split pair of handles. The handles are `Send`
//! (each side may be moved to its thread) but deliberately not `Sync`;
//! sharing one side between threads would break the SPSC cursor ownership,
//! which is undefined behavior.
//!
//! # Examples
//!
//! ```
//! use sinew::spsc;
//! use std::thread;
//!
//! let (mut producer, mut consumer) = spsc::ring_buffer(64);
//!
//! let sender = thread::spawn(move || {
//!   for i in 0..10u32 {
//!     let mut item = i;
//!     // write never blocks; retry while the ring reports full.
//!     while let Err(full) = producer.write(item) {
//!       item = full.into_inner();
//!       thread::yield_now();
//!     }
//!   }
//! });
//!
//! let mut seen = Vec::new();
//! while seen.len() < 10 {
//!   seen.extend(consumer.read_all());
//! }
//! sender.join().unwrap();
//! assert_eq!(seen, (0..10).collect::<Vec<_>>());
//! ```

mod dynamic;
mod ring;

pub use dynamic::{dynamic, DynamicConsumer, DynamicProducer};
pub use ring::{ring_buffer, RingConsumer, RingProducer};

// The ring-full error lives with the other error types.
pub use crate::error::Full;
