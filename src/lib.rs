#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! Building-block thread-coordination primitives for Rust.
//!
//! Sinew collects a small set of interacting concurrency primitives, each one
//! built around a single memory-ordering, ownership, or scheduling contract:
//!
//! - [`SpinLock`]: a busy-wait mutual-exclusion flag for very short critical
//!   sections.
//! - [`GuardedCell`]: a value bound to a blocking lock so the data cannot be
//!   reached without holding the lock.
//! - [`spsc::ring_buffer`]: a lock-free single-producer / single-consumer
//!   ring buffer using acquire/release atomics.
//! - [`spsc::dynamic`]: a batching layer over the ring buffer that adapts
//!   batch granularity when the consumer falls behind, so writes never drop.
//! - [`task::SerialTaskQueue`]: a FIFO of tasks run by one owned worker, with
//!   a blocking drain operation.
//! - [`task::TaskQueue`]: a fixed-size worker pool returning a completion
//!   handle per dispatched task.
//!
//! The primitives do not call each other at runtime (the dynamic ring wraps
//! the plain ring, and the pool hands out completion handles); they share the
//! handle-splitting, memory-ordering, and teardown idioms documented on each
//! module.

pub mod error;

pub mod guarded;
pub mod spin;
pub mod spsc;
pub mod task;
pub mod telemetry;

// Internal utilities - not part of the public API.
mod internal;
mod sync_util;

// Convenience re-exports for the lock primitives and common errors.
pub use error::{Full, TaskDropped};
pub use guarded::{AccessToken, GuardedCell};
pub use spin::SpinLock;

// Helper function to check that a type is Send + Sync.
// Useful for static assertions in generic code.
#[allow(dead_code)]
fn assert_send_sync<T: Send + Sync>() {}
