// src/error.rs

//! Error types for operations that report failure structurally.
//!
//! Nothing in this crate retries or logs on failure: a full ring hands the
//! element back, a dead task queue fails its handles, and contract
//! violations abort via assertions instead of surfacing here.

use core::fmt;

/// Error returned by [`RingProducer::write`](crate::spsc::RingProducer::write)
/// when the ring buffer has no writable slot.
///
/// The rejected element is handed back so the caller can retry or keep it.
#[derive(PartialEq, Eq, Clone)]
pub struct Full<T>(pub(crate) T);

impl<T> Full<T> {
  /// Consumes the error, returning the element that could not be enqueued.
  #[inline]
  pub fn into_inner(self) -> T {
    self.0
  }
}

impl<T> fmt::Debug for Full<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // The element may not be Debug; keep the payload opaque.
    write!(f, "Full(..)")
  }
}

impl<T> fmt::Display for Full<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("ring buffer full")
  }
}

impl<T: fmt::Debug> std::error::Error for Full<T> {}

/// Error returned by [`CompletionHandle::wait`](crate::task::CompletionHandle::wait)
/// when the owning task queue was destroyed before the task ran.
///
/// The task's closure has been dropped; its result can never arrive.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TaskDropped;

impl fmt::Display for TaskDropped {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("task queue destroyed before the task ran")
  }
}

impl std::error::Error for TaskDropped {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn full_returns_element() {
    let err = Full(String::from("payload"));
    assert_eq!(err.clone().into_inner(), "payload");
    assert_eq!(format!("{:?}", err), "Full(..)");
    assert_eq!(err.to_string(), "ring buffer full");
  }

  #[test]
  fn task_dropped_formats() {
    assert_eq!(TaskDropped.to_string(), "task queue destroyed before the task ran");
  }
}
