//! Minimal helpers around `std::thread` parking.
//! The callers manage all of the flag state; these exist so the park/unpark
//! pairing is greppable in one place.

use std::thread;

/// Parks the current thread.
#[inline]
pub(crate) fn park_thread() {
  thread::park();
}

/// Unparks the given thread.
#[inline]
pub(crate) fn unpark_thread(thread: &thread::Thread) {
  thread.unpark();
}
