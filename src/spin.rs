// src/spin.rs

//! A busy-wait mutual-exclusion flag.
//!
//! [`SpinLock`] never parks the calling thread: `lock` spins on an atomic
//! test-and-set until the flag is observed clear. That makes it suitable only
//! for very short critical sections where the holder cannot block; anything
//! longer belongs behind [`GuardedCell`](crate::GuardedCell), which uses the
//! platform mutex and sleeps its waiters.
//!
//! The lock is not reentrant and makes no fairness guarantee between
//! spinners.
//!
//! # Examples
//!
//! ```
//! use sinew::SpinLock;
//!
//! let lock = SpinLock::new();
//! lock.lock();
//! // ... very short critical section ...
//! lock.unlock();
//! ```

use core::hint;
use core::sync::atomic::{AtomicBool, Ordering};

/// A spin-based mutual-exclusion flag with no owner tracking.
///
/// The caller is responsible for pairing every `lock` with exactly one
/// `unlock` on the same logical critical section. Unlocking a lock the caller
/// does not hold breaks mutual exclusion for whatever data the lock guards.
#[derive(Debug, Default)]
pub struct SpinLock {
  locked: AtomicBool,
}

impl SpinLock {
  /// Creates a new, unlocked `SpinLock`.
  #[inline]
  pub const fn new() -> Self {
    SpinLock {
      locked: AtomicBool::new(false),
    }
  }

  /// Acquires the lock, spinning until it becomes available.
  ///
  /// The successful test-and-set is an Acquire operation, so everything the
  /// previous holder wrote before `unlock` is visible once `lock` returns.
  #[inline]
  pub fn lock(&self) {
    // swap == test-and-set: keep spinning while the previous value was held.
    while self.locked.swap(true, Ordering::Acquire) {
      hint::spin_loop();
    }
  }

  /// Releases the lock.
  ///
  /// The Release store pairs with the Acquire test-and-set in [`lock`],
  /// publishing the critical section's writes to the next holder.
  ///
  /// [`lock`]: SpinLock::lock
  #[inline]
  pub fn unlock(&self) {
    self.locked.store(false, Ordering::Release);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::UnsafeCell;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::Arc;
  use std::thread;

  // A plain integer protected only by the external spin-lock, the way the
  // lock is meant to be deployed around short raw critical sections.
  struct SpinGuarded {
    lock: SpinLock,
    value: UnsafeCell<i64>,
  }

  unsafe impl Sync for SpinGuarded {}

  impl SpinGuarded {
    fn new(value: i64) -> Self {
      SpinGuarded {
        lock: SpinLock::new(),
        value: UnsafeCell::new(value),
      }
    }

    fn add(&self, offset: i64) {
      self.lock.lock();
      unsafe {
        *self.value.get() += offset;
      }
      self.lock.unlock();
    }

    fn get(&self) -> i64 {
      self.lock.lock();
      let value = unsafe { *self.value.get() };
      self.lock.unlock();
      value
    }
  }

  #[test]
  fn lock_unlock_single_thread() {
    let lock = SpinLock::new();
    lock.lock();
    lock.unlock();
    lock.lock();
    lock.unlock();
  }

  #[test]
  fn balanced_offsets_cancel_out() {
    const ROUNDS: usize = 10;
    const OFFSET: i64 = 3;

    let shared = Arc::new(SpinGuarded::new(60));
    let go = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::new();
    for offset in [OFFSET, -OFFSET] {
      let shared = Arc::clone(&shared);
      let go = Arc::clone(&go);
      handles.push(thread::spawn(move || {
        while !go.load(Ordering::Relaxed) {}
        for _ in 0..ROUNDS {
          shared.add(offset);
        }
      }));
    }

    go.store(true, Ordering::Relaxed);
    for handle in handles {
      handle.join().unwrap();
    }

    assert_eq!(shared.get(), 60);
  }

  #[test]
  fn contended_increments_are_exact() {
    const THREADS: usize = 4;
    const ROUNDS: usize = 10_000;

    let shared = Arc::new(SpinGuarded::new(0));

    let handles: Vec<_> = (0..THREADS)
      .map(|_| {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
          for _ in 0..ROUNDS {
            shared.add(1);
          }
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }

    assert_eq!(shared.get(), (THREADS * ROUNDS) as i64);
  }
}
