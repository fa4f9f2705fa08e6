// src/guarded.rs

//! A value bound to a blocking lock.
//!
//! [`GuardedCell`] owns its value and the mutex protecting it, so the value
//! is unreachable except through the [`AccessToken`] returned by
//! [`acquire`](GuardedCell::acquire). The token is the lock ownership: it
//! dereferences to the value, releases on drop, and is move-only, so at most
//! one token exists at any moment.
//!
//! # Examples
//!
//! ```
//! use sinew::GuardedCell;
//!
//! let shared = GuardedCell::new(100u32);
//! {
//!   let mut token = shared.acquire();
//!   *token += 1;
//! } // lock released here
//!
//! assert_eq!(*shared.acquire(), 101);
//! ```

use crate::internal::cache_padded::CachePadded;

use parking_lot::lock_api::RawMutex as _;
use parking_lot::RawMutex;

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

/// A mutual-exclusion container binding a value to its lock.
///
/// Constructed by taking ownership of the value; shared across threads behind
/// an `Arc` or a scoped borrow. Other threads calling
/// [`acquire`](GuardedCell::acquire) block until the current token drops.
pub struct GuardedCell<T> {
  raw: CachePadded<RawMutex>,
  value: UnsafeCell<T>,
}

// The raw mutex serializes all access to `value`, so sharing the cell is
// sound whenever the value itself may move between threads.
unsafe impl<T: Send> Send for GuardedCell<T> {}
unsafe impl<T: Send> Sync for GuardedCell<T> {}

impl<T> GuardedCell<T> {
  /// Creates a new cell owning `value`.
  #[inline]
  pub const fn new(value: T) -> Self {
    GuardedCell {
      raw: CachePadded::new(RawMutex::INIT),
      value: UnsafeCell::new(value),
    }
  }

  /// Takes the lock, blocking until it is free, and returns the access token.
  ///
  /// Re-acquiring on the same thread while a token is live deadlocks; the
  /// lock is not reentrant.
  #[inline]
  pub fn acquire(&self) -> AccessToken<'_, T> {
    self.raw.lock();
    AccessToken {
      cell: self,
      _not_send: PhantomData,
    }
  }

  /// Consumes the cell, returning the value without locking.
  ///
  /// Possible because ownership of `self` proves no token exists.
  #[inline]
  pub fn into_inner(self) -> T {
    self.value.into_inner()
  }
}

impl<T: Default> Default for GuardedCell<T> {
  fn default() -> Self {
    GuardedCell::new(T::default())
  }
}

impl<T> fmt::Debug for GuardedCell<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Reading the value would require taking the lock; stay opaque.
    f.debug_struct("GuardedCell").finish_non_exhaustive()
  }
}

/// Exclusive access to the value inside a [`GuardedCell`].
///
/// Dereferences to the value. Dropping the token releases the lock on every
/// exit path; moving the token transfers lock ownership without releasing.
/// The token cannot be copied or cloned, and is `!Send`: the platform mutex
/// must be released by the thread that acquired it.
#[must_use = "the lock is released as soon as the token is dropped"]
pub struct AccessToken<'a, T> {
  cell: &'a GuardedCell<T>,
  _not_send: PhantomData<*mut ()>,
}

impl<T> Deref for AccessToken<'_, T> {
  type Target = T;
  #[inline]
  fn deref(&self) -> &T {
    unsafe { &*self.cell.value.get() }
  }
}

impl<T> DerefMut for AccessToken<'_, T> {
  #[inline]
  fn deref_mut(&mut self) -> &mut T {
    unsafe { &mut *self.cell.value.get() }
  }
}

impl<T> Drop for AccessToken<'_, T> {
  fn drop(&mut self) {
    // The token's existence proves this thread holds the lock.
    unsafe { self.cell.raw.unlock() };
  }
}

impl<T: fmt::Debug> fmt::Debug for AccessToken<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("AccessToken").field(&**self).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::Arc;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn token_gives_exclusive_access() {
    let cell = GuardedCell::new(60);
    {
      let mut token = cell.acquire();
      *token += 1;
    }
    assert_eq!(*cell.acquire(), 61);
    assert_eq!(cell.into_inner(), 61);
  }

  #[test]
  fn moving_the_token_keeps_the_lock() {
    let cell = GuardedCell::new(vec![1, 2, 3]);
    let token = cell.acquire();
    let mut moved = token;
    moved.push(4);
    drop(moved);
    assert_eq!(cell.acquire().len(), 4);
  }

  #[test]
  fn acquire_blocks_other_threads() {
    let cell = Arc::new(GuardedCell::new(0u32));
    let observed_while_held = Arc::new(AtomicBool::new(false));

    let token = cell.acquire();

    let contender = {
      let cell = Arc::clone(&cell);
      let observed = Arc::clone(&observed_while_held);
      thread::spawn(move || {
        let token = cell.acquire();
        // Record whether we got in before the main thread released.
        observed.store(*token == 0, Ordering::Relaxed);
      })
    };

    thread::sleep(Duration::from_millis(50));
    drop({
      let mut token = token;
      *token = 1;
      token
    });

    contender.join().unwrap();
    assert!(
      !observed_while_held.load(Ordering::Relaxed),
      "contender entered the critical section before the token was released"
    );
  }

  #[test]
  fn two_thread_adder() {
    const ROUNDS: usize = 10;

    let cell = Arc::new(GuardedCell::new(60));
    let mut handles = Vec::new();
    for offset in [3, 5] {
      let cell = Arc::clone(&cell);
      handles.push(thread::spawn(move || {
        // Hold the token across the whole loop: one coarse critical section
        // per thread, as a caller protecting a multi-step update would.
        let mut token = cell.acquire();
        for _ in 0..ROUNDS {
          *token += offset;
        }
      }));
    }

    for handle in handles {
      handle.join().unwrap();
    }

    assert_eq!(*cell.acquire(), 60 + 10 * (3 + 5));
  }
}
