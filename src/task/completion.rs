// src/task/completion.rs

//! One-shot result channels pairing a dispatched task with its waiter.
//!
//! Every task a [`TaskQueue`](crate::task::TaskQueue) accepts is wrapped
//! together with a [`Completer`]; the caller keeps the matching
//! [`CompletionHandle`]. The pair moves through four states:
//!
//! ```text
//! PENDING --complete()--> READY --wait()--> TAKEN
//! PENDING --Completer dropped unrun--> DROPPED
//! ```
//!
//! A handle whose task was discarded (queue destroyed first) resolves to
//! [`TaskDropped`] instead of blocking forever: the closure is gone, so the
//! result can never arrive and there is nothing left to wait for.

use crate::error::TaskDropped;
use crate::sync_util;

use parking_lot::Mutex;

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{self, AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};

// States of CompletionShared::state.
const PENDING: usize = 0; // No result yet; the task has not finished.
const READY: usize = 1; // Result stored, waiting to be taken.
const TAKEN: usize = 2; // The handle consumed the result. Terminal.
const DROPPED: usize = 3; // The task was discarded before running. Terminal.

struct CompletionShared<R> {
  state: AtomicUsize,
  slot: Mutex<Option<R>>,

  // Blocking-waiter state, same protocol as the ring-buffer parking: the
  // waiter publishes its thread handle, sets the flag Release, re-checks the
  // state, then parks; the completer claims the flag by CAS before unparking.
  waiter_parked: AtomicBool,
  waiter_thread: UnsafeCell<Option<Thread>>,
}

unsafe impl<R: Send> Send for CompletionShared<R> {}
unsafe impl<R: Send> Sync for CompletionShared<R> {}

impl<R> CompletionShared<R> {
  fn new() -> Self {
    CompletionShared {
      state: AtomicUsize::new(PENDING),
      slot: Mutex::new(None),
      waiter_parked: AtomicBool::new(false),
      waiter_thread: UnsafeCell::new(None),
    }
  }

  fn wake_waiter(&self) {
    if self.waiter_parked.load(Ordering::Relaxed) {
      atomic::fence(Ordering::Acquire);
      if self
        .waiter_parked
        .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
        .is_ok()
      {
        if let Some(thread_handle) = unsafe { (*self.waiter_thread.get()).take() } {
          sync_util::unpark_thread(&thread_handle);
        }
      }
    }
  }
}

impl<R> fmt::Debug for CompletionShared<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = match self.state.load(Ordering::Relaxed) {
      PENDING => "Pending",
      READY => "Ready",
      TAKEN => "Taken",
      DROPPED => "Dropped",
      _ => "Unknown",
    };
    f.debug_struct("CompletionShared")
      .field("state", &state)
      .finish_non_exhaustive()
  }
}

/// Creates a connected completer/handle pair for one task.
pub(crate) fn completion<R>() -> (Completer<R>, CompletionHandle<R>) {
  let shared = Arc::new(CompletionShared::new());
  (
    Completer {
      shared: Arc::clone(&shared),
    },
    CompletionHandle {
      shared,
      _not_sync: PhantomData,
    },
  )
}

/// The fulfilling half, owned by the task wrapper inside a queue.
///
/// Dropping a completer that never ran its task marks the channel `DROPPED`
/// so the waiter fails fast.
pub(crate) struct Completer<R> {
  shared: Arc<CompletionShared<R>>,
}

impl<R> Completer<R> {
  /// Stores the task's result and wakes the waiter.
  pub(crate) fn complete(self, value: R) {
    *self.shared.slot.lock() = Some(value);
    self.shared.state.store(READY, Ordering::Release);
    self.shared.wake_waiter();
    // The Drop impl observes a non-PENDING state and does nothing further.
  }
}

impl<R> Drop for Completer<R> {
  fn drop(&mut self) {
    if self
      .shared
      .state
      .compare_exchange(PENDING, DROPPED, Ordering::AcqRel, Ordering::Relaxed)
      .is_ok()
    {
      self.shared.wake_waiter();
    }
  }
}

impl<R> fmt::Debug for Completer<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Completer").field("shared", &self.shared).finish()
  }
}

/// A one-shot handle yielding a dispatched task's result.
///
/// Handles are independent: dropping one does not cancel its task. The
/// handle is `Send` but not `Sync`; it is consumed by [`wait`].
///
/// [`wait`]: CompletionHandle::wait
#[must_use = "dropping the handle discards the task's result"]
pub struct CompletionHandle<R> {
  shared: Arc<CompletionShared<R>>,
  _not_sync: PhantomData<*mut ()>,
}

unsafe impl<R: Send> Send for CompletionHandle<R> {}

impl<R: Send> CompletionHandle<R> {
  /// Blocks until the task has run, then returns its result.
  ///
  /// Returns [`TaskDropped`] if the owning queue was destroyed before the
  /// task started; the result can never be produced in that case.
  pub fn wait(self) -> Result<R, TaskDropped> {
    loop {
      match self.shared.state.load(Ordering::Acquire) {
        READY => {
          let value = self
            .shared
            .slot
            .lock()
            .take()
            .expect("completion marked ready without a stored result");
          self.shared.state.store(TAKEN, Ordering::Relaxed);
          return Ok(value);
        }
        DROPPED => return Err(TaskDropped),
        _ => {
          unsafe {
            *self.shared.waiter_thread.get() = Some(thread::current());
          }
          self.shared.waiter_parked.store(true, Ordering::Release);

          // The completer may have fired between the state load and the
          // flag store; re-check before parking.
          if self.shared.state.load(Ordering::Acquire) != PENDING {
            if self
              .shared
              .waiter_parked
              .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
              .is_ok()
            {
              unsafe {
                *self.shared.waiter_thread.get() = None;
              }
            }
            continue;
          }
          sync_util::park_thread();
          if self.shared.waiter_parked.load(Ordering::Relaxed)
            && self
              .shared
              .waiter_parked
              .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
              .is_ok()
          {
            unsafe {
              *self.shared.waiter_thread.get() = None;
            }
          }
        }
      }
    }
  }
}

impl<R> fmt::Debug for CompletionHandle<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CompletionHandle")
      .field("shared", &self.shared)
      .finish()
  }
}
