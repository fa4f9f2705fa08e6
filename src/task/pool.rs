// src/task/pool.rs

//! A task queue dispatching onto a fixed pool of worker threads.
//!
//! Tasks are pulled from the FIFO in dispatch order, so start order is
//! deterministic; completion order is whatever the scheduler makes of it.
//! Each dispatch returns a [`CompletionHandle`] that yields the task's
//! return value once it has run.
//!
//! # Examples
//!
//! ```
//! use sinew::task::TaskQueue;
//!
//! let queue = TaskQueue::new(2);
//!
//! let first = queue.dispatch(|| 20 + 1);
//! let second = queue.dispatch(|| "two".len());
//!
//! assert_eq!(first.wait().unwrap(), 21);
//! assert_eq!(second.wait().unwrap(), 3);
//! ```

use crate::task::completion::{completion, CompletionHandle};
use crate::telemetry;

use parking_lot::{Condvar, Mutex};

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const LOC_POOL: &str = "task::pool";
const CTR_DISPATCHED: &str = "TasksDispatched";
const CTR_DROPPED: &str = "TasksDroppedAtDestroy";

// Tasks are type-erased and move-only: each one owns the user closure plus
// the completer feeding its handle, so the FIFO holds one uniform type.
type PoolTask = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
  queue: VecDeque<PoolTask>,
  destroyed: bool,
}

struct PoolShared {
  state: Mutex<PoolState>,
  cv: Condvar,
}

/// A fixed-size worker pool running dispatched tasks as parallel as it can.
///
/// Dropping the queue wakes every worker, joins them, and discards any task
/// that has not started; the handles of discarded tasks resolve to
/// [`TaskDropped`](crate::error::TaskDropped).
pub struct TaskQueue {
  shared: Arc<PoolShared>,
  workers: Vec<JoinHandle<()>>,
}

impl TaskQueue {
  /// Creates the queue and spawns `workers` worker threads.
  ///
  /// # Panics
  ///
  /// Panics if `workers` is 0.
  pub fn new(workers: usize) -> Self {
    assert!(workers >= 1, "task queue needs at least one worker");

    let shared = Arc::new(PoolShared {
      state: Mutex::new(PoolState {
        queue: VecDeque::new(),
        destroyed: false,
      }),
      cv: Condvar::new(),
    });

    let handles = (0..workers)
      .map(|index| {
        let worker_shared = Arc::clone(&shared);
        thread::Builder::new()
          .name(format!("sinew-pool-worker-{index}"))
          .spawn(move || work(&worker_shared))
          .expect("failed to spawn pool worker")
      })
      .collect();

    TaskQueue {
      shared,
      workers: handles,
    }
  }

  /// The single-worker specialization: tasks still run on a dedicated
  /// worker thread, but never concurrently, and complete in dispatch order.
  pub fn serial() -> Self {
    TaskQueue::new(1)
  }

  /// Enqueues a task and returns the handle that will carry its result.
  ///
  /// Handles are independent of one another and of the task: dropping a
  /// handle does not cancel anything.
  pub fn dispatch<F, R>(&self, task: F) -> CompletionHandle<R>
  where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
  {
    let (completer, handle) = completion();
    let wrapped: PoolTask = Box::new(move || completer.complete(task()));

    {
      let mut state = self.shared.state.lock();
      state.queue.push_back(wrapped);
    }
    telemetry::increment_counter(LOC_POOL, CTR_DISPATCHED);
    // One new task: one worker is enough to wake.
    self.shared.cv.notify_one();
    handle
  }
}

impl Drop for TaskQueue {
  fn drop(&mut self) {
    {
      let mut state = self.shared.state.lock();
      state.destroyed = true;
      if !state.queue.is_empty() {
        telemetry::increment_counter(LOC_POOL, CTR_DROPPED);
      }
    }
    // Every worker must observe the flag.
    self.shared.cv.notify_all();
    for worker in self.workers.drain(..) {
      let _ = worker.join();
    }
    // Undispatched tasks drop with the shared state; their completers fail
    // the matching handles fast.
  }
}

impl fmt::Debug for TaskQueue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.shared.state.lock();
    f.debug_struct("TaskQueue")
      .field("workers", &self.workers.len())
      .field("pending", &state.queue.len())
      .finish_non_exhaustive()
  }
}

fn work(shared: &PoolShared) {
  loop {
    let mut state = shared.state.lock();
    shared
      .cv
      .wait_while(&mut state, |s| s.queue.is_empty() && !s.destroyed);

    if state.destroyed {
      // Terminate; unprocessed tasks are dropped by the queue's owner.
      break;
    }

    // Unlike the serial queue there is no drain barrier watching the queue
    // length, so the task is popped before the lock is released.
    let task = state
      .queue
      .pop_front()
      .expect("worker woken with an empty queue");
    drop(state);

    task();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::TaskDropped;
  use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
  use std::time::Duration;

  #[test]
  #[should_panic]
  fn zero_workers_is_rejected() {
    let _ = TaskQueue::new(0);
  }

  #[test]
  fn handles_carry_results() {
    let queue = TaskQueue::new(3);

    let handles: Vec<_> = (0..7u32).map(|id| queue.dispatch(move || id * id)).collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.wait().unwrap()).collect();

    assert_eq!(results, vec![0, 1, 4, 9, 16, 25, 36]);
  }

  #[test]
  fn awaited_tasks_all_run_exactly_once() {
    const WORKERS: usize = 3;
    const TASKS: i32 = 2 * WORKERS as i32 + 1;

    let shared_number = Arc::new(AtomicI32::new(0));
    let queue = TaskQueue::new(WORKERS);

    let handles: Vec<_> = (0..TASKS)
      .map(|id| {
        let shared_number = Arc::clone(&shared_number);
        queue.dispatch(move || {
          let offset = if id % 2 == 0 { 1 } else { -1 };
          shared_number.fetch_add(offset, Ordering::Relaxed)
        })
      })
      .collect();

    for handle in handles {
      handle.wait().unwrap();
    }

    // Odd task count: the +1s win by exactly one.
    assert_eq!(shared_number.load(Ordering::Relaxed), TASKS % 2);
  }

  #[test]
  fn serial_specialization_completes_in_dispatch_order() {
    const TASKS: i32 = 7;

    let number = Arc::new(AtomicI32::new(0));
    let queue = TaskQueue::serial();

    let handles: Vec<_> = (0..TASKS)
      .map(|id| {
        let number = Arc::clone(&number);
        queue.dispatch(move || {
          let offset = if id % 2 == 0 { 1 } else { -1 };
          number.fetch_add(offset, Ordering::Relaxed) + offset
        })
      })
      .collect();

    // One worker means strictly serial execution: the last task observes
    // the fully accumulated value.
    let last = handles
      .into_iter()
      .map(|h| h.wait().unwrap())
      .last()
      .unwrap();
    assert_eq!(number.load(Ordering::Relaxed), TASKS % 2);
    assert_eq!(last, TASKS % 2);
  }

  #[test]
  fn dropped_tasks_fail_their_handles() {
    let started = Arc::new(AtomicUsize::new(0));

    let (blocked_handle, starved_handles) = {
      let queue = TaskQueue::new(1);

      let blocked = {
        let started = Arc::clone(&started);
        queue.dispatch(move || {
          started.fetch_add(1, Ordering::Relaxed);
          thread::sleep(Duration::from_millis(100));
          7u32
        })
      };
      // Give the lone worker time to pull the blocking task so the rest
      // are still queued when the destructor runs.
      thread::sleep(Duration::from_millis(20));

      let starved: Vec<_> = (0..4u32)
        .map(|id| {
          let started = Arc::clone(&started);
          queue.dispatch(move || {
            started.fetch_add(1, Ordering::Relaxed);
            id
          })
        })
        .collect();

      (blocked, starved)
    }; // queue destroyed: worker joined, queued tasks discarded

    assert_eq!(blocked_handle.wait(), Ok(7));
    for handle in starved_handles {
      assert_eq!(handle.wait(), Err(TaskDropped));
    }
    assert_eq!(started.load(Ordering::Relaxed), 1);
  }
}
