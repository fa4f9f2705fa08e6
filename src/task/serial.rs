// src/task/serial.rs

//! A serial task queue with a blocking drain operation.
//!
//! One owned worker thread runs dispatched tasks strictly in dispatch order.
//! [`wait`](SerialTaskQueue::wait) blocks the calling thread until the queue
//! is empty, which — by construction of the worker loop — means every task
//! dispatched before the call has finished.
//!
//! `new`, `dispatch`, `wait`, and the drop are meant to run on one thread;
//! `dispatch` from another thread while `wait` blocks is a contract
//! violation and aborts.
//!
//! # Examples
//!
//! ```
//! use sinew::task::SerialTaskQueue;
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//!
//! let number = Arc::new(AtomicI32::new(0));
//! let queue = SerialTaskQueue::new();
//!
//! for offset in [1, 2] {
//!   let number = Arc::clone(&number);
//!   queue.dispatch(move || {
//!     number.fetch_add(offset, Ordering::Relaxed);
//!   });
//! }
//! queue.wait(); // all tasks done once this returns
//! assert_eq!(number.load(Ordering::Relaxed), 3);
//! ```

use crate::telemetry;

use parking_lot::{Condvar, Mutex};

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const LOC_SERIAL: &str = "task::serial";
const CTR_DISPATCHED: &str = "TasksDispatched";
const CTR_DROPPED: &str = "TasksDroppedAtDestroy";

type Task = Box<dyn FnOnce() + Send + 'static>;

struct SerialState {
  queue: VecDeque<Task>,
  destroyed: bool,
  waiting: bool,
}

struct SerialShared {
  state: Mutex<SerialState>,
  cv: Condvar,
}

/// A FIFO of tasks run one at a time by a single owned worker thread.
///
/// Dropping the queue stops the worker after its current task; tasks still
/// queued at that point are discarded without running.
pub struct SerialTaskQueue {
  shared: Arc<SerialShared>,
  worker: Option<JoinHandle<()>>,
}

impl SerialTaskQueue {
  /// Creates the queue and spawns its worker thread.
  pub fn new() -> Self {
    let shared = Arc::new(SerialShared {
      state: Mutex::new(SerialState {
        queue: VecDeque::new(),
        destroyed: false,
        waiting: false,
      }),
      cv: Condvar::new(),
    });

    let worker_shared = Arc::clone(&shared);
    let worker = thread::Builder::new()
      .name("sinew-serial-worker".to_string())
      .spawn(move || work(&worker_shared))
      .expect("failed to spawn serial queue worker");

    SerialTaskQueue {
      shared,
      worker: Some(worker),
    }
  }

  /// Appends a task to the queue and wakes the worker.
  ///
  /// # Panics
  ///
  /// Panics if called while another thread is blocked in
  /// [`wait`](SerialTaskQueue::wait); the drain barrier assumes no new tasks
  /// arrive while it blocks.
  pub fn dispatch<F>(&self, task: F)
  where
    F: FnOnce() + Send + 'static,
  {
    {
      let mut state = self.shared.state.lock();
      assert!(!state.destroyed, "dispatch on a destroyed serial queue");
      assert!(!state.waiting, "dispatch while wait() is draining the queue");
      state.queue.push_back(Box::new(task));
    }
    telemetry::increment_counter(LOC_SERIAL, CTR_DISPATCHED);
    // Wake the worker in case it is idle.
    self.shared.cv.notify_one();
  }

  /// Blocks until every previously dispatched task has finished.
  ///
  /// Returns immediately when the queue is already empty; calling it again
  /// right away is cheap and returns promptly.
  pub fn wait(&self) {
    let mut state = self.shared.state.lock();
    state.waiting = true;
    // The worker pops a task only after running it, so an empty queue means
    // nothing is pending and nothing is mid-flight.
    self.shared.cv.wait_while(&mut state, |s| !s.queue.is_empty());
    state.waiting = false;
  }
}

impl Default for SerialTaskQueue {
  fn default() -> Self {
    SerialTaskQueue::new()
  }
}

impl Drop for SerialTaskQueue {
  fn drop(&mut self) {
    {
      let mut state = self.shared.state.lock();
      state.destroyed = true;
      if !state.queue.is_empty() {
        telemetry::increment_counter(LOC_SERIAL, CTR_DROPPED);
      }
    }
    // Wake the worker so it observes the flag and exits.
    self.shared.cv.notify_one();
    if let Some(worker) = self.worker.take() {
      // A panicking task already tore the worker down; nothing to propagate.
      let _ = worker.join();
    }
  }
}

impl fmt::Debug for SerialTaskQueue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.shared.state.lock();
    f.debug_struct("SerialTaskQueue")
      .field("pending", &state.queue.len())
      .field("waiting", &state.waiting)
      .finish_non_exhaustive()
  }
}

fn work(shared: &SerialShared) {
  loop {
    let mut state = shared.state.lock();
    shared
      .cv
      .wait_while(&mut state, |s| s.queue.is_empty() && !s.destroyed);

    if state.destroyed {
      // Terminate; whatever is left in the queue is dropped with it.
      break;
    }

    // Move the task out but leave its slot occupied: the queue stays
    // non-empty while the task runs, which is exactly the predicate wait()
    // relies on for "pending or running".
    let slot = state
      .queue
      .front_mut()
      .expect("worker woken with an empty queue");
    let task = mem::replace(slot, Box::new(|| {}));
    drop(state);

    task();

    let mut state = shared.state.lock();
    // The task is done; retire its placeholder.
    state.queue.pop_front();
    let wake_waiter = state.waiting && state.queue.is_empty();
    drop(state);

    if wake_waiter {
      shared.cv.notify_one();
    }
  }
}
