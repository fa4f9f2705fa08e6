// Two-thread mutual-exclusion scenarios for the lock primitives.

mod common;
use common::StartGate;

use sinew::{GuardedCell, SpinLock};

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const ROUNDS: usize = 10;

#[test]
fn guarded_cell_two_thread_adder() {
  const INITIAL: i64 = 60;

  let shared = Arc::new(GuardedCell::new(INITIAL));
  let gate = StartGate::new();

  let mut handles = Vec::new();
  for offset in [3i64, 5] {
    let shared = Arc::clone(&shared);
    let gate = gate.clone();
    handles.push(thread::spawn(move || {
      gate.wait();
      // One coarse critical section per thread, mimicking a task that does a
      // multi-step update under a single acquisition.
      let mut token = shared.acquire();
      for _ in 0..ROUNDS {
        *token += offset;
        thread::sleep(Duration::from_millis(1));
      }
    }));
  }

  gate.open();
  for handle in handles {
    handle.join().unwrap();
  }

  assert_eq!(*shared.acquire(), INITIAL + (ROUNDS as i64) * (3 + 5));
}

// The spin-lock carries no data, so the scenario supplies its own cell and
// promises exclusive access through the lock discipline.
struct SpinProtected {
  lock: SpinLock,
  value: UnsafeCell<i64>,
}

unsafe impl Sync for SpinProtected {}

#[test]
fn spin_lock_balanced_counters() {
  const INITIAL: i64 = 60;

  let shared = Arc::new(SpinProtected {
    lock: SpinLock::new(),
    value: UnsafeCell::new(INITIAL),
  });
  let gate = StartGate::new();

  let mut handles = Vec::new();
  for offset in [3i64, -3] {
    let shared = Arc::clone(&shared);
    let gate = gate.clone();
    handles.push(thread::spawn(move || {
      gate.wait();
      for _ in 0..ROUNDS {
        shared.lock.lock();
        unsafe {
          *shared.value.get() += offset;
        }
        shared.lock.unlock();
      }
    }));
  }

  gate.open();
  for handle in handles {
    handle.join().unwrap();
  }

  // The +3 and -3 rounds cancel exactly.
  let final_value = unsafe { *shared.value.get() };
  assert_eq!(final_value, INITIAL);
}
