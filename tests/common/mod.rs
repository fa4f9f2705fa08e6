// Shared scaffolding for the scenario tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An atomic start gate: worker threads spin in [`StartGate::wait`] until the
/// driver calls [`StartGate::open`], so they begin as close to the same time
/// as possible.
#[derive(Clone, Debug, Default)]
pub struct StartGate(Arc<AtomicBool>);

impl StartGate {
  pub fn new() -> Self {
    StartGate(Arc::new(AtomicBool::new(false)))
  }

  pub fn open(&self) {
    self.0.store(true, Ordering::Release);
  }

  pub fn wait(&self) {
    while !self.0.load(Ordering::Acquire) {
      std::hint::spin_loop();
    }
  }
}
