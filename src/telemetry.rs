// src/telemetry.rs

//! Opt-in diagnostics for scheduling and back-pressure behavior.
//!
//! With the `telemetry` feature enabled, the primitives record events (ring
//! adaptations, task dispatch/drop counts) into a global collector that can
//! be dumped with [`print_telemetry_report`]. With the feature disabled —
//! the default — every hook is an empty `#[inline(always)]` function and the
//! crate carries no collector at all.
//!
//! Error reporting never goes through here; failures are surfaced
//! structurally through return values.

#[cfg(feature = "telemetry")]
pub mod enabled {
  //! The collecting implementation, compiled only with the `telemetry`
  //! feature.

  use std::collections::HashMap;
  use std::fmt;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use std::thread::{self, ThreadId};
  use std::time::Instant;

  static NEXT_EVENT_SEQUENCE_ID: AtomicUsize = AtomicUsize::new(0);

  /// One recorded event.
  #[derive(Clone)]
  pub struct TelemetryEvent {
    /// Global sequence number, assigned at record time.
    pub seq_id: usize,
    /// When the event was recorded.
    pub timestamp: Instant,
    /// The OS thread that recorded it.
    pub os_thread_id: ThreadId,
    /// Optional ID of the data item involved.
    pub item_id: Option<usize>,
    /// Code location constant (e.g. `task::pool`).
    pub location: String,
    /// Event type constant (e.g. `Adapt:BatchDoubled`).
    pub event_type: String,
    /// Free-form detail.
    pub message: Option<String>,
  }

  impl fmt::Debug for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TelemetryEvent")
        .field("seq", &self.seq_id)
        .field("os_tid", &self.os_thread_id)
        .field("item_id", &self.item_id)
        .field("loc", &self.location)
        .field("evt", &self.event_type)
        .field("msg", &self.message.as_deref().unwrap_or(""))
        .finish()
    }
  }

  type CounterKey = (String, String); // (location, counter_name)

  struct CollectorData {
    events: Vec<TelemetryEvent>,
    counters: HashMap<CounterKey, usize>,
    start_time: Instant,
  }

  impl CollectorData {
    fn new() -> Self {
      CollectorData {
        events: Vec::new(),
        counters: HashMap::new(),
        start_time: Instant::now(),
      }
    }
  }

  lazy_static::lazy_static! {
    static ref GLOBAL_COLLECTOR: Mutex<CollectorData> = Mutex::new(CollectorData::new());
  }

  /// Records one event into the global collector.
  pub fn log_event_fn(item_id: Option<usize>, location: &str, event_type: &str, message: Option<String>) {
    let event = TelemetryEvent {
      seq_id: NEXT_EVENT_SEQUENCE_ID.fetch_add(1, Ordering::Relaxed),
      timestamp: Instant::now(),
      os_thread_id: thread::current().id(),
      item_id,
      location: location.to_string(),
      event_type: event_type.to_string(),
      message,
    };

    if let Ok(mut collector) = GLOBAL_COLLECTOR.lock() {
      collector.events.push(event);
    }
  }

  /// Bumps a named counter.
  pub fn increment_counter_fn(location: &'static str, counter_name: &str) {
    let key = (location.to_string(), counter_name.to_string());
    if let Ok(mut collector) = GLOBAL_COLLECTOR.lock() {
      *collector.counters.entry(key).or_insert(0) += 1;
    }
  }

  /// Prints everything collected so far to stdout.
  pub fn print_telemetry_report_fn() {
    let collector = match GLOBAL_COLLECTOR.lock() {
      Ok(collector) => collector,
      Err(_) => return,
    };

    println!("\n--- sinew telemetry report ---");

    if collector.events.is_empty() {
      println!("[events] none recorded");
    } else {
      println!("[events] {} recorded:", collector.events.len());
      let mut sorted_events = collector.events.clone();
      sorted_events.sort_by_key(|e| e.seq_id);
      for event in sorted_events.iter() {
        let since_start = event.timestamp.duration_since(collector.start_time);
        println!(
          "  +{:<10.6}s [seq:{:<5}] tid:{:?} item:{} loc:{:<24} evt:{:<24} {}",
          since_start.as_secs_f64(),
          event.seq_id,
          event.os_thread_id,
          event.item_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
          event.location,
          event.event_type,
          event.message.as_deref().unwrap_or("")
        );
      }
    }

    if collector.counters.is_empty() {
      println!("[counters] none recorded");
    } else {
      println!("[counters] {} recorded:", collector.counters.len());
      let mut sorted_counters: Vec<_> = collector.counters.iter().collect();
      sorted_counters.sort_by(|(left, _), (right, _)| left.cmp(right));
      for ((location, name), count) in sorted_counters {
        println!("  loc:{:<24} counter:{:<28} value: {}", location, name, count);
      }
    }
    println!("--- end of telemetry report ---");
  }

  /// Clears all recorded events and counters.
  pub fn clear_telemetry_fn() {
    if let Ok(mut collector) = GLOBAL_COLLECTOR.lock() {
      collector.events.clear();
      collector.counters.clear();
      collector.start_time = Instant::now();
    }
    NEXT_EVENT_SEQUENCE_ID.store(0, Ordering::Relaxed);
  }
}

#[cfg(not(feature = "telemetry"))]
pub mod disabled {
  //! No-op stubs compiled when the `telemetry` feature is off.

  /// Does nothing; the `telemetry` feature is disabled.
  #[inline(always)]
  pub fn log_event_fn(_item_id: Option<usize>, _location: &'static str, _event_type: &'static str, _message: Option<String>) {}

  /// Does nothing; the `telemetry` feature is disabled.
  #[inline(always)]
  pub fn increment_counter_fn(_location: &'static str, _counter_name: &'static str) {}

  /// Does nothing; the `telemetry` feature is disabled.
  #[inline(always)]
  pub fn print_telemetry_report_fn() {}

  /// Does nothing; the `telemetry` feature is disabled.
  #[inline(always)]
  pub fn clear_telemetry_fn() {}
}

// Re-export one set of names regardless of the feature state.
#[cfg(feature = "telemetry")]
pub use enabled::{
  clear_telemetry_fn as clear_telemetry, increment_counter_fn as increment_counter, log_event_fn as log_event,
  print_telemetry_report_fn as print_telemetry_report,
};

#[cfg(not(feature = "telemetry"))]
pub use disabled::{
  clear_telemetry_fn as clear_telemetry, increment_counter_fn as increment_counter, log_event_fn as log_event,
  print_telemetry_report_fn as print_telemetry_report,
};
