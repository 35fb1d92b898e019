//! Monotonic time source (C1).
//!
//! Latency accounting and the throughput ticker both need a cheap monotonic
//! clock. Grounded in the `ClockSource` enum pattern from
//! `roughenough-protocol::util::clocksource` (a `System` variant backed by
//! the real clock, plus a `Mock` variant for deterministic tests) but
//! returns microseconds/milliseconds off `Instant` rather than wall-clock
//! epoch seconds, since latency deltas must never be affected by clock
//! adjustments.

use std::sync::atomic::{AtomicI64, Ordering::SeqCst};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub enum Clock {
    /// Backed by `Instant::now()`.
    Monotonic { epoch: Instant },
    /// Fixed offset in microseconds from a shared epoch, for tests.
    Mock { epoch: Instant, offset_us: Arc<AtomicI64> },
}

impl Clock {
    pub fn new() -> Self {
        Clock::Monotonic { epoch: Instant::now() }
    }

    pub fn new_mock() -> Self {
        Clock::Mock {
            epoch: Instant::now(),
            offset_us: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Microseconds elapsed since this clock's epoch.
    pub fn now_us(&self) -> i64 {
        match self {
            Clock::Monotonic { epoch } => epoch.elapsed().as_micros() as i64,
            Clock::Mock { epoch, offset_us } => {
                epoch.elapsed().as_micros() as i64 + offset_us.load(SeqCst)
            }
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.now_us() / 1000
    }

    /// For test use only: advance a mock clock by the given duration.
    pub fn advance(&self, delta: Duration) {
        match self {
            Clock::Monotonic { .. } => unreachable!("advance() only valid on a mock clock"),
            Clock::Mock { offset_us, .. } => {
                offset_us.fetch_add(delta.as_micros() as i64, SeqCst);
            }
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_advances() {
        let clock = Clock::new();
        let t0 = clock.now_us();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.now_us() > t0);
    }

    #[test]
    fn mock_clock_is_controlled_by_advance() {
        let clock = Clock::new_mock();
        let t0 = clock.now_us();
        clock.advance(Duration::from_millis(12));
        assert!(clock.now_us() - t0 >= 12_000);
    }

    #[test]
    fn cloned_mock_clocks_share_offset() {
        let clock = Clock::new_mock();
        let clone = clock.clone();
        clock.advance(Duration::from_millis(7));
        assert_eq!(clock.now_ms(), clone.now_ms());
    }
}
