//! Time management for the ranging pipeline
//!
//! Frames carry their own capture timestamps, so the core never reads a clock
//! on its own. The clock abstraction exists for the async workers and for tests
//! that need deterministic time:
//! - System clock (wall time in milliseconds)
//! - Fixed clock (tests, replay)
//!
//! `RateGate` is the minimum-interval gate used by every rate-limited component
//! (scene classification cadence is frame-counted, terrain casting and the
//! subsystem workers are time-gated).

/// Timestamp in milliseconds since epoch (or since capture start for replays)
pub type Timestamp = u64;

/// Milliseconds per second
pub const MS_PER_SECOND: f64 = 1000.0;

/// Source of time for the system
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;
}

/// System time source
#[derive(Debug, Clone, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime as StdSystemTime, UNIX_EPOCH};

        StdSystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Fixed time source for testing and replay
#[derive(Debug, Clone)]
pub struct FixedTime {
    timestamp: Timestamp,
}

impl FixedTime {
    /// Create a clock frozen at `timestamp`
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Jump to an absolute time
    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    /// Move forward by `ms`
    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp
    }
}

/// Seconds elapsed between two timestamps, zero if `later` precedes `earlier`
pub fn seconds_between(earlier: Timestamp, later: Timestamp) -> f64 {
    later.saturating_sub(earlier) as f64 / MS_PER_SECOND
}

/// Minimum-interval gate
///
/// Admits at most one event per `min_interval_ms`. Returns
/// `nb::Error::WouldBlock` while the interval has not elapsed, matching the
/// non-blocking convention used by the workers.
///
/// ```rust
/// use rangefinder_core::time::RateGate;
///
/// let mut gate = RateGate::from_hz(2.0);
/// assert!(gate.try_acquire(0).is_ok());
/// assert!(gate.try_acquire(200).is_err());
/// assert!(gate.try_acquire(500).is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RateGate {
    min_interval_ms: u64,
    last: Option<Timestamp>,
}

impl RateGate {
    /// Gate with an explicit minimum interval
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last: None,
        }
    }

    /// Gate admitting at most `hz` events per second
    pub fn from_hz(hz: f64) -> Self {
        let interval = if hz > 0.0 { (MS_PER_SECOND / hz) as u64 } else { u64::MAX };
        Self::new(interval)
    }

    /// Minimum interval in milliseconds
    pub fn interval_ms(&self) -> u64 {
        self.min_interval_ms
    }

    /// Would an event at `now` be admitted
    pub fn is_open(&self, now: Timestamp) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.min_interval_ms,
        }
    }

    /// Admit an event at `now` or report `WouldBlock`
    pub fn try_acquire(&mut self, now: Timestamp) -> nb::Result<(), core::convert::Infallible> {
        if !self.is_open(now) {
            return Err(nb::Error::WouldBlock);
        }
        self.last = Some(now);
        Ok(())
    }

    /// Forget the last admission
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_time_advances() {
        let mut time = FixedTime::new(1000);
        assert_eq!(time.now(), 1000);

        time.advance(500);
        assert_eq!(time.now(), 1500);
    }

    #[test]
    fn seconds_between_saturates() {
        assert_eq!(seconds_between(1000, 3500), 2.5);
        assert_eq!(seconds_between(3500, 1000), 0.0);
    }

    #[test]
    fn rate_gate_spacing() {
        let mut gate = RateGate::new(100);
        assert!(gate.try_acquire(0).is_ok());
        assert!(matches!(gate.try_acquire(99), Err(nb::Error::WouldBlock)));
        assert!(gate.try_acquire(100).is_ok());

        gate.reset();
        assert!(gate.is_open(101));
    }

    #[test]
    fn zero_rate_never_reopens() {
        let mut gate = RateGate::from_hz(0.0);
        assert!(gate.try_acquire(0).is_ok());
        assert!(!gate.is_open(10_000_000));
    }
}
