//! Time source for the session
//!
//! Hesitation is detected by comparing timestamps, never by a scheduled
//! callback, so the only thing the engine needs from time is "now".

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of the current time
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for replay and tests.
///
/// Clones share the same underlying instant, so a caller can keep a handle
/// and advance time while the session owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    epoch: DateTime<Utc>,
    offset_ms: Arc<AtomicI64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl ManualClock {
    /// Create a clock that starts at `epoch`
    pub fn new(epoch: DateTime<Utc>) -> Self {
        Self {
            epoch,
            offset_ms: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    /// Milliseconds elapsed since the epoch
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::SeqCst)
    }

    /// Jump to an absolute offset from the epoch
    pub fn set_offset_ms(&self, offset_ms: i64) {
        self.offset_ms.store(offset_ms, Ordering::SeqCst);
    }

    /// Move time forward
    pub fn advance_ms(&self, delta_ms: i64) {
        self.offset_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Duration::try_milliseconds(self.offset_ms())
            .and_then(|d| self.epoch.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_handle() {
        let clock = ManualClock::default();
        let handle = clock.clone();

        handle.advance_ms(1_500);
        assert_eq!(clock.offset_ms(), 1_500);
        assert_eq!((clock.now() - clock.epoch()).num_milliseconds(), 1_500);

        handle.set_offset_ms(13_000);
        assert_eq!((clock.now() - clock.epoch()).num_milliseconds(), 13_000);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
