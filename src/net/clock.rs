use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::protocol::rtp::NtpTimestamp;

/// Time source for the engine
///
/// `now_ms` is a monotonic millisecond counter that wraps at `u32::MAX`;
/// only differences between two readings are meaningful.
pub trait Clock: Send + Sync {
    /// Monotonic milliseconds, wrapping
    fn now_ms(&self) -> u32;

    /// Wall-clock time in NTP format
    fn now_ntp(&self) -> NtpTimestamp;
}

/// Clock backed by `Instant` and `SystemTime`
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
    origin_ms: u64,
}

impl SystemClock {
    /// Create a clock whose millisecond counter starts at the current wall-clock ms
    #[must_use]
    pub fn new() -> Self {
        let origin_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(0));
        Self {
            origin: Instant::now(),
            origin_ms,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> u32 {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        // Truncation is the wrap
        self.origin_ms.wrapping_add(elapsed) as u32
    }

    fn now_ntp(&self) -> NtpTimestamp {
        NtpTimestamp::now()
    }
}

/// Hand-driven clock for tests and simulations
///
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    ms: Arc<AtomicU32>,
}

impl ManualClock {
    /// Create a clock reading `start_ms`
    #[must_use]
    pub fn new(start_ms: u32) -> Self {
        Self {
            ms: Arc::new(AtomicU32::new(start_ms)),
        }
    }

    /// Move time forward, wrapping
    pub fn advance(&self, ms: u32) {
        // fetch_add on atomics wraps
        self.ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to an absolute reading
    pub fn set(&self, ms: u32) {
        self.ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.ms.load(Ordering::SeqCst)
    }

    fn now_ntp(&self) -> NtpTimestamp {
        NtpTimestamp::from_unix(Duration::from_millis(u64::from(self.now_ms())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();

        let a = clock.now_ms();
        std::thread::sleep(Duration::from_millis(5));
        let b = clock.now_ms();

        assert!(b.wrapping_sub(a) >= 5);
        assert!(clock.now_ntp().seconds > u32::try_from(NtpTimestamp::NTP_UNIX_OFFSET).unwrap());
    }

    #[test]
    fn test_manual_clock_shared_and_wrapping() {
        let clock = ManualClock::new(u32::MAX - 1);
        let other = clock.clone();

        clock.advance(3);

        assert_eq!(other.now_ms(), 1);
        other.set(2500);
        assert_eq!(clock.now_ntp().seconds, 2 + 0x83AA_7E80);
    }
}
