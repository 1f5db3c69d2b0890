//! RTP timeline anchored to local milliseconds

use crate::types::FlushMode;

/// `a` is strictly before `b` on a wrapping 32-bit timeline
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn wrapping_before(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

/// Maps local time to RTP timestamps
///
/// `position` is the timestamp of the last frame handed to the sender.
/// `latest_timestamp` is the last value announced in a sync packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpClock {
    /// RTP timestamp at the anchor
    pub first_timestamp: u32,
    /// Local ms at the anchor
    pub first_local_ms: u32,
    /// Last timestamp sent in a sync packet
    pub latest_timestamp: u32,
    /// Current audio position
    pub position: u32,
}

impl RtpClock {
    /// Clock with every field at `now_ms`, so the timeline starts sane before any connect
    #[must_use]
    pub fn new(now_ms: u32) -> Self {
        Self {
            first_timestamp: now_ms,
            first_local_ms: now_ms,
            latest_timestamp: now_ms,
            position: now_ms,
        }
    }

    /// RTP timestamp for a local instant
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn rtp_at(&self, local_ms: u32, sample_rate: u32) -> u32 {
        let elapsed = i64::from(local_ms.wrapping_sub(self.first_local_ms) as i32);
        let samples = elapsed * i64::from(sample_rate) / 1000;
        self.first_timestamp.wrapping_add(samples as u32)
    }

    /// Local ms at which `position` plays
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn playtime(&self, sample_rate: u32) -> u32 {
        let frames = u64::from(self.position.wrapping_sub(self.first_timestamp));
        let ms = frames * 1000 / u64::from(sample_rate.max(1));
        self.first_local_ms.wrapping_add(ms as u32)
    }

    /// Move the audio position forward by `frames`
    pub fn advance(&mut self, frames: u32) {
        self.position = self.position.wrapping_add(frames);
    }

    /// Re-anchor on the first packet after a flush or connect
    ///
    /// The position never falls behind a timestamp the receiver has already
    /// seen, so timestamps stay monotonic across flushes.
    pub fn reanchor(&mut self, mode: FlushMode, now_ms: u32) {
        if wrapping_before(self.position, self.latest_timestamp) {
            self.position = self.latest_timestamp;
        }

        match mode {
            FlushMode::Flush => {}
            FlushMode::Reclock => {
                self.first_local_ms = now_ms;
                self.first_timestamp = self.position;
            }
            FlushMode::Rebuffer => self.first_timestamp = self.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wrapping_before() {
        assert!(wrapping_before(1, 2));
        assert!(!wrapping_before(2, 2));
        assert!(wrapping_before(u32::MAX, 3));
        assert!(!wrapping_before(3, u32::MAX));
    }

    #[test]
    fn test_rtp_at_one_second() {
        let clock = RtpClock::new(1000);

        assert_eq!(clock.rtp_at(2000, 44100), 1000 + 44100);
        assert_eq!(clock.rtp_at(1000, 44100), 1000);
        // Instants before the anchor map backwards
        assert_eq!(clock.rtp_at(500, 44100), 1000u32.wrapping_sub(22050));
    }

    #[test]
    fn test_playtime_follows_position() {
        let mut clock = RtpClock::new(0);
        clock.advance(44100);

        assert_eq!(clock.playtime(44100), 1000);
    }

    #[test]
    fn test_reclock_anchors_now() {
        let mut clock = RtpClock::new(100);
        clock.advance(352);

        clock.reanchor(FlushMode::Reclock, 5000);

        assert_eq!(clock.first_local_ms, 5000);
        assert_eq!(clock.first_timestamp, 452);
        assert_eq!(clock.playtime(44100), 5000);
    }

    #[test]
    fn test_rebuffer_keeps_local_anchor() {
        let mut clock = RtpClock::new(100);
        clock.advance(1000);

        clock.reanchor(FlushMode::Rebuffer, 9000);

        assert_eq!(clock.first_local_ms, 100);
        assert_eq!(clock.first_timestamp, 1100);
    }

    #[test]
    fn test_reanchor_never_goes_back() {
        let mut clock = RtpClock::new(0);
        clock.advance(352);
        clock.latest_timestamp = 100_000;

        clock.reanchor(FlushMode::Reclock, 10);

        assert_eq!(clock.position, 100_000);
        assert_eq!(clock.first_timestamp, 100_000);
    }

    proptest! {
        #[test]
        fn prop_reanchor_monotonic(
            start in any::<u32>(),
            frames in 0u32..1_000_000,
            ahead in 0u32..1_000_000,
            now in any::<u32>(),
        ) {
            let mut clock = RtpClock::new(start);
            clock.advance(frames);
            clock.latest_timestamp = clock.position.wrapping_add(ahead);
            let before = clock.position;

            clock.reanchor(FlushMode::Reclock, now);

            prop_assert!(!wrapping_before(clock.position, before));
            prop_assert!(!wrapping_before(clock.position, clock.latest_timestamp));
            prop_assert_eq!(clock.rtp_at(now, 44100), clock.position);
        }
    }
}
