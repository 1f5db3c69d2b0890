//! Paced RTP audio sender

use std::thread;
use std::time::Duration;

use parking_lot::MutexGuard;
use tracing::{error, info, trace};

use super::clock::wrapping_before;
use super::state::SessionState;
use super::stream::{RtpLink, Shared, send_error_weight};
use crate::protocol::rtp::RaopAudioPacket;

const FLUSH_POLL: Duration = Duration::from_millis(10);

/// Result of one `send_chunk` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentChunk {
    /// Local ms at which the chunk plays
    pub playtime: u32,
    /// Sequence number used, `None` when nothing was put on the wire
    pub sequence: Option<u16>,
    /// RTP timestamp of the chunk
    pub timestamp: u32,
}

impl SentChunk {
    /// Whether a packet was transmitted
    #[must_use]
    pub fn was_sent(&self) -> bool {
        self.sequence.is_some()
    }
}

impl Shared {
    pub fn send_chunk(&self, frame: &[u8], frames: u32, skip: bool) -> SentChunk {
        let rate = self.params.sample_rate;
        let read_ahead = self.read_ahead_ms;

        let mut core = self.stream.lock();
        if core.state == SessionState::Flushing {
            info!("waiting for flush to end");
        }
        while core.state == SessionState::Flushing {
            MutexGuard::unlocked(&mut core, || thread::sleep(FLUSH_POLL));
        }

        let mut first = false;
        let mut sync = None;
        if core.state == SessionState::Flushed {
            let now = self.clock.now_ms();
            let mode = core.flush_mode;
            core.clock.reanchor(mode, now);
            core.state = SessionState::Streaming;
            first = true;
            sync = core.sync_packet(now, self.clock.now_ntp(), rate, true);
            info!(timestamp = core.clock.first_timestamp, "first packet, sending sync");
        }

        core.clock.advance(frames);
        let timestamp = core.clock.position;
        let playtime = core.clock.playtime(rate);
        let state = core.state;
        let ssrc = core.ssrc;
        let link = core.link.clone();
        drop(core);

        if let (Some(sync), Some(link)) = (sync, link.as_deref()) {
            link.send_sync(&sync);
        }

        let now = self.clock.now_ms();
        if wrapping_before(now.wrapping_add(read_ahead), playtime) {
            let pause = (read_ahead / 2).clamp(10, 100);
            trace!(playtime, now, pause, "read-ahead full");
            thread::sleep(Duration::from_millis(u64::from(pause)));
        }

        let mut sent = SentChunk {
            playtime,
            sequence: None,
            timestamp,
        };

        let late = wrapping_before(playtime, now);
        if let Some(link) = link.as_deref() {
            if state == SessionState::Streaming && !skip && !frame.is_empty() && !late {
                sent.sequence = Some(self.transmit(link, frame, frames, timestamp, ssrc, first));
            }
        }

        self.stream.lock().playtime = playtime.wrapping_sub(read_ahead);
        sent
    }

    fn transmit(
        &self,
        link: &RtpLink,
        frame: &[u8],
        frames: u32,
        timestamp: u32,
        ssrc: u32,
        first: bool,
    ) -> u16 {
        let mut payload = frame.to_vec();
        if let Some(cipher) = &link.cipher {
            cipher.encrypt_frame(&mut payload);
        }

        let (sequence, bytes) = {
            let mut core = self.stream.lock();
            core.seq = core.seq.wrapping_add(1);
            let sequence = core.seq;

            let mut packet = RaopAudioPacket::new(sequence, timestamp, ssrc, payload);
            if first {
                packet = packet.with_marker();
            }
            let bytes = packet.encode();
            core.backlog.store(sequence, timestamp, &bytes);
            (sequence, bytes)
        };

        match link.audio.send_to(&bytes, link.audio_addr) {
            Ok(n) => {
                if n != bytes.len() {
                    error!(sent = n, expected = bytes.len(), "short audio write");
                    self.add_sanity(2);
                }
                let pause = u64::from(frames) * 1_000_000 / (2 * u64::from(self.params.sample_rate));
                thread::sleep(Duration::from_micros(pause));
            }
            Err(e) => {
                error!(error = %e, sequence, "audio write failed");
                self.add_sanity(send_error_weight(&e));
            }
        }

        trace!(sequence, timestamp, "audio packet");
        sequence
    }
}
