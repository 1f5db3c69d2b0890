//! State shared between the caller and the background workers

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error};

use super::backlog::Backlog;
use super::clock::RtpClock;
use super::state::SessionState;
use crate::net::{Clock, UdpChannel};
use crate::protocol::crypto::FrameCipher;
use crate::protocol::rtp::SyncPacket;
use crate::types::{FlushMode, StreamParameters};

/// `is_sane` turns false once the sanity counter reaches this value
pub const SANITY_THRESHOLD: u32 = 10;

/// The three UDP channels of one connect, plus the payload cipher
#[derive(Debug)]
pub(crate) struct RtpLink {
    pub audio: UdpChannel,
    pub control: UdpChannel,
    pub timing: UdpChannel,
    pub audio_addr: SocketAddr,
    pub control_addr: SocketAddr,
    pub timing_addr: SocketAddr,
    pub cipher: Option<FrameCipher>,
}

impl RtpLink {
    /// Send a sync packet to the receiver's control port
    pub fn send_sync(&self, packet: &SyncPacket) {
        match self.control.send_to(&packet.encode(), self.control_addr) {
            Ok(n) if n == SyncPacket::SIZE => {}
            Ok(n) => error!(sent = n, "short sync write"),
            Err(e) => error!(error = %e, "sync write failed"),
        }
    }
}

/// Fields guarded by the session mutex
#[derive(Debug)]
pub(crate) struct StreamCore {
    pub state: SessionState,
    pub seq: u16,
    pub ssrc: u32,
    pub clock: RtpClock,
    pub flush_mode: FlushMode,
    pub backlog: Backlog,
    pub latency: u32,
    pub link: Option<Arc<RtpLink>>,
    pub playtime: u32,
}

impl StreamCore {
    /// Build a sync packet for `now_ms`, recording its timestamp
    ///
    /// Only produced while streaming.
    pub fn sync_packet(
        &mut self,
        now_ms: u32,
        ntp: crate::protocol::rtp::NtpTimestamp,
        sample_rate: u32,
        first: bool,
    ) -> Option<SyncPacket> {
        if self.state != SessionState::Streaming {
            return None;
        }
        let timestamp = self.clock.rtp_at(now_ms, sample_rate);
        self.clock.latest_timestamp = timestamp;
        debug!(
            ntp.seconds = ntp.seconds,
            ntp.fraction = ntp.fraction,
            timestamp,
            first,
            "sync"
        );
        Some(SyncPacket::new(timestamp, self.latency, ntp, first))
    }

    /// Drop the RTP channels and forget every sent packet
    pub fn release_link(&mut self) -> Option<Arc<RtpLink>> {
        self.backlog.clear();
        self.link.take()
    }
}

/// Session state reachable from every thread
pub(crate) struct Shared {
    pub stream: Mutex<StreamCore>,
    sanity: AtomicU32,
    pub params: StreamParameters,
    pub clock: Arc<dyn Clock>,
    pub read_ahead_ms: u32,
}

impl Shared {
    pub fn new(
        params: StreamParameters,
        clock: Arc<dyn Clock>,
        read_ahead_ms: u32,
        backlog_size: usize,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            stream: Mutex::new(StreamCore {
                state: SessionState::DownFull,
                seq: 0,
                ssrc: 0,
                clock: RtpClock::new(now),
                flush_mode: FlushMode::Reclock,
                backlog: Backlog::new(backlog_size),
                latency: 0,
                link: None,
                playtime: now,
            }),
            sanity: AtomicU32::new(0),
            params,
            clock,
            read_ahead_ms,
        }
    }

    pub fn state(&self) -> SessionState {
        self.stream.lock().state
    }

    pub fn set_state(&self, state: SessionState) {
        self.stream.lock().state = state;
    }

    pub fn add_sanity(&self, weight: u32) {
        self.sanity.fetch_add(weight, Ordering::Relaxed);
    }

    pub fn sanity(&self) -> u32 {
        self.sanity.load(Ordering::Relaxed)
    }

    pub fn reset_sanity(&self) {
        self.sanity.store(0, Ordering::Relaxed);
    }

    /// Emit a periodic sync if streaming
    pub fn send_periodic_sync(&self, link: &RtpLink) {
        let packet = {
            let mut core = self.stream.lock();
            core.sync_packet(
                self.clock.now_ms(),
                self.clock.now_ntp(),
                self.params.sample_rate,
                false,
            )
        };
        if let Some(packet) = packet {
            link.send_sync(&packet);
        }
    }
}

/// Sanity weight of a failed audio write
pub(crate) fn send_error_weight(err: &io::Error) -> u32 {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => 1,
        io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset => 5,
        _ => 2,
    }
}
