//! Public RAOP session

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use parking_lot::Mutex;
use rand::Rng;
use tracing::{Span, debug, info, info_span, warn};

use super::control::run_control;
use super::sender::SentChunk;
use super::state::SessionState;
use super::stream::{RtpLink, SANITY_THRESHOLD, Shared};
use super::timing::run_timing;
use super::volume::volume_parameter;
use super::worker::WorkerHandle;
use crate::error::{RaopError, Result};
use crate::net::{Clock, SystemClock, UdpChannel};
use crate::protocol::crypto::RaopSessionKeys;
use crate::protocol::daap::{DmapProgress, TrackMetadata};
use crate::protocol::rtsp::RtspClient;
use crate::protocol::sdp::create_raop_announce_sdp;
use crate::types::{CryptoMode, FlushMode, SessionConfig};

/// Open-ended progress: one hour minus a second
const OPEN_ENDED_SECS: u32 = 3599;

/// Control-plane fields, only touched by caller threads
#[derive(Default)]
struct ControlPlane {
    host: Option<SocketAddr>,
    rtsp: Option<RtspClient>,
    timing: Option<WorkerHandle>,
    control: Option<WorkerHandle>,
    volume: u8,
}

impl ControlPlane {
    fn stop_workers(&mut self) {
        if let Some(mut worker) = self.control.take() {
            worker.stop();
        }
        if let Some(mut worker) = self.timing.take() {
            worker.stop();
        }
    }

    fn rtsp(&mut self) -> Result<&mut RtspClient> {
        self.rtsp.as_mut().ok_or(RaopError::NotConnected)
    }
}

/// RAOP client session for one receiver
///
/// All methods take `&self`; the session can be shared between the thread
/// feeding audio and the thread handling playback commands. Locks are always
/// taken control plane first, stream state second.
pub struct RaopSession {
    config: SessionConfig,
    shared: Arc<Shared>,
    control: Mutex<ControlPlane>,
    span: Span,
}

impl RaopSession {
    /// Create a session using the system clock
    ///
    /// # Errors
    ///
    /// Returns `RaopError::Unsupported*` or `InvalidParameter` if the stream
    /// parameters in `config` cannot be streamed.
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a session scheduling against `clock`
    ///
    /// # Errors
    ///
    /// Same as [`RaopSession::new`].
    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let params = config.stream_parameters();
        params.validate()?;

        let span = info_span!(
            "raop_session",
            host = tracing::field::Empty,
            port = tracing::field::Empty
        );
        let shared = Arc::new(Shared::new(
            params,
            clock,
            config.read_ahead_ms(),
            config.backlog_size,
        ));
        let control = Mutex::new(ControlPlane {
            volume: config.volume.min(100),
            ..ControlPlane::default()
        });

        Ok(Self {
            config,
            shared,
            control,
            span,
        })
    }

    /// Session configuration
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connect to `host:port` and start streaming channels
    ///
    /// Succeeds immediately if already connected. On failure every partial
    /// resource is released and the state is `DownFull`.
    ///
    /// # Errors
    ///
    /// Returns the first handshake error.
    pub fn connect(&self, host: IpAddr, port: u16) -> Result<()> {
        let _enter = self.span.enter();
        let mut control = self.control.lock();

        if self.shared.state().is_connected() {
            return Ok(());
        }

        self.span.record("host", tracing::field::display(host));
        self.span.record("port", port);

        if let Err(e) = self.handshake(&mut control, SocketAddr::new(host, port)) {
            warn!(error = %e, "connect failed");
            self.release(&mut control);
            if let Some(rtsp) = control.rtsp.take() {
                rtsp.close();
            }
            self.shared.set_state(SessionState::DownFull);
            return Err(e);
        }

        let volume = control.volume;
        if let Err(e) = self.send_volume(&mut control, volume, true) {
            warn!(error = %e, "initial volume not applied");
        }

        info!("connected");
        Ok(())
    }

    fn handshake(&self, control: &mut ControlPlane, addr: SocketAddr) -> Result<()> {
        let previous = self.shared.state();
        let params = self.shared.params;

        // Leftovers of a connection the peer dropped
        self.release(control);

        {
            let mut core = self.shared.stream.lock();
            core.ssrc = rand::random();
            core.latency = 0;
        }
        self.shared.reset_sanity();
        control.host = Some(addr);

        let fresh = previous <= SessionState::PeerDisconnect || control.rtsp.is_none();
        if fresh {
            if let Some(stale) = control.rtsp.take() {
                stale.close();
            }
            control.rtsp = Some(RtspClient::connect(
                addr,
                self.config.rtsp_timeout,
                &self.config.user_agent,
            )?);
        }

        let rtsp = control.rtsp()?;
        rtsp.renew_session();
        info!(local = %rtsp.local_ip(), "local interface");

        if fresh {
            rtsp.options()?;
        }

        let keys = match params.crypto {
            CryptoMode::Rsa => Some(RaopSessionKeys::generate()?),
            _ => None,
        };
        let sdp = create_raop_announce_sdp(
            &params,
            rtsp.session().sid(),
            &rtsp.local_ip().to_string(),
            &addr.ip().to_string(),
            keys.as_ref(),
        )?;

        let challenge: [u8; 16] = rand::thread_rng().r#gen();
        let challenge = STANDARD_NO_PAD.encode(challenge);
        rtsp.announce(&sdp, Some(challenge.as_str()))?;

        // Local ports must exist before SETUP advertises them
        let local = self.config.local_addr;
        let ctrl = UdpChannel::bind_worker(local)?;
        let time = UdpChannel::bind_worker(local)?;
        let audio = UdpChannel::bind_audio(local)?;

        let transport = rtsp.setup(ctrl.local_port(), time.local_port())?;
        let host = addr.ip();
        debug!(
            audio.local = audio.local_port(),
            audio.remote = transport.server_port,
            timing.local = time.local_port(),
            timing.remote = transport.timing_port,
            control.local = ctrl.local_port(),
            control.remote = transport.control_port,
            "RTP channels"
        );

        let link = Arc::new(RtpLink {
            audio,
            control: ctrl,
            timing: time,
            audio_addr: SocketAddr::new(host, transport.server_port),
            control_addr: SocketAddr::new(host, transport.control_port),
            timing_addr: SocketAddr::new(host, transport.timing_port),
            cipher: keys.as_ref().map(RaopSessionKeys::cipher).transpose()?,
        });

        let first_timestamp = {
            let mut core = self.shared.stream.lock();
            core.seq = rand::random();
            core.backlog.clear();
            core.link = Some(Arc::clone(&link));
            core.clock.first_timestamp
        };

        let timing_link = Arc::clone(&link);
        let clock = Arc::clone(&self.shared.clock);
        control.timing = Some(WorkerHandle::spawn("timing", self.span.clone(), move |flag| {
            run_timing(timing_link, clock, flag);
        })?);

        let seq = self.shared.stream.lock().seq;
        let latency = control.rtsp()?.record(seq, first_timestamp)?;

        let shared = Arc::clone(&self.shared);
        control.control = Some(WorkerHandle::spawn("control", self.span.clone(), move |flag| {
            run_control(shared, link, flag);
        })?);

        let mut core = self.shared.stream.lock();
        core.latency = latency.unwrap_or(0);
        core.state = SessionState::Flushed;
        core.flush_mode = FlushMode::Reclock;
        debug!(latency = core.latency, seq, "record accepted");

        Ok(())
    }

    /// Stop the workers and close the RTP channels
    fn release(&self, control: &mut ControlPlane) {
        control.stop_workers();
        drop(self.shared.stream.lock().release_link());
    }

    /// Connect again to the last known receiver
    ///
    /// # Errors
    ///
    /// Returns `RaopError::NotConnected` if `connect` was never called, or the handshake error.
    pub fn reconnect(&self) -> Result<()> {
        let addr = self.control.lock().host.ok_or(RaopError::NotConnected)?;
        self.connect(addr.ip(), addr.port())
    }

    /// Disconnect and reconnect to the last known receiver
    ///
    /// # Errors
    ///
    /// Returns the handshake error; a failed disconnect is only logged.
    pub fn repair(&self) -> Result<()> {
        if let Err(e) = self.disconnect() {
            warn!(parent: &self.span, error = %e, "disconnect before repair failed");
        }
        self.reconnect()
    }

    /// Ask the receiver to drop everything queued and stop playback
    ///
    /// `mode` selects how the clock is re-anchored when streaming resumes.
    ///
    /// # Errors
    ///
    /// Returns `RaopError::InvalidState` unless streaming, or the `FLUSH` error.
    /// The state is `Flushed` afterwards either way.
    pub fn flush_stream(&self, mode: FlushMode) -> Result<()> {
        let _enter = self.span.enter();
        let mut control = self.control.lock();

        let (seq, timestamp) = {
            let mut core = self.shared.stream.lock();
            if core.state != SessionState::Streaming {
                return Err(RaopError::InvalidState {
                    operation: "flush",
                    current_state: core.state.to_string(),
                });
            }
            core.state = SessionState::Flushing;
            (core.seq, core.clock.position)
        };

        info!(seq, timestamp, "flushing");
        // Everything below these values is discarded
        let result = control
            .rtsp()
            .and_then(|rtsp| rtsp.flush(seq.wrapping_add(1), timestamp.wrapping_add(1)));

        let mut core = self.shared.stream.lock();
        core.state = SessionState::Flushed;
        core.flush_mode = mode;

        result
    }

    /// Send one encoded frame, paced against its playtime
    ///
    /// An empty `frame` or `skip` still advances the timeline by `frames`
    /// without transmitting. Transport errors are folded into the sanity
    /// counter rather than returned.
    pub fn send_chunk(&self, frame: &[u8], frames: u32, skip: bool) -> SentChunk {
        let _enter = self.span.enter();
        self.shared.send_chunk(frame, frames, skip)
    }

    /// Stop streaming: close the RTP channels and send `TEARDOWN`
    ///
    /// The RTSP connection stays open for a later `connect`.
    ///
    /// # Errors
    ///
    /// Returns `RaopError::InvalidState` if not connected, or the `TEARDOWN` error.
    pub fn teardown(&self) -> Result<()> {
        let _enter = self.span.enter();
        let mut control = self.control.lock();
        self.teardown_locked(&mut control)
    }

    fn teardown_locked(&self, control: &mut ControlPlane) -> Result<()> {
        let state = self.shared.state();
        if !state.is_connected() {
            return Err(RaopError::InvalidState {
                operation: "teardown",
                current_state: state.to_string(),
            });
        }

        self.release(control);
        self.shared.set_state(SessionState::Down);
        info!("teardown");

        control.rtsp()?.teardown()
    }

    /// Tear down if needed and close the RTSP connection
    ///
    /// # Errors
    ///
    /// Returns the `TEARDOWN` error; the state is `DownFull` regardless.
    pub fn disconnect(&self) -> Result<()> {
        let _enter = self.span.enter();
        let mut control = self.control.lock();

        let result = if self.shared.state().is_connected() {
            self.teardown_locked(&mut control)
        } else {
            self.release(&mut control);
            Ok(())
        };

        if let Some(rtsp) = control.rtsp.take() {
            rtsp.close();
        }
        self.shared.set_state(SessionState::DownFull);

        result
    }

    /// Release every thread and socket
    ///
    /// No `TEARDOWN` is sent. Dropping the session does the same.
    pub fn destroy(self) {
        drop(self);
    }

    /// Whether the session is usable
    ///
    /// False once the sanity counter reaches its threshold or the receiver
    /// closed the RTSP connection. The caller decides when to `repair`.
    pub fn is_sane(&self) -> bool {
        if self.shared.sanity() >= SANITY_THRESHOLD {
            return false;
        }

        // A busy control plane means a verb is in flight on a live link
        let Some(control) = self.control.try_lock() else {
            return true;
        };
        match control.rtsp.as_ref() {
            Some(rtsp) if rtsp.is_alive() => true,
            Some(_) => {
                let mut core = self.shared.stream.lock();
                if core.state > SessionState::PeerDisconnect {
                    warn!(parent: &self.span, state = %core.state, "receiver closed the connection");
                    core.state = SessionState::PeerDisconnect;
                }
                false
            }
            None => false,
        }
    }

    /// Set volume (0-100)
    ///
    /// Unless `force`, sending the cached value again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RaopError::InvalidState` before `connect`, or the `SET_PARAMETER` error.
    pub fn update_volume(&self, volume: u8, force: bool) -> Result<()> {
        let _enter = self.span.enter();
        let mut control = self.control.lock();
        self.send_volume(&mut control, volume, force)
    }

    fn send_volume(&self, control: &mut ControlPlane, volume: u8, force: bool) -> Result<()> {
        let volume = volume.min(100);
        let state = self.shared.state();
        if state < SessionState::Flushed {
            return Err(RaopError::InvalidState {
                operation: "volume",
                current_state: state.to_string(),
            });
        }
        if !force && volume == control.volume {
            return Ok(());
        }

        control.volume = volume;
        debug!(volume, "volume");
        control.rtsp()?.set_parameter(&volume_parameter(volume))
    }

    /// Cached volume
    pub fn volume(&self) -> u8 {
        self.control.lock().volume
    }

    /// Report track progress
    ///
    /// `start_ms` is the local instant the track started; a zero
    /// `duration_ms` reports an open-ended track.
    ///
    /// # Errors
    ///
    /// Returns `RaopError::InvalidState` before `connect`, or the `SET_PARAMETER` error.
    pub fn set_progress(&self, start_ms: u32, duration_ms: u32) -> Result<()> {
        let _enter = self.span.enter();
        let mut control = self.control.lock();

        let progress = {
            let core = self.shared.stream.lock();
            if core.state < SessionState::Flushed {
                return Err(RaopError::InvalidState {
                    operation: "progress",
                    current_state: core.state.to_string(),
                });
            }
            let rate = self.shared.params.sample_rate;
            let current = core.clock.position;
            let end = if duration_ms == 0 {
                current.wrapping_add(OPEN_ENDED_SECS.wrapping_mul(rate))
            } else {
                core.clock.rtp_at(start_ms.wrapping_add(duration_ms), rate)
            };
            DmapProgress::new(core.clock.rtp_at(start_ms, rate), current, end)
        };

        control.rtsp()?.set_parameter(&progress.encode())
    }

    /// Push track metadata, stamped with the current position
    ///
    /// # Errors
    ///
    /// Returns `RaopError::NotConnected` without an RTSP connection, or the `SET_PARAMETER` error.
    pub fn set_metadata(&self, metadata: &TrackMetadata) -> Result<()> {
        let _enter = self.span.enter();
        let mut control = self.control.lock();
        let rtptime = self.shared.stream.lock().clock.position;
        control.rtsp()?.set_metadata(metadata.encode_dmap(), rtptime)
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Receiver latency in samples, from the last `RECORD`
    pub fn latency(&self) -> u32 {
        self.shared.stream.lock().latency
    }

    /// RTP timestamp corresponding to a local instant
    pub fn timestamp_at(&self, local_ms: u32) -> u32 {
        let core = self.shared.stream.lock();
        core.clock.rtp_at(local_ms, self.shared.params.sample_rate)
    }

    /// Playtime of the last chunk minus the read-ahead
    pub fn playtime(&self) -> u32 {
        self.shared.stream.lock().playtime
    }

    /// Current RTP audio position
    pub fn position(&self) -> u32 {
        self.shared.stream.lock().clock.position
    }

    /// Last sequence number sent
    pub fn sequence(&self) -> u16 {
        self.shared.stream.lock().seq
    }

    /// Accumulated failure weight
    pub fn sanity(&self) -> u32 {
        self.shared.sanity()
    }
}

impl Drop for RaopSession {
    fn drop(&mut self) {
        let control = self.control.get_mut();
        control.stop_workers();
        drop(self.shared.stream.lock().release_link());
        if let Some(rtsp) = control.rtsp.take() {
            rtsp.close();
        }
    }
}

impl std::fmt::Debug for RaopSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaopSession")
            .field("state", &self.shared.state())
            .field("sanity", &self.shared.sanity())
            .finish_non_exhaustive()
    }
}
