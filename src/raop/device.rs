//! Command thread driving one session

use std::net::IpAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, info, warn};

use super::session::RaopSession;
use crate::types::FlushMode;

const IDLE_TICK: Duration = Duration::from_secs(1);

/// Playback command for [`DeviceController`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequest {
    /// Connect to the receiver, or resume after a flush
    Connect,
    /// Flush with the given re-anchoring mode
    Flush(FlushMode),
    /// Set volume (0-100)
    Volume(u8),
    /// Tear down and close
    Disconnect,
}

/// Serializes playback commands for one receiver on a dedicated thread
///
/// Audio does not pass through the controller; the pipeline calls
/// [`RaopSession::send_chunk`] on [`DeviceController::session`] directly.
pub struct DeviceController {
    session: Arc<RaopSession>,
    sender: Option<Sender<DeviceRequest>>,
    receiver: Receiver<DeviceRequest>,
    worker: Option<JoinHandle<()>>,
}

impl DeviceController {
    /// Start the command thread for `session` talking to `host:port`
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be created.
    pub fn new(session: Arc<RaopSession>, host: IpAddr, port: u16) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded();
        let teardown_timeout = session.config().teardown_timeout;

        let worker = {
            let session = Arc::clone(&session);
            let receiver = receiver.clone();
            thread::Builder::new()
                .name("raop-device".to_string())
                .spawn(move || run_device(&session, &receiver, host, port, teardown_timeout))?
        };

        Ok(Self {
            session,
            sender: Some(sender),
            receiver,
            worker: Some(worker),
        })
    }

    /// Shared session, for feeding audio
    #[must_use]
    pub fn session(&self) -> &Arc<RaopSession> {
        &self.session
    }

    /// Queue a request
    pub fn request(&self, request: DeviceRequest) {
        if let Some(sender) = &self.sender {
            if sender.send(request).is_err() {
                warn!(?request, "device thread gone");
            }
        }
    }

    /// Connect to the receiver
    pub fn connect(&self) {
        self.request(DeviceRequest::Connect);
    }

    /// Stop playback; the clock restarts from the wall clock on resume
    pub fn stop(&self) {
        self.request(DeviceRequest::Flush(FlushMode::Reclock));
    }

    /// Pause playback; the timestamps continue where they left off on resume
    pub fn pause(&self) {
        self.request(DeviceRequest::Flush(FlushMode::Rebuffer));
    }

    /// Resume after `pause`
    pub fn unpause(&self) {
        self.request(DeviceRequest::Connect);
    }

    /// Drop pending requests and disconnect
    pub fn disconnect(&self) {
        let dropped = self.receiver.try_iter().count();
        if dropped > 0 {
            debug!(dropped, "pending device requests dropped");
        }
        self.request(DeviceRequest::Disconnect);
    }

    /// Set volume, clamped to 100
    pub fn set_volume(&self, volume: u8) {
        self.request(DeviceRequest::Volume(volume.min(100)));
    }
}

impl Drop for DeviceController {
    fn drop(&mut self) {
        // The worker drains the final disconnect, then sees the closed channel
        self.disconnect();
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("device thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for DeviceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceController")
            .field("session", &self.session)
            .field("pending", &self.receiver.len())
            .finish_non_exhaustive()
    }
}

fn run_device(
    session: &RaopSession,
    receiver: &Receiver<DeviceRequest>,
    host: IpAddr,
    port: u16,
    teardown_timeout: Duration,
) {
    let mut flushed_at: Option<Instant> = None;

    loop {
        match receiver.recv_timeout(IDLE_TICK) {
            Ok(request) => {
                debug!(?request, "device request");
                match request {
                    DeviceRequest::Connect => {
                        flushed_at = None;
                        if let Err(e) = session.connect(host, port) {
                            warn!(%host, port, error = %e, "device connect failed");
                        }
                    }
                    DeviceRequest::Flush(mode) => {
                        if let Err(e) = session.flush_stream(mode) {
                            debug!(error = %e, "flush not sent");
                        }
                        flushed_at = Some(Instant::now());
                    }
                    DeviceRequest::Volume(volume) => {
                        if let Err(e) = session.update_volume(volume, false) {
                            debug!(volume, error = %e, "volume not sent");
                        }
                    }
                    DeviceRequest::Disconnect => {
                        flushed_at = None;
                        if let Err(e) = session.disconnect() {
                            warn!(error = %e, "device disconnect failed");
                        }
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if flushed_at.is_some_and(|at| at.elapsed() > teardown_timeout) {
                    info!("idle after flush, disconnecting");
                    flushed_at = None;
                    if let Err(e) = session.disconnect() {
                        warn!(error = %e, "idle disconnect failed");
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
