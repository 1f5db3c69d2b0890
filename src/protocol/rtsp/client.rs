//! Blocking RTSP client for the RAOP control connection
//!
//! Owns the TCP stream, writes requests built by [`RaopRtspSession`] and reads
//! responses through the sans-IO [`RtspCodec`]. Every verb is bounded by the
//! configured timeout.

use std::io::{self, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::headers::{names, raop};
use super::session::RaopRtspSession;
use super::transport::RaopTransport;
use super::{Method, RtspCodec, RtspRequest, RtspResponse};
use crate::error::{RaopError, Result};

/// Blocking RTSP connection to one receiver
pub struct RtspClient {
    stream: TcpStream,
    codec: RtspCodec,
    session: RaopRtspSession,
    timeout: Duration,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
}

impl RtspClient {
    /// Open the TCP connection
    ///
    /// # Errors
    ///
    /// Returns `RaopError::Network` if the receiver cannot be reached in time.
    pub fn connect(addr: SocketAddr, timeout: Duration, user_agent: &str) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(timeout))?;

        let local_addr = stream.local_addr()?;
        debug!(%addr, local = %local_addr, "RTSP connected");

        Ok(Self {
            stream,
            codec: RtspCodec::new(),
            session: RaopRtspSession::new(local_addr.ip(), user_agent),
            timeout,
            local_addr,
            peer_addr: addr,
        })
    }

    /// Local end of the TCP connection
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Local IP used in the SDP origin line and URIs
    #[must_use]
    pub fn local_ip(&self) -> IpAddr {
        self.local_addr.ip()
    }

    /// Receiver address
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Request factory for this connection
    #[must_use]
    pub fn session(&self) -> &RaopRtspSession {
        &self.session
    }

    /// Draw fresh stream identifiers before a new ANNOUNCE
    pub fn renew_session(&mut self) {
        let ip = self.local_ip();
        self.session.renew(ip);
    }

    /// Send a request and wait for its response
    ///
    /// # Errors
    ///
    /// Returns `RaopError::Timeout` if no complete response arrives in time,
    /// `RaopError::PeerClosed` on EOF, and a status or codec error for a bad reply.
    /// Late replies to earlier timed-out requests are discarded.
    pub fn execute(&mut self, request: &RtspRequest) -> Result<RtspResponse> {
        trace!(method = request.method.as_str(), uri = %request.uri, "RTSP request");
        self.stream.write_all(&request.encode())?;

        let deadline = Instant::now() + self.timeout;
        let response = loop {
            let response = self.read_response(request.method, deadline)?;
            match (request.cseq(), response.cseq()) {
                (Some(expected), Some(actual)) if actual < expected => {
                    debug!(expected, actual, "dropping stale RTSP response");
                }
                _ => break response,
            }
        };
        trace!(
            method = request.method.as_str(),
            status = response.status.as_u16(),
            "RTSP response"
        );

        self.session.process_response(request, &response)?;
        Ok(response)
    }

    // A partial response stays buffered on timeout so its tail still parses
    fn read_response(&mut self, method: Method, deadline: Instant) -> Result<RtspResponse> {
        let mut buf = [0u8; 4096];

        loop {
            match self.codec.decode() {
                Ok(Some(response)) => return Ok(response),
                Ok(None) => {}
                Err(e) => {
                    self.codec.reset();
                    return Err(e.into());
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RaopError::Timeout { method });
            }
            self.stream.set_read_timeout(Some(remaining))?;

            match self.stream.read(&mut buf) {
                Ok(0) => return Err(RaopError::PeerClosed),
                Ok(n) => {
                    if let Err(e) = self.codec.feed(&buf[..n]) {
                        self.codec.reset();
                        return Err(e.into());
                    }
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    return Err(RaopError::Timeout { method });
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// OPTIONS
    ///
    /// # Errors
    ///
    /// Returns an error if the verb fails.
    pub fn options(&mut self) -> Result<RtspResponse> {
        let request = self.session.options_request();
        self.execute(&request)
    }

    /// ANNOUNCE with an SDP body, optionally carrying `Apple-Challenge`
    ///
    /// # Errors
    ///
    /// Returns an error if the verb fails.
    pub fn announce(&mut self, sdp: &str, challenge: Option<&str>) -> Result<RtspResponse> {
        if let Some(challenge) = challenge {
            self.session.add_header(raop::APPLE_CHALLENGE, challenge);
        }
        let request = self.session.announce_request(sdp);
        self.session.remove_header(raop::APPLE_CHALLENGE);

        self.execute(&request)
    }

    /// SETUP, returning the receiver's three ports
    ///
    /// # Errors
    ///
    /// Returns `RaopError::MissingTransportPort` if the reply lacks a port.
    pub fn setup(&mut self, control_port: u16, timing_port: u16) -> Result<RaopTransport> {
        let request = self.session.setup_request(control_port, timing_port);
        let response = self.execute(&request)?;

        let transport = response
            .headers
            .get(names::TRANSPORT)
            .ok_or(RaopError::MissingTransportPort("server_port"))?;
        RaopTransport::parse(transport)
    }

    /// RECORD, returning the receiver's `Audio-Latency` if reported
    ///
    /// # Errors
    ///
    /// Returns an error if the verb fails.
    pub fn record(&mut self, seq: u16, rtptime: u32) -> Result<Option<u32>> {
        let request = self.session.record_request(seq, rtptime);
        let response = self.execute(&request)?;
        Ok(response.audio_latency())
    }

    /// `SET_PARAMETER` with a text body
    ///
    /// # Errors
    ///
    /// Returns an error if the verb fails.
    pub fn set_parameter(&mut self, text: &str) -> Result<()> {
        let request = self.session.set_parameter_request(text);
        self.execute(&request).map(drop)
    }

    /// `SET_PARAMETER` with a DMAP body
    ///
    /// # Errors
    ///
    /// Returns an error if the verb fails.
    pub fn set_metadata(&mut self, dmap: Vec<u8>, rtptime: u32) -> Result<()> {
        let request = self.session.metadata_request(dmap, rtptime);
        self.execute(&request).map(drop)
    }

    /// FLUSH everything below `seq`/`rtptime`
    ///
    /// # Errors
    ///
    /// Returns an error if the verb fails.
    pub fn flush(&mut self, seq: u16, rtptime: u32) -> Result<()> {
        let request = self.session.flush_request(seq, rtptime);
        self.execute(&request).map(drop)
    }

    /// TEARDOWN (per-stream headers are dropped first)
    ///
    /// # Errors
    ///
    /// Returns an error if the verb fails.
    pub fn teardown(&mut self) -> Result<()> {
        self.session.clear_headers();
        let request = self.session.teardown_request();
        self.execute(&request).map(drop)
    }

    /// Non-blocking liveness probe
    ///
    /// Returns `false` once the receiver has closed its end, or when blocking
    /// mode cannot be restored afterwards.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        if self.stream.set_nonblocking(true).is_err() {
            return false;
        }
        let mut probe = [0u8; 1];
        let alive = match self.stream.peek(&mut probe) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) => e.kind() == io::ErrorKind::WouldBlock,
        };
        // A stream left nonblocking would turn every later verb into a timeout
        self.stream.set_nonblocking(false).is_ok() && alive
    }

    /// Close the TCP connection
    pub fn close(self) {
        debug!(addr = %self.peer_addr, "RTSP disconnect");
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl std::fmt::Debug for RtspClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtspClient")
            .field("peer_addr", &self.peer_addr)
            .field("local_addr", &self.local_addr)
            .field("cseq", &self.session.cseq())
            .finish_non_exhaustive()
    }
}
