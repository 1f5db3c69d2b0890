//! Blocking mock RAOP receiver
//!
//! Answers every RTSP verb with 200, records the requests, and exposes the
//! receiver ends of the three UDP channels so tests can read audio, sync and
//! timing datagrams or send retransmit requests and timing probes.

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::protocol::rtp::{NtpTimestamp, RetransmitRequest, TimingProbe};
use crate::protocol::rtsp::headers::{names, raop};
use crate::protocol::rtsp::{Method, RtspRequest, RtspResponse, RtspServerCodec, StatusCode};

const POLL: Duration = Duration::from_millis(10);

/// Mock receiver behaviour
#[derive(Debug, Clone, Default)]
pub struct MockReceiverConfig {
    /// Leave this port out of the SETUP reply (`server_port`, `control_port` or `timing_port`)
    pub omit_port: Option<&'static str>,
    /// `Audio-Latency` returned by RECORD
    pub latency: Option<u32>,
    /// Answer this verb with 500
    pub fail_method: Option<Method>,
}

#[derive(Debug, Default)]
struct ReceiverState {
    requests: Vec<RtspRequest>,
    client_control: Option<SocketAddr>,
    client_timing: Option<SocketAddr>,
    connections: usize,
}

/// Mock RAOP receiver on 127.0.0.1
pub struct MockReceiver {
    rtsp_addr: SocketAddr,
    audio: UdpSocket,
    control: UdpSocket,
    timing: UdpSocket,
    state: Arc<Mutex<ReceiverState>>,
    running: Arc<AtomicBool>,
    drop_connection: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MockReceiver {
    /// Start a receiver with default behaviour
    pub fn start() -> io::Result<Self> {
        Self::with_config(MockReceiverConfig::default())
    }

    /// Start a receiver
    pub fn with_config(config: MockReceiverConfig) -> io::Result<Self> {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let listener = TcpListener::bind(SocketAddr::new(localhost, 0))?;
        listener.set_nonblocking(true)?;
        let rtsp_addr = listener.local_addr()?;

        let bind = || -> io::Result<UdpSocket> {
            let socket = UdpSocket::bind(SocketAddr::new(localhost, 0))?;
            socket.set_read_timeout(Some(Duration::from_millis(500)))?;
            Ok(socket)
        };
        let audio = bind()?;
        let control = bind()?;
        let timing = bind()?;

        let ports = Ports {
            server: audio.local_addr()?.port(),
            control: control.local_addr()?.port(),
            timing: timing.local_addr()?.port(),
        };

        let state = Arc::new(Mutex::new(ReceiverState::default()));
        let running = Arc::new(AtomicBool::new(true));
        let drop_connection = Arc::new(AtomicBool::new(false));

        let server = RtspServer {
            config,
            ports,
            state: Arc::clone(&state),
            running: Arc::clone(&running),
            drop_connection: Arc::clone(&drop_connection),
        };
        let thread = thread::Builder::new()
            .name("mock-receiver".to_string())
            .spawn(move || server.run(&listener))?;

        debug!(%rtsp_addr, "mock receiver listening");
        Ok(Self {
            rtsp_addr,
            audio,
            control,
            timing,
            state,
            running,
            drop_connection,
            thread: Some(thread),
        })
    }

    /// RTSP address
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.rtsp_addr
    }

    /// RTSP host
    #[must_use]
    pub fn ip(&self) -> IpAddr {
        self.rtsp_addr.ip()
    }

    /// RTSP port
    #[must_use]
    pub fn port(&self) -> u16 {
        self.rtsp_addr.port()
    }

    /// Every request received so far
    #[must_use]
    pub fn requests(&self) -> Vec<RtspRequest> {
        self.state.lock().requests.clone()
    }

    /// Methods received so far, in order
    #[must_use]
    pub fn methods(&self) -> Vec<Method> {
        self.state.lock().requests.iter().map(|r| r.method).collect()
    }

    /// Most recent request with `method`
    #[must_use]
    pub fn last_request(&self, method: Method) -> Option<RtspRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .rev()
            .find(|r| r.method == method)
            .cloned()
    }

    /// Wait until `count` requests with `method` have arrived
    #[must_use]
    pub fn wait_for(&self, method: Method, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let seen = self
                .state
                .lock()
                .requests
                .iter()
                .filter(|r| r.method == method)
                .count();
            if seen >= count {
                return true;
            }
            thread::sleep(POLL);
        }
        false
    }

    /// TCP connections accepted so far
    #[must_use]
    pub fn connections(&self) -> usize {
        self.state.lock().connections
    }

    /// Close the current RTSP connection from the receiver side
    pub fn close_connection(&self) {
        self.drop_connection.store(true, Ordering::SeqCst);
    }

    /// Next datagram on the audio port
    #[must_use]
    pub fn recv_audio(&self) -> Option<Vec<u8>> {
        recv(&self.audio)
    }

    /// Next datagram on the control port (sync packets and retransmissions)
    #[must_use]
    pub fn recv_control(&self) -> Option<Vec<u8>> {
        recv(&self.control)
    }

    /// Next datagram on the timing port
    #[must_use]
    pub fn recv_timing(&self) -> Option<Vec<u8>> {
        recv(&self.timing)
    }

    /// Ask the client to resend `count` packets from `seq_start`
    pub fn request_retransmit(&self, seq_start: u16, count: u16) -> io::Result<()> {
        let target = self
            .state
            .lock()
            .client_control
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no SETUP yet"))?;
        let request = RetransmitRequest::new(seq_start, count).encode();
        self.control.send_to(&request, target).map(drop)
    }

    /// Send a timing probe stamped `send_time`
    pub fn send_timing_probe(&self, sequence: u16, send_time: NtpTimestamp) -> io::Result<()> {
        let target = self
            .state
            .lock()
            .client_timing
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no SETUP yet"))?;
        let probe = TimingProbe::new(sequence, send_time).encode();
        self.timing.send_to(&probe, target).map(drop)
    }
}

impl Drop for MockReceiver {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl std::fmt::Debug for MockReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockReceiver")
            .field("rtsp_addr", &self.rtsp_addr)
            .finish_non_exhaustive()
    }
}

fn recv(socket: &UdpSocket) -> Option<Vec<u8>> {
    let mut buf = [0u8; 2048];
    socket.recv(&mut buf).ok().map(|n| buf[..n].to_vec())
}

#[derive(Debug, Clone, Copy)]
struct Ports {
    server: u16,
    control: u16,
    timing: u16,
}

struct RtspServer {
    config: MockReceiverConfig,
    ports: Ports,
    state: Arc<Mutex<ReceiverState>>,
    running: Arc<AtomicBool>,
    drop_connection: Arc<AtomicBool>,
}

impl RtspServer {
    fn run(&self, listener: &TcpListener) {
        while self.running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "mock receiver accepted");
                    self.state.lock().connections += 1;
                    if let Err(e) = self.serve(stream) {
                        debug!(error = %e, "mock connection ended");
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(POLL),
                Err(e) => {
                    warn!(error = %e, "mock accept failed");
                    thread::sleep(POLL);
                }
            }
        }
    }

    fn serve(&self, mut stream: TcpStream) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(POLL))?;
        let mut codec = RtspServerCodec::new();
        let mut buf = [0u8; 4096];

        loop {
            if !self.running.load(Ordering::SeqCst) || self.drop_connection.swap(false, Ordering::SeqCst)
            {
                return stream.shutdown(Shutdown::Both);
            }

            match stream.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => codec.feed(&buf[..n]),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => return Err(e),
            }

            while let Some(request) = codec
                .decode()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
            {
                let response = self.respond(&request, stream.peer_addr()?.ip());
                self.state.lock().requests.push(request);
                stream.write_all(&response.encode())?;
            }
        }
    }

    fn respond(&self, request: &RtspRequest, client: IpAddr) -> RtspResponse {
        let cseq = request.cseq().unwrap_or(0).to_string();
        if self.config.fail_method == Some(request.method) {
            return RtspResponse::new(StatusCode::INTERNAL_ERROR).with_header(names::CSEQ, cseq);
        }

        let response = RtspResponse::new(StatusCode::OK)
            .with_header(names::CSEQ, cseq)
            .with_header("Audio-Jack-Status", "connected; type=analog");

        match request.method {
            Method::Options => response.with_header(
                "Public",
                "ANNOUNCE, SETUP, RECORD, PAUSE, FLUSH, TEARDOWN, OPTIONS, GET_PARAMETER, SET_PARAMETER",
            ),
            Method::Setup => {
                if let Some(transport) = request.headers.get(names::TRANSPORT) {
                    let port = |name: &str| {
                        transport
                            .split(';')
                            .filter_map(|part| part.split_once('='))
                            .find(|(key, _)| *key == name)
                            .and_then(|(_, v)| v.parse::<u16>().ok())
                    };
                    let mut state = self.state.lock();
                    state.client_control = port("control_port").map(|p| SocketAddr::new(client, p));
                    state.client_timing = port("timing_port").map(|p| SocketAddr::new(client, p));
                }

                let transport = [
                    ("server_port", self.ports.server),
                    ("control_port", self.ports.control),
                    ("timing_port", self.ports.timing),
                ]
                .into_iter()
                .filter(|(name, _)| Some(*name) != self.config.omit_port)
                .fold(String::from("RTP/AVP/UDP;unicast;mode=record"), |mut acc, (name, port)| {
                    acc.push_str(&format!(";{name}={port}"));
                    acc
                });

                response
                    .with_header(names::TRANSPORT, transport)
                    .with_header(names::SESSION, "DEADBEEF")
            }
            Method::Record => match self.config.latency {
                Some(latency) => response.with_header(raop::AUDIO_LATENCY, latency.to_string()),
                None => response,
            },
            _ => response,
        }
    }
}
