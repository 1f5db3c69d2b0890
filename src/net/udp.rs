use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::time::Duration;

/// Bounded wait the audio path allows for a socket to accept a datagram
pub const AUDIO_WRITE_TIMEOUT: Duration = Duration::from_millis(20);

/// Read timeout of the background workers, so they observe a stop within a second
pub const WORKER_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// One bound RTP UDP socket
#[derive(Debug)]
pub struct UdpChannel {
    socket: UdpSocket,
    local_port: u16,
}

impl UdpChannel {
    /// Bind to `local_addr` on an ephemeral port
    ///
    /// # Errors
    ///
    /// Returns the bind error.
    pub fn bind(local_addr: IpAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::new(local_addr, 0))?;
        let local_port = socket.local_addr()?.port();
        Ok(Self { socket, local_port })
    }

    /// Bind a channel for a background worker (1 s read timeout)
    ///
    /// # Errors
    ///
    /// Returns the bind or socket option error.
    pub fn bind_worker(local_addr: IpAddr) -> io::Result<Self> {
        let channel = Self::bind(local_addr)?;
        channel.socket.set_read_timeout(Some(WORKER_READ_TIMEOUT))?;
        Ok(channel)
    }

    /// Bind a channel for the audio path (20 ms write timeout)
    ///
    /// # Errors
    ///
    /// Returns the bind or socket option error.
    pub fn bind_audio(local_addr: IpAddr) -> io::Result<Self> {
        let channel = Self::bind(local_addr)?;
        channel.socket.set_write_timeout(Some(AUDIO_WRITE_TIMEOUT))?;
        Ok(channel)
    }

    /// Local port advertised to the receiver
    #[must_use]
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Underlying socket
    #[must_use]
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    /// Send one datagram
    ///
    /// # Errors
    ///
    /// Returns the socket error, `WouldBlock`/`TimedOut` when the write timeout expires.
    pub fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, target)
    }

    /// Receive one datagram
    ///
    /// # Errors
    ///
    /// Returns the socket error, `WouldBlock`/`TimedOut` when the read timeout expires.
    pub fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf)
    }
}

/// Whether an I/O error is just an expired socket timeout
#[must_use]
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
