use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use super::{Codec, CryptoMode, StreamParameters};

/// Configuration for one RAOP session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Local address the UDP sockets bind to (default: unspecified IPv4)
    pub local_addr: IpAddr,

    /// Codec announced to the receiver (default: ALAC)
    pub codec: Codec,

    /// Payload encryption (default: clear)
    pub crypto: CryptoMode,

    /// Sample rate in Hz (default: 44100)
    pub sample_rate: u32,

    /// Bits per sample (default: 16)
    pub sample_size: u8,

    /// Channel count (default: 2)
    pub channels: u8,

    /// Frames per RTP packet (default: 352)
    pub frames_per_packet: u32,

    /// Initial volume, 0-100 (default: 50)
    pub volume: u8,

    /// How far ahead of its playtime audio may be sent (default: 1 second)
    pub read_ahead: Duration,

    /// Timeout of each RTSP verb and of the TCP connect (default: 10 seconds)
    pub rtsp_timeout: Duration,

    /// Packets kept for retransmission (default: 512)
    pub backlog_size: usize,

    /// User-Agent sent on every RTSP request
    pub user_agent: String,

    /// Idle time after a flush before `DeviceController` disconnects
    /// (default: 120 seconds)
    pub teardown_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            codec: Codec::Alac,
            crypto: CryptoMode::Clear,
            sample_rate: 44100,
            sample_size: 16,
            channels: 2,
            frames_per_packet: 352,
            volume: 50,
            read_ahead: Duration::from_millis(1000),
            rtsp_timeout: Duration::from_secs(10),
            backlog_size: 512,
            user_agent: "iTunes/10.6.2 (Windows; N;)".to_string(),
            teardown_timeout: Duration::from_secs(120),
        }
    }
}

impl SessionConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Stream parameters described by this config
    #[must_use]
    pub fn stream_parameters(&self) -> StreamParameters {
        StreamParameters {
            codec: self.codec,
            crypto: self.crypto,
            sample_rate: self.sample_rate,
            sample_size: self.sample_size,
            channels: self.channels,
            frames_per_packet: self.frames_per_packet,
        }
    }

    /// Read-ahead in whole milliseconds
    #[must_use]
    pub fn read_ahead_ms(&self) -> u32 {
        u32::try_from(self.read_ahead.as_millis()).unwrap_or(u32::MAX)
    }
}

/// Builder for `SessionConfig`
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set local bind address
    #[must_use]
    pub fn local_addr(mut self, addr: IpAddr) -> Self {
        self.config.local_addr = addr;
        self
    }

    /// Set codec
    #[must_use]
    pub fn codec(mut self, codec: Codec) -> Self {
        self.config.codec = codec;
        self
    }

    /// Set payload encryption
    #[must_use]
    pub fn crypto(mut self, crypto: CryptoMode) -> Self {
        self.config.crypto = crypto;
        self
    }

    /// Set sample rate, sample size and channel count
    #[must_use]
    pub fn format(mut self, sample_rate: u32, sample_size: u8, channels: u8) -> Self {
        self.config.sample_rate = sample_rate;
        self.config.sample_size = sample_size;
        self.config.channels = channels;
        self
    }

    /// Set frames per RTP packet
    #[must_use]
    pub fn frames_per_packet(mut self, frames: u32) -> Self {
        self.config.frames_per_packet = frames;
        self
    }

    /// Set initial volume (clamped to 100)
    #[must_use]
    pub fn volume(mut self, volume: u8) -> Self {
        self.config.volume = volume.min(100);
        self
    }

    /// Set read-ahead
    #[must_use]
    pub fn read_ahead(mut self, read_ahead: Duration) -> Self {
        self.config.read_ahead = read_ahead;
        self
    }

    /// Set RTSP timeout
    #[must_use]
    pub fn rtsp_timeout(mut self, timeout: Duration) -> Self {
        self.config.rtsp_timeout = timeout;
        self
    }

    /// Set retransmit backlog size (at least 1)
    #[must_use]
    pub fn backlog_size(mut self, size: usize) -> Self {
        self.config.backlog_size = size.max(1);
        self
    }

    /// Set User-Agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Set idle teardown timeout for `DeviceController`
    #[must_use]
    pub fn teardown_timeout(mut self, timeout: Duration) -> Self {
        self.config.teardown_timeout = timeout;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> SessionConfig {
        self.config
    }
}
