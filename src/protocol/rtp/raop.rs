//! RAOP-specific RTP packet types

use super::packet::{RTP_VERSION_BYTE, RtpDecodeError, check_version};
use super::timing::NtpTimestamp;
use bytes::{BufMut, Bytes, BytesMut};

/// RAOP RTP payload types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RaopPayloadType {
    /// Timing request (receiver -> client)
    TimingRequest = 0x52,
    /// Timing response (client -> receiver)
    TimingResponse = 0x53,
    /// Sync packet (client -> receiver on control channel)
    Sync = 0x54,
    /// Retransmit request (receiver -> client on control channel)
    RetransmitRequest = 0x55,
    /// Retransmit response (client -> receiver, audio data)
    RetransmitResponse = 0x56,
    /// Audio data (realtime mode)
    AudioRealtime = 0x60,
}

impl RaopPayloadType {
    /// Parse from byte value, ignoring the marker bit
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x7F {
            0x52 => Some(Self::TimingRequest),
            0x53 => Some(Self::TimingResponse),
            0x54 => Some(Self::Sync),
            0x55 => Some(Self::RetransmitRequest),
            0x56 => Some(Self::RetransmitResponse),
            0x60 => Some(Self::AudioRealtime),
            _ => None,
        }
    }

    /// Byte value with the marker bit set
    #[must_use]
    pub fn with_marker(self) -> u8 {
        self as u8 | 0x80
    }
}

/// RAOP sync packet (sent on control channel)
///
/// Ties the RTP timeline to wall-clock time. `rtp_timestamp` already has the
/// receiver latency subtracted, `next_timestamp` is the current position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPacket {
    /// Extension flag (set on first sync after RECORD/FLUSH)
    pub extension: bool,
    /// Current RTP timestamp minus latency
    pub rtp_timestamp: u32,
    /// Current NTP time
    pub ntp_time: NtpTimestamp,
    /// Current RTP timestamp
    pub next_timestamp: u32,
}

impl SyncPacket {
    /// Sync packet size (4-byte header + 4 + 8 + 4)
    pub const SIZE: usize = 20;

    /// Create a sync packet for position `timestamp` with the given latency
    #[must_use]
    pub fn new(timestamp: u32, latency: u32, ntp_time: NtpTimestamp, is_first: bool) -> Self {
        Self {
            extension: is_first,
            rtp_timestamp: timestamp.wrapping_sub(latency),
            ntp_time,
            next_timestamp: timestamp,
        }
    }

    /// Encode to bytes
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];

        buf[0] = RTP_VERSION_BYTE | if self.extension { 0x10 } else { 0x00 };
        buf[1] = RaopPayloadType::Sync.with_marker();
        // Sequence number is fixed at 7
        buf[2..4].copy_from_slice(&0x0007u16.to_be_bytes());
        buf[4..8].copy_from_slice(&self.rtp_timestamp.to_be_bytes());
        buf[8..16].copy_from_slice(&self.ntp_time.encode());
        buf[16..20].copy_from_slice(&self.next_timestamp.to_be_bytes());

        buf
    }

    /// Decode from bytes
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` if buffer is too small
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        if buf.len() < Self::SIZE {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }
        check_version(buf[0])?;

        let extension = (buf[0] & 0x10) != 0;
        let rtp_timestamp = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let ntp_time = NtpTimestamp::decode(&buf[8..16]).unwrap_or_default();
        let next_timestamp = u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]);

        Ok(Self {
            extension,
            rtp_timestamp,
            ntp_time,
            next_timestamp,
        })
    }
}

/// Retransmit request packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetransmitRequest {
    /// First sequence number to retransmit
    pub seq_start: u16,
    /// Number of packets to retransmit
    pub count: u16,
}

impl RetransmitRequest {
    /// Packet size, header included
    pub const SIZE: usize = 8;

    /// Create a request for `count` packets starting at `seq_start`
    #[must_use]
    pub fn new(seq_start: u16, count: u16) -> Self {
        Self { seq_start, count }
    }

    /// Sequence numbers covered by this request, wrapping at 65536
    pub fn sequences(self) -> impl Iterator<Item = u16> {
        (0..self.count).map(move |i| self.seq_start.wrapping_add(i))
    }

    /// Encode the full datagram (as a receiver would send it)
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = RTP_VERSION_BYTE;
        buf[1] = RaopPayloadType::RetransmitRequest.with_marker();
        buf[2..4].copy_from_slice(&1u16.to_be_bytes());
        buf[4..6].copy_from_slice(&self.seq_start.to_be_bytes());
        buf[6..8].copy_from_slice(&self.count.to_be_bytes());
        buf
    }

    /// Decode a full datagram
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` unless the datagram is exactly 8 bytes
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        if buf.len() != Self::SIZE {
            return Err(RtpDecodeError::UnexpectedLength {
                expected: Self::SIZE,
                have: buf.len(),
            });
        }

        Ok(Self {
            seq_start: u16::from_be_bytes([buf[4], buf[5]]),
            count: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }
}

/// Header prepended to a stored audio packet when it is resent
pub const RETRANSMIT_HEADER: [u8; 4] = [RTP_VERSION_BYTE, 0xD6, 0x00, 0x01];

/// Wrap a stored audio packet for retransmission on the control channel
#[must_use]
pub fn encode_retransmit(stored: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RETRANSMIT_HEADER.len() + stored.len());
    buf.extend_from_slice(&RETRANSMIT_HEADER);
    buf.extend_from_slice(stored);
    buf
}

/// RAOP audio packet with header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaopAudioPacket {
    /// Marker bit (set on first packet after RECORD/FLUSH)
    pub marker: bool,
    /// Sequence number
    pub sequence: u16,
    /// RTP timestamp
    pub timestamp: u32,
    /// SSRC
    pub ssrc: u32,
    /// Audio payload (encrypted if the session uses RSA)
    pub payload: Bytes,
}

impl RaopAudioPacket {
    /// RTP header size
    pub const HEADER_SIZE: usize = 12;

    /// Create a new audio packet
    #[must_use]
    pub fn new(sequence: u16, timestamp: u32, ssrc: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            marker: false,
            sequence,
            timestamp,
            ssrc,
            payload: payload.into(),
        }
    }

    /// Set marker bit (first packet after RECORD/FLUSH)
    #[must_use]
    pub fn with_marker(mut self) -> Self {
        self.marker = true;
        self
    }

    /// Total encoded length
    #[must_use]
    pub fn len(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }

    /// Whether the packet carries no audio
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Encode to bytes
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());

        buf.put_u8(RTP_VERSION_BYTE);
        buf.put_u8(RaopPayloadType::AudioRealtime as u8 | if self.marker { 0x80 } else { 0x00 });
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        buf.put_slice(&self.payload);

        buf.freeze()
    }

    /// Decode from bytes
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` if buffer is too small or not an audio packet
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        if buf.len() < Self::HEADER_SIZE {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: Self::HEADER_SIZE,
                have: buf.len(),
            });
        }
        check_version(buf[0])?;
        if buf[1] & 0x7F != RaopPayloadType::AudioRealtime as u8 {
            return Err(RtpDecodeError::UnexpectedPayloadType(buf[1] & 0x7F));
        }

        Ok(Self {
            marker: (buf[1] & 0x80) != 0,
            sequence: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            payload: Bytes::copy_from_slice(&buf[Self::HEADER_SIZE..]),
        })
    }
}
