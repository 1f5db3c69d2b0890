//! RAOP timing protocol implementation
//!
//! The receiver probes the client; the client only answers.

use super::packet::{RtpDecodeError, check_version};
use super::raop::RaopPayloadType;
use super::timing::NtpTimestamp;

/// Timing probe sent by the receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingProbe {
    /// First four header bytes, echoed back in the reply
    pub header: [u8; 4],
    /// Receiver's reference time
    pub reference_time: NtpTimestamp,
    /// Receiver's receive time
    pub receive_time: NtpTimestamp,
    /// Time the receiver sent this probe
    pub send_time: NtpTimestamp,
}

impl TimingProbe {
    /// Packet size
    pub const SIZE: usize = 32;

    /// Build a probe as a receiver would (used by tests and the mock receiver)
    #[must_use]
    pub fn new(sequence: u16, send_time: NtpTimestamp) -> Self {
        let seq = sequence.to_be_bytes();
        Self {
            header: [0x80, RaopPayloadType::TimingRequest.with_marker(), seq[0], seq[1]],
            reference_time: NtpTimestamp::default(),
            receive_time: NtpTimestamp::default(),
            send_time,
        }
    }

    /// Encode to bytes
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.header);
        buf[8..16].copy_from_slice(&self.reference_time.encode());
        buf[16..24].copy_from_slice(&self.receive_time.encode());
        buf[24..32].copy_from_slice(&self.send_time.encode());
        buf
    }

    /// Decode a probe datagram
    ///
    /// # Errors
    ///
    /// Returns `RtpDecodeError` if the datagram is short, has a bad version,
    /// or is not a timing request
    pub fn decode(buf: &[u8]) -> Result<Self, RtpDecodeError> {
        if buf.len() < Self::SIZE {
            return Err(RtpDecodeError::BufferTooSmall {
                needed: Self::SIZE,
                have: buf.len(),
            });
        }
        check_version(buf[0])?;
        if RaopPayloadType::from_byte(buf[1]) != Some(RaopPayloadType::TimingRequest) {
            return Err(RtpDecodeError::UnexpectedPayloadType(buf[1] & 0x7F));
        }

        Ok(Self {
            header: [buf[0], buf[1], buf[2], buf[3]],
            reference_time: NtpTimestamp::decode(&buf[8..16]).unwrap_or_default(),
            receive_time: NtpTimestamp::decode(&buf[16..24]).unwrap_or_default(),
            send_time: NtpTimestamp::decode(&buf[24..32]).unwrap_or_default(),
        })
    }

    /// Build the reply stamped with `now`
    #[must_use]
    pub fn reply(&self, now: NtpTimestamp) -> TimingReply {
        let mut header = self.header;
        header[1] = RaopPayloadType::TimingResponse.with_marker();
        TimingReply {
            header,
            reference_time: self.send_time,
            receive_time: now,
            send_time: now,
        }
    }
}

/// Timing reply sent back to the receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingReply {
    /// Probe header with the payload type switched to 0xD3
    pub header: [u8; 4],
    /// Probe's send time
    pub reference_time: NtpTimestamp,
    /// Time the probe was received
    pub receive_time: NtpTimestamp,
    /// Time this reply was sent
    pub send_time: NtpTimestamp,
}

impl TimingReply {
    /// Packet size
    pub const SIZE: usize = 32;

    /// Encode to bytes
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.header);
        buf[8..16].copy_from_slice(&self.reference_time.encode());
        buf[16..24].copy_from_slice(&self.receive_time.encode());
        buf[24..32].copy_from_slice(&self.send_time.encode());
        buf
    }

    /// Decode a reply datagram
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

        Ok(Self {
            header: [buf[0], buf[1], buf[2], buf[3]],
            reference_time: NtpTimestamp::decode(&buf[8..16]).unwrap_or_default(),
            receive_time: NtpTimestamp::decode(&buf[16..24]).unwrap_or_default(),
            send_time: NtpTimestamp::decode(&buf[24..32]).unwrap_or_default(),
        })
    }

    /// Round-trip estimate from the receiver's point of view (microseconds)
    #[must_use]
    pub fn round_trip_micros(&self, receiver_now: NtpTimestamp) -> i64 {
        let t1 = self.reference_time.to_micros() as i64;
        let t2 = self.receive_time.to_micros() as i64;
        let t3 = self.send_time.to_micros() as i64;
        let t4 = receiver_now.to_micros() as i64;
        (t4 - t1) - (t3 - t2)
    }
}
