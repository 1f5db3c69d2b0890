//! RTP/RAOP wire packets for AirPlay audio streaming

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

mod packet;
pub mod raop;
pub mod raop_timing;
mod timing;

#[cfg(test)]
mod tests;

pub use packet::{RTP_VERSION_BYTE, RtpDecodeError};
pub use raop::{
    RETRANSMIT_HEADER, RaopAudioPacket, RaopPayloadType, RetransmitRequest, SyncPacket,
    encode_retransmit,
};
pub use raop_timing::{TimingProbe, TimingReply};
pub use timing::NtpTimestamp;

/// RTP protocol constants for RAOP
pub mod constants {
    /// Audio frames per RTP packet (352 samples at 44.1kHz ≈ 8ms)
    pub const FRAMES_PER_PACKET: u32 = 352;

    /// Audio sample rate
    pub const SAMPLE_RATE: u32 = 44100;

    /// Audio channels (stereo)
    pub const CHANNELS: u8 = 2;

    /// Bits per sample
    pub const BITS_PER_SAMPLE: u8 = 16;

    /// Largest datagram the workers expect to receive
    pub const MAX_DATAGRAM: usize = 2048;
}
