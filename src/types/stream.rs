use std::fmt;

use crate::error::RaopError;

/// Audio codec carried in the RTP payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Raw 16-bit PCM
    Pcm,
    /// Apple Lossless
    Alac,
    /// AAC-LC
    Aac,
    /// AAC-ELD
    AacEld,
}

impl Codec {
    /// Whether the engine can announce this codec
    #[must_use]
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Alac)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pcm => "PCM",
            Self::Alac => "ALAC",
            Self::Aac => "AAC",
            Self::AacEld => "AAC-ELD",
        };
        f.write_str(name)
    }
}

/// Payload encryption scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptoMode {
    /// No encryption
    Clear,
    /// AES-128-CBC with an RSA-wrapped key
    Rsa,
    /// FairPlay
    FairPlay,
    /// MFi SAP
    MfiSap,
    /// FairPlay SAP
    FairPlaySap,
}

impl CryptoMode {
    /// Whether the engine can announce this scheme
    #[must_use]
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Clear | Self::Rsa)
    }
}

impl fmt::Display for CryptoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Clear => "clear",
            Self::Rsa => "RSA",
            Self::FairPlay => "FairPlay",
            Self::MfiSap => "MFi-SAP",
            Self::FairPlaySap => "FairPlay SAP",
        };
        f.write_str(name)
    }
}

/// How the clock is re-anchored when streaming resumes after a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushMode {
    /// Keep the current anchor
    Flush,
    /// Anchor the current position to the local time of the next packet
    #[default]
    Reclock,
    /// Keep local time, restart the timeline at the current position
    Rebuffer,
}

/// Negotiated stream parameters, fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParameters {
    /// Codec
    pub codec: Codec,
    /// Encryption scheme
    pub crypto: CryptoMode,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bits per sample
    pub sample_size: u8,
    /// Channel count
    pub channels: u8,
    /// Frames per RTP packet
    pub frames_per_packet: u32,
}

impl Default for StreamParameters {
    fn default() -> Self {
        Self {
            codec: Codec::Alac,
            crypto: CryptoMode::Clear,
            sample_rate: 44100,
            sample_size: 16,
            channels: 2,
            frames_per_packet: 352,
        }
    }
}

impl StreamParameters {
    /// Check that the parameters can be announced
    ///
    /// # Errors
    ///
    /// Returns `RaopError::UnsupportedCodec`, `RaopError::UnsupportedEncryption`
    /// or `RaopError::InvalidParameter`.
    pub fn validate(&self) -> Result<(), RaopError> {
        if !self.codec.is_supported() {
            return Err(RaopError::UnsupportedCodec(self.codec.to_string()));
        }
        if !self.crypto.is_supported() {
            return Err(RaopError::UnsupportedEncryption(self.crypto.to_string()));
        }
        if self.sample_rate == 0 {
            return Err(RaopError::InvalidParameter {
                name: "sample_rate",
                message: "must be non-zero".to_string(),
            });
        }
        if self.channels == 0 {
            return Err(RaopError::InvalidParameter {
                name: "channels",
                message: "must be non-zero".to_string(),
            });
        }
        if self.frames_per_packet == 0 {
            return Err(RaopError::InvalidParameter {
                name: "frames_per_packet",
                message: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Bytes in one frame of interleaved PCM
    #[must_use]
    pub fn bytes_per_frame(&self) -> usize {
        usize::from(self.channels) * usize::from(self.sample_size).div_ceil(8)
    }
}
