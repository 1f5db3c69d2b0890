//! RAOP ANNOUNCE body
//!
//! Only Apple Lossless is announced. The fmtp line carries the ALAC
//! "magic cookie" fields in order:
//! `frames compat bit_depth pb mb kb channels max_run max_frame avg_rate rate`.

use std::fmt;

use super::{SdpBuilder, SdpParseError};
use crate::error::RaopError;
use crate::protocol::crypto::RaopSessionKeys;
use crate::types::{Codec, CryptoMode, StreamParameters};

/// RTP payload type used for the audio stream
pub const PAYLOAD_TYPE: &str = "96";

/// ALAC format parameters carried in `a=fmtp`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlacFmtp {
    /// Frames per packet
    pub frames_per_packet: u32,
    /// Bits per sample
    pub bit_depth: u8,
    /// Number of channels
    pub channels: u8,
    /// Sample rate
    pub sample_rate: u32,
}

impl AlacFmtp {
    /// Rice history mult
    pub const PB: u8 = 40;
    /// Rice initial history
    pub const MB: u8 = 10;
    /// Rice limit
    pub const KB: u8 = 14;
    /// Max run
    pub const MAX_RUN: u16 = 255;

    /// Format parameters for a stream
    #[must_use]
    pub fn from_params(params: &StreamParameters) -> Self {
        Self {
            frames_per_packet: params.frames_per_packet,
            bit_depth: params.sample_size,
            channels: params.channels,
            sample_rate: params.sample_rate,
        }
    }

    /// Parse an fmtp value, with or without the leading payload type
    ///
    /// # Errors
    ///
    /// Returns `SdpParseError::InvalidFmtp` if a field is missing or not numeric.
    pub fn parse(fmtp: &str) -> Result<Self, SdpParseError> {
        let invalid = || SdpParseError::InvalidFmtp(fmtp.to_string());
        let parts: Vec<&str> = fmtp.split_whitespace().collect();
        let fields = match parts.len() {
            12 => &parts[1..],
            11 => &parts[..],
            _ => return Err(invalid()),
        };

        Ok(Self {
            frames_per_packet: fields[0].parse().map_err(|_| invalid())?,
            bit_depth: fields[2].parse().map_err(|_| invalid())?,
            channels: fields[6].parse().map_err(|_| invalid())?,
            sample_rate: fields[10].parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for AlacFmtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PAYLOAD_TYPE} {} 0 {} {} {} {} {} {} 0 0 {}",
            self.frames_per_packet,
            self.bit_depth,
            Self::PB,
            Self::MB,
            Self::KB,
            self.channels,
            Self::MAX_RUN,
            self.sample_rate
        )
    }
}

/// Create the RAOP ANNOUNCE SDP body
///
/// `sid` is the decimal session id, also used as the ANNOUNCE URI path.
/// With `CryptoMode::Rsa` the wrapped key and IV from `keys` are appended.
///
/// # Errors
///
/// Returns `RaopError::UnsupportedCodec`/`UnsupportedEncryption` for values
/// the engine cannot stream, or `InvalidParameter` when RSA is requested
/// without keys.
pub fn create_raop_announce_sdp(
    params: &StreamParameters,
    sid: &str,
    local_ip: &str,
    host_ip: &str,
    keys: Option<&RaopSessionKeys>,
) -> Result<String, RaopError> {
    params.validate()?;
    if params.codec != Codec::Alac {
        return Err(RaopError::UnsupportedCodec(params.codec.to_string()));
    }

    let rtpmap = format!("{PAYLOAD_TYPE} AppleLossless");
    let fmtp = AlacFmtp::from_params(params).to_string();

    let mut builder = SdpBuilder::new()
        .origin("iTunes", sid, "0", local_ip)
        .session_name("iTunes")
        .connection(host_ip)
        .timing(0, 0)
        .media("audio", 0, "RTP/AVP", &[PAYLOAD_TYPE])
        .media_attribute("rtpmap", Some(&rtpmap))
        .media_attribute("fmtp", Some(&fmtp));

    match params.crypto {
        CryptoMode::Clear => {}
        CryptoMode::Rsa => {
            let keys = keys.ok_or_else(|| RaopError::InvalidParameter {
                name: "keys",
                message: "RSA encryption requires session keys".to_string(),
            })?;
            builder = builder
                .media_attribute("rsaaeskey", Some(&keys.rsaaeskey()))
                .media_attribute("aesiv", Some(&keys.aesiv()));
        }
        other => return Err(RaopError::UnsupportedEncryption(other.to_string())),
    }

    Ok(builder.encode())
}
