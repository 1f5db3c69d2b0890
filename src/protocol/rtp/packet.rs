use thiserror::Error;

/// Errors while decoding RAOP datagrams
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RtpDecodeError {
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    #[error("unexpected packet length: expected {expected} bytes, got {have}")]
    UnexpectedLength { expected: usize, have: usize },

    #[error("invalid RTP version: {0}")]
    InvalidVersion(u8),

    #[error("unexpected payload type: 0x{0:02X}")]
    UnexpectedPayloadType(u8),
}

/// Protocol byte shared by every RAOP datagram (V=2, no padding/extension/CSRC)
pub const RTP_VERSION_BYTE: u8 = 0x80;

/// Check the version bits of the first header byte
pub(crate) fn check_version(first: u8) -> Result<(), RtpDecodeError> {
    let version = first >> 6;
    if version == 2 {
        Ok(())
    } else {
        Err(RtpDecodeError::InvalidVersion(version))
    }
}
