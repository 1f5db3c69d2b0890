use std::io;
use thiserror::Error;

pub use crate::protocol::crypto::CryptoError;
use crate::protocol::rtp::RtpDecodeError;
use crate::protocol::rtsp::{Method, RtspCodecError};

/// Errors that can occur while driving a RAOP receiver
#[derive(Debug, Error)]
pub enum RaopError {
    // ===== Handshake Errors =====
    /// The receiver answered an RTSP verb with a non-success status
    #[error("RTSP {method:?} failed: {status_code} {reason}")]
    RtspStatus {
        /// The verb that failed
        method: Method,
        /// RTSP status code
        status_code: u16,
        /// Reason phrase sent by the receiver
        reason: String,
    },

    /// The response could not be parsed
    #[error("malformed RTSP response: {0}")]
    RtspCodec(#[from] RtspCodecError),

    /// The response carried a `CSeq` that does not match the request
    #[error("CSeq mismatch: expected {expected}, got {actual:?}")]
    CseqMismatch {
        /// `CSeq` of the request
        expected: u32,
        /// `CSeq` found in the response
        actual: Option<u32>,
    },

    /// SETUP response did not name all three RTP ports
    #[error("missing transport port in SETUP response: {0}")]
    MissingTransportPort(&'static str),

    /// The RTSP link is not open
    #[error("RTSP connection is not established")]
    NotConnected,

    /// The receiver closed the RTSP connection
    #[error("receiver closed the connection")]
    PeerClosed,

    /// A verb did not complete within its timeout
    #[error("{method:?} timed out")]
    Timeout {
        /// The verb that timed out
        method: Method,
    },

    // ===== Configuration Errors =====
    /// Requested codec is not supported by the engine
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Requested encryption scheme is not supported by the engine
    #[error("unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    /// Invalid stream parameter
    #[error("invalid parameter: {name} - {message}")]
    InvalidParameter {
        /// The name of the parameter
        name: &'static str,
        /// Description of the error
        message: String,
    },

    // ===== State Errors =====
    /// Operation not valid in current state
    #[error("invalid state for {operation}: {current_state}")]
    InvalidState {
        /// The rejected operation
        operation: &'static str,
        /// The current state
        current_state: String,
    },

    // ===== Lower Layers =====
    /// Key exchange or payload encryption failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// RTP packet could not be decoded
    #[error("RTP error: {0}")]
    Rtp(#[from] RtpDecodeError),

    /// Audio frame encoding failed
    #[error("encoder error: {0}")]
    Encoder(String),

    /// Network I/O error
    #[error("network error: {0}")]
    Network(#[from] io::Error),
}

impl RaopError {
    /// Check if this error is recoverable by retrying the operation
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Network(_) | Self::PeerClosed | Self::NotConnected
        )
    }

    /// Check if this error happened while negotiating with the receiver
    #[must_use]
    pub fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            Self::RtspStatus { .. }
                | Self::RtspCodec(_)
                | Self::CseqMismatch { .. }
                | Self::MissingTransportPort(_)
                | Self::Timeout { .. }
                | Self::PeerClosed
        )
    }
}

/// Result type alias for RAOP operations
pub type Result<T> = std::result::Result<T, RaopError>;
