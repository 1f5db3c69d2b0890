//! # airplay-raop
//!
//! Client engine for streaming audio to `AirPlay` 1 (RAOP) receivers.
//!
//! ## Features
//!
//! - RTSP handshake: OPTIONS, ANNOUNCE, SETUP, RECORD, FLUSH, TEARDOWN
//! - Optional RSA/AES session encryption
//! - Paced RTP audio with a retransmission backlog
//! - Timing and control responders on their own threads
//! - Volume, progress and DMAP metadata
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! use airplay_raop::{RaopSession, SessionConfig};
//!
//! # fn example() -> Result<(), airplay_raop::RaopError> {
//! let session = RaopSession::new(SessionConfig::default())?;
//! session.connect(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)), 5000)?;
//!
//! // Encoded ALAC frames of 352 samples each
//! let frame = vec![0u8; 1408];
//! session.send_chunk(&frame, 352, false);
//!
//! session.disconnect()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Engine**: [`RaopSession`] and the [`DeviceController`] command thread
//! - **Transport**: [`net`] UDP channels and clocks
//! - **Protocol**: sans-IO RTP, SDP and DMAP formats plus the blocking RTSP client

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod net;
pub mod protocol;
pub mod raop;

// Re-exports
pub use error::{RaopError, Result};
pub use protocol::daap::TrackMetadata;
pub use raop::{
    AlacFrameEncoder, DeviceController, DeviceRequest, FrameEncoder, RaopSession, SentChunk,
    SessionState,
};
pub use types::{Codec, CryptoMode, FlushMode, SessionConfig, SessionConfigBuilder, StreamParameters};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::net::{Clock, ManualClock, SystemClock};
    pub use crate::{
        AlacFrameEncoder, Codec, CryptoMode, DeviceController, FlushMode, FrameEncoder,
        RaopError, RaopSession, SentChunk, SessionConfig, SessionState, TrackMetadata,
    };
}
