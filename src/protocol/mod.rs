//! Protocol module
//!
//! Sans-IO wire formats plus the blocking RTSP client.

pub mod crypto;
pub mod daap;
pub mod rtp;
pub mod rtsp;
pub mod sdp;
