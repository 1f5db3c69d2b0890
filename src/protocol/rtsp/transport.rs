//! RTSP Transport header handling for RAOP
//!
//! The client offers its control/timing ports in SETUP:
//! `RTP/AVP/UDP;unicast;interleaved=0-1;mode=record;control_port=6001;timing_port=6002`
//! and the receiver answers with its own `server_port`, `control_port` and
//! `timing_port`.

use crate::error::RaopError;

/// Build the client `Transport` header value for SETUP
#[must_use]
pub fn client_transport(control_port: u16, timing_port: u16) -> String {
    format!(
        "RTP/AVP/UDP;unicast;interleaved=0-1;mode=record;control_port={control_port};timing_port={timing_port}"
    )
}

/// Receiver ports negotiated by SETUP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaopTransport {
    /// Receiver audio data port
    pub server_port: u16,
    /// Receiver control port
    pub control_port: u16,
    /// Receiver timing port
    pub timing_port: u16,
}

impl RaopTransport {
    /// Parse the receiver's `Transport` header
    ///
    /// # Errors
    ///
    /// Returns `RaopError::MissingTransportPort` naming the first of the
    /// three ports that is absent, zero or unparsable.
    pub fn parse(value: &str) -> Result<Self, RaopError> {
        let port = |name: &'static str| -> Result<u16, RaopError> {
            value
                .split(';')
                .filter_map(|part| part.trim().split_once('='))
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .and_then(|(_, v)| v.trim().parse::<u16>().ok())
                .filter(|p| *p != 0)
                .ok_or(RaopError::MissingTransportPort(name))
        };

        Ok(Self {
            server_port: port("server_port")?,
            control_port: port("control_port")?,
            timing_port: port("timing_port")?,
        })
    }

    /// Format as a receiver would answer SETUP
    #[must_use]
    pub fn to_response_header(&self) -> String {
        format!(
            "RTP/AVP/UDP;unicast;mode=record;server_port={};control_port={};timing_port={}",
            self.server_port, self.control_port, self.timing_port
        )
    }
}
