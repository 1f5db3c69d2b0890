use std::fmt;

/// Session lifecycle state
///
/// Variants are ordered: every state from `Flushing` up has live RTP channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SessionState {
    /// No RTSP connection
    #[default]
    DownFull,
    /// The receiver closed the RTSP connection
    PeerDisconnect,
    /// Torn down, RTSP connection kept open for a reconnect
    Down,
    /// `FLUSH` in flight
    Flushing,
    /// Connected, waiting for the first packet
    Flushed,
    /// Audio flowing
    Streaming,
}

impl SessionState {
    /// Whether the RTP channels are open
    #[must_use]
    pub fn is_connected(self) -> bool {
        self >= Self::Flushing
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DownFull => "down (full)",
            Self::PeerDisconnect => "peer disconnected",
            Self::Down => "down",
            Self::Flushing => "flushing",
            Self::Flushed => "flushed",
            Self::Streaming => "streaming",
        };
        f.write_str(name)
    }
}
