//! Playback progress for RAOP

/// Playback progress in RTP timestamp units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmapProgress {
    /// RTP timestamp of track start
    pub start: u32,
    /// RTP timestamp of current position
    pub current: u32,
    /// RTP timestamp of track end
    pub end: u32,
}

impl DmapProgress {
    /// Create new progress
    #[must_use]
    pub fn new(start: u32, current: u32, end: u32) -> Self {
        Self {
            start,
            current,
            end,
        }
    }

    /// Encode as text/parameters body
    #[must_use]
    pub fn encode(&self) -> String {
        format!("progress: {}/{}/{}", self.start, self.current, self.end)
    }

    /// Parse from text/parameters body
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let line = text.lines().find(|l| l.starts_with("progress:"))?;
        let mut parts = line.strip_prefix("progress:")?.trim().split('/');

        let progress = Self {
            start: parts.next()?.trim().parse().ok()?,
            current: parts.next()?.trim().parse().ok()?,
            end: parts.next()?.trim().parse().ok()?,
        };
        parts.next().is_none().then_some(progress)
    }
}
