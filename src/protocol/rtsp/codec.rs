use super::{Headers, RtspResponse, StatusCode};
use thiserror::Error;

/// Errors during RTSP response parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RtspCodecError {
    #[error("invalid status line: {0}")]
    InvalidStatusLine(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid content length: {0}")]
    InvalidContentLength(String),

    #[error("response too large: {size} bytes")]
    ResponseTooLarge { size: usize },
}

/// Sans-IO RTSP codec for parsing responses
///
/// Feed bytes with `feed()`, pull complete responses with `decode()`.
/// The blocking client owns the socket and drives this codec.
pub struct RtspCodec {
    buffer: Vec<u8>,
    max_size: usize,
    state: ParseState,
}

#[derive(Debug, Clone)]
enum ParseState {
    /// Waiting for the status line and header block
    Head,
    /// Header block parsed, waiting for the body
    Body {
        response: RtspResponse,
        content_length: usize,
    },
}

impl RtspCodec {
    /// Create a new codec
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_size: 64 * 1024,
            state: ParseState::Head,
        }
    }

    /// Set maximum buffered response size
    #[must_use]
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Feed bytes into the codec
    ///
    /// # Errors
    /// Returns `RtspCodecError::ResponseTooLarge` if the buffer exceeds `max_size`.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), RtspCodecError> {
        let size = self.buffer.len() + bytes.len();
        if size > self.max_size {
            return Err(RtspCodecError::ResponseTooLarge { size });
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Try to decode a complete response
    ///
    /// Returns `Ok(Some(response))` if a complete response is available,
    /// `Ok(None)` if more data is needed.
    ///
    /// # Errors
    /// Returns `RtspCodecError` if the response is malformed.
    pub fn decode(&mut self) -> Result<Option<RtspResponse>, RtspCodecError> {
        if let ParseState::Head = self.state {
            let Some(head_end) = find(&self.buffer, b"\r\n\r\n") else {
                return Ok(None);
            };

            let head = String::from_utf8_lossy(&self.buffer[..head_end]).into_owned();
            self.buffer.drain(..head_end + 4);

            let mut lines = head.split("\r\n");
            let (version, status, reason) = Self::parse_status_line(lines.next().unwrap_or(""))?;

            let mut headers = Headers::new();
            for line in lines.filter(|l| !l.is_empty()) {
                let (name, value) = line
                    .split_once(':')
                    .ok_or_else(|| RtspCodecError::InvalidHeader(line.to_string()))?;
                headers.insert(name.trim(), value.trim());
            }

            let content_length = match headers.get(super::headers::names::CONTENT_LENGTH) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| RtspCodecError::InvalidContentLength(raw.to_string()))?,
                None => 0,
            };

            self.state = ParseState::Body {
                response: RtspResponse {
                    version,
                    status,
                    reason,
                    headers,
                    body: Vec::new(),
                },
                content_length,
            };
        }

        let ParseState::Body { content_length, .. } = &self.state else {
            return Ok(None);
        };
        if self.buffer.len() < *content_length {
            return Ok(None);
        }

        let ParseState::Body {
            mut response,
            content_length,
        } = std::mem::replace(&mut self.state, ParseState::Head)
        else {
            return Ok(None);
        };
        response.body = self.buffer.drain(..content_length).collect();

        Ok(Some(response))
    }

    /// Clear the codec buffer and reset state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = ParseState::Head;
    }

    /// Get current buffer length
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn parse_status_line(line: &str) -> Result<(String, StatusCode, String), RtspCodecError> {
        // Format: "RTSP/1.0 200 OK"
        let invalid = || RtspCodecError::InvalidStatusLine(line.to_string());
        let mut parts = line.splitn(3, ' ');

        let version = parts.next().filter(|v| v.starts_with("RTSP/")).ok_or_else(invalid)?;
        let status = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(invalid)?;
        let reason = parts.next().unwrap_or("");

        Ok((version.to_string(), StatusCode(status), reason.to_string()))
    }
}

impl Default for RtspCodec {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
