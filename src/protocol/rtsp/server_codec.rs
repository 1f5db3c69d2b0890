//! Server-side RTSP codec for parsing requests
//!
//! Used by the mock receiver in `testing` to read what the client sends.

use bytes::{Buf, BytesMut};
use std::str;

use super::codec::find;
use super::{Headers, Method, RtspRequest};

/// Errors during RTSP request parsing
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid request line: {0}")]
    InvalidRequestLine(String),

    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    #[error("Invalid UTF-8 in headers")]
    InvalidUtf8,
}

/// Server-side RTSP codec
pub struct RtspServerCodec {
    buffer: BytesMut,
}

impl RtspServerCodec {
    /// Create a new server codec
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Feed bytes into the internal buffer
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempt to decode a complete RTSP request
    ///
    /// # Errors
    /// Returns `ParseError` if the request is malformed.
    pub fn decode(&mut self) -> Result<Option<RtspRequest>, ParseError> {
        let Some(header_end) = find(&self.buffer, b"\r\n\r\n") else {
            return Ok(None);
        };

        let header_str =
            str::from_utf8(&self.buffer[..header_end]).map_err(|_| ParseError::InvalidUtf8)?;
        let (method, uri, headers) = Self::parse_head(header_str)?;

        let content_length = match headers.get(super::headers::names::CONTENT_LENGTH) {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength(raw.to_string()))?,
            None => 0,
        };

        if self.buffer.len() < header_end + 4 + content_length {
            return Ok(None);
        }

        self.buffer.advance(header_end + 4);
        let body = self.buffer.split_to(content_length).to_vec();

        Ok(Some(RtspRequest {
            method,
            uri,
            headers,
            body,
        }))
    }

    fn parse_head(head: &str) -> Result<(Method, String, Headers), ParseError> {
        let mut lines = head.split("\r\n");

        // "METHOD uri RTSP/1.0"
        let request_line = lines.next().unwrap_or("");
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 || !parts[2].starts_with("RTSP/") {
            return Err(ParseError::InvalidRequestLine(request_line.to_string()));
        }

        let method: Method = parts[0]
            .parse()
            .map_err(|()| ParseError::InvalidMethod(parts[0].to_string()))?;

        let mut headers = Headers::new();
        for line in lines.filter(|l| !l.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))?;
            headers.insert(name.trim(), value.trim());
        }

        Ok((method, parts[1].to_string(), headers))
    }
}

impl Default for RtspServerCodec {
    fn default() -> Self {
        Self::new()
    }
}
