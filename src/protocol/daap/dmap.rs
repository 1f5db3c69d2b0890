//! DMAP (Digital Media Access Protocol) encoding and decoding
//!
//! Every item is a 4-byte tag, a 4-byte big-endian length and the payload.

use std::fmt;

/// DMAP content codes (tags)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmapTag {
    /// Item name (track title)
    ItemName,
    /// Song artist
    SongArtist,
    /// Song album
    SongAlbum,
    /// Listing item container
    ListingItem,
    /// Unknown tag
    Unknown([u8; 4]),
}

impl DmapTag {
    /// Get 4-character code for tag
    #[must_use]
    pub fn code(&self) -> [u8; 4] {
        match self {
            Self::ItemName => *b"minm",
            Self::SongArtist => *b"asar",
            Self::SongAlbum => *b"asal",
            Self::ListingItem => *b"mlit",
            Self::Unknown(code) => *code,
        }
    }

    /// Create tag from bytes
    #[must_use]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        match &bytes {
            b"minm" => Self::ItemName,
            b"asar" => Self::SongArtist,
            b"asal" => Self::SongAlbum,
            b"mlit" => Self::ListingItem,
            _ => Self::Unknown(bytes),
        }
    }

    /// Check if this tag represents a container
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::ListingItem)
    }
}

impl fmt::Display for DmapTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.code();
        f.write_str(std::str::from_utf8(&code).unwrap_or("????"))
    }
}

/// DMAP value types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmapValue {
    /// String value (UTF-8)
    String(String),
    /// Container (nested DMAP)
    Container(Vec<(DmapTag, DmapValue)>),
    /// Raw bytes
    Raw(Vec<u8>),
}

/// DMAP encoder
#[derive(Debug, Default)]
pub struct DmapEncoder {
    buffer: Vec<u8>,
}

impl DmapEncoder {
    /// Create new encoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn put_item(&mut self, tag: DmapTag, payload: &[u8]) {
        // Payloads are metadata strings, far below 4 GiB
        #[allow(clippy::cast_possible_truncation)]
        let len = payload.len() as u32;
        self.buffer.extend_from_slice(&tag.code());
        self.buffer.extend_from_slice(&len.to_be_bytes());
        self.buffer.extend_from_slice(payload);
    }

    /// Encode a tag-value pair
    pub fn encode_tag(&mut self, tag: DmapTag, value: &DmapValue) {
        match value {
            DmapValue::String(s) => self.put_item(tag, s.as_bytes()),
            DmapValue::Raw(data) => self.put_item(tag, data),
            DmapValue::Container(items) => {
                let mut inner = DmapEncoder::new();
                for (inner_tag, inner_value) in items {
                    inner.encode_tag(*inner_tag, inner_value);
                }
                let inner_data = inner.finish();
                self.put_item(tag, &inner_data);
            }
        }
    }

    /// Add string tag
    pub fn string(&mut self, tag: DmapTag, value: &str) {
        self.put_item(tag, value.as_bytes());
    }

    /// Finish encoding and return bytes
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// DMAP parser
pub struct DmapParser;

impl DmapParser {
    /// Parse DMAP data into a structured value
    ///
    /// # Errors
    ///
    /// Returns `DmapDecodeError` if an item runs past the end of `data`.
    pub fn parse(data: &[u8]) -> Result<DmapValue, DmapDecodeError> {
        // Top level is implicitly a container of items
        Self::parse_container(data).map(DmapValue::Container)
    }

    fn parse_container(mut data: &[u8]) -> Result<Vec<(DmapTag, DmapValue)>, DmapDecodeError> {
        let mut items = Vec::new();

        while !data.is_empty() {
            let [t0, t1, t2, t3, l0, l1, l2, l3, rest @ ..] = data else {
                return Err(DmapDecodeError::UnexpectedEnd);
            };
            let len = u32::from_be_bytes([*l0, *l1, *l2, *l3]) as usize;
            if len > rest.len() {
                return Err(DmapDecodeError::UnexpectedEnd);
            }

            let (value_bytes, tail) = rest.split_at(len);
            data = tail;

            let tag = DmapTag::from_bytes([*t0, *t1, *t2, *t3]);
            let value = if tag.is_container() {
                DmapValue::Container(Self::parse_container(value_bytes)?)
            } else {
                match std::str::from_utf8(value_bytes) {
                    Ok(s) => DmapValue::String(s.to_string()),
                    Err(_) => DmapValue::Raw(value_bytes.to_vec()),
                }
            };

            items.push((tag, value));
        }

        Ok(items)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DmapDecodeError {
    #[error("unexpected end of data")]
    UnexpectedEnd,
}
