//! Track metadata for RAOP

use super::dmap::{DmapEncoder, DmapParser, DmapTag, DmapValue};

/// Track metadata pushed to the receiver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    /// Track title
    pub title: Option<String>,
    /// Artist name
    pub artist: Option<String>,
    /// Album name
    pub album: Option<String>,
}

impl TrackMetadata {
    /// Create metadata from the three display strings
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            artist: Some(artist.into()),
            album: Some(album.into()),
        }
    }

    /// Encode as DMAP for `SET_PARAMETER`: one `mlit` holding `minm`, `asar`, `asal`
    #[must_use]
    pub fn encode_dmap(&self) -> Vec<u8> {
        let items = [
            (DmapTag::ItemName, &self.title),
            (DmapTag::SongArtist, &self.artist),
            (DmapTag::SongAlbum, &self.album),
        ]
        .into_iter()
        .filter_map(|(tag, value)| value.as_ref().map(|v| (tag, DmapValue::String(v.clone()))))
        .collect();

        let mut encoder = DmapEncoder::new();
        encoder.encode_tag(DmapTag::ListingItem, &DmapValue::Container(items));
        encoder.finish()
    }

    /// Decode a body produced by `encode_dmap`; unknown items are skipped
    #[must_use]
    pub fn from_dmap(data: &[u8]) -> Option<Self> {
        let DmapValue::Container(top) = DmapParser::parse(data).ok()? else {
            return None;
        };
        let (_, DmapValue::Container(items)) =
            top.iter().find(|(tag, _)| *tag == DmapTag::ListingItem)?
        else {
            return None;
        };

        let mut metadata = Self::default();
        for (tag, value) in items {
            let DmapValue::String(s) = value else {
                continue;
            };
            match tag {
                DmapTag::ItemName => metadata.title = Some(s.clone()),
                DmapTag::SongArtist => metadata.artist = Some(s.clone()),
                DmapTag::SongAlbum => metadata.album = Some(s.clone()),
                _ => {}
            }
        }
        Some(metadata)
    }
}
