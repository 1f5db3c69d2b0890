//! DAAP/DMAP metadata and progress bodies for RAOP `SET_PARAMETER`

mod dmap;
mod metadata;
mod progress;


pub use dmap::{DmapDecodeError, DmapEncoder, DmapParser, DmapTag, DmapValue};
pub use metadata::TrackMetadata;
pub use progress::DmapProgress;
