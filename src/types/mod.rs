//! Core types module

mod config;
mod stream;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use stream::{Codec, CryptoMode, FlushMode, StreamParameters};
