//! Cryptographic primitives for RAOP audio encryption

mod aes;
mod error;
mod keys;
mod rsa;

pub use self::aes::{BLOCK_SIZE, FrameCipher};
pub use self::error::CryptoError;
pub use self::keys::{AES_IV_SIZE, AES_KEY_SIZE, RaopSessionKeys};
pub use self::rsa::{AppleRsaPublicKey, sizes as rsa_sizes};
