//! Session key generation for RAOP audio encryption

use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD as BASE64};
use rand::RngCore;
use zeroize::Zeroize;

use super::{AppleRsaPublicKey, CryptoError, FrameCipher};

/// AES key size (128 bits)
pub const AES_KEY_SIZE: usize = 16;
/// AES IV size (128 bits)
pub const AES_IV_SIZE: usize = 16;

/// Session keys for RAOP audio encryption
#[derive(Clone)]
pub struct RaopSessionKeys {
    aes_key: [u8; AES_KEY_SIZE],
    aes_iv: [u8; AES_IV_SIZE],
    /// RSA-encrypted AES key (for SDP)
    encrypted_key: Vec<u8>,
}

impl RaopSessionKeys {
    /// Generate new random session keys wrapped with Apple's public key
    ///
    /// # Errors
    ///
    /// Returns `CryptoError` if key generation or encryption fails.
    pub fn generate() -> Result<Self, CryptoError> {
        Self::generate_with(&AppleRsaPublicKey::load()?)
    }

    /// Generate new random session keys wrapped with `public_key`
    ///
    /// # Errors
    ///
    /// Returns `CryptoError` if the RSA wrap fails.
    pub fn generate_with(public_key: &AppleRsaPublicKey) -> Result<Self, CryptoError> {
        let mut aes_key = [0u8; AES_KEY_SIZE];
        let mut aes_iv = [0u8; AES_IV_SIZE];

        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut aes_key);
        rng.fill_bytes(&mut aes_iv);

        let encrypted_key = public_key.encrypt_oaep(&aes_key)?;

        Ok(Self {
            aes_key,
            aes_iv,
            encrypted_key,
        })
    }

    /// Get the AES key
    #[must_use]
    pub fn aes_key(&self) -> &[u8; AES_KEY_SIZE] {
        &self.aes_key
    }

    /// Get the AES IV
    #[must_use]
    pub fn aes_iv(&self) -> &[u8; AES_IV_SIZE] {
        &self.aes_iv
    }

    /// RSA-wrapped AES key
    #[must_use]
    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }

    /// Get RSA-encrypted AES key as Base64 for `rsaaeskey` SDP attribute
    #[must_use]
    pub fn rsaaeskey(&self) -> String {
        BASE64.encode(&self.encrypted_key)
    }

    /// Get AES IV as Base64 for `aesiv` SDP attribute
    #[must_use]
    pub fn aesiv(&self) -> String {
        BASE64.encode(self.aes_iv)
    }

    /// Payload cipher for these keys
    ///
    /// # Errors
    ///
    /// Never fails for generated keys; kept fallible to match `FrameCipher::new`.
    pub fn cipher(&self) -> Result<FrameCipher, CryptoError> {
        FrameCipher::new(&self.aes_key, &self.aes_iv)
    }
}

impl std::fmt::Debug for RaopSessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaopSessionKeys")
            .field("encrypted_key_len", &self.encrypted_key.len())
            .finish_non_exhaustive()
    }
}

impl Drop for RaopSessionKeys {
    fn drop(&mut self) {
        self.aes_key.zeroize();
        self.aes_iv.zeroize();
    }
}
