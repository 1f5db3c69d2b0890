//! RSA key wrap for AirPlay 1 (RAOP) audio encryption

use base64::{Engine as _, engine::general_purpose::STANDARD};
use ::rsa::{BigUint, Oaep, RsaPublicKey};
use sha1::Sha1;

use super::CryptoError;

/// RSA key sizes used in RAOP
pub mod sizes {
    /// RSA modulus size (2048 bits)
    pub const MODULUS_BITS: usize = 2048;
    /// RSA modulus size in bytes
    pub const MODULUS_BYTES: usize = 256;
    /// Maximum plaintext size for OAEP (with SHA-1)
    pub const OAEP_MAX_PLAINTEXT: usize = MODULUS_BYTES - 2 * 20 - 2;
}

/// Apple's RSA public key used to wrap the RAOP session key
///
/// Well-known key shipped in every AirPort Express.
/// Modulus: 2048 bits, Exponent: 65537
pub struct AppleRsaPublicKey {
    inner: RsaPublicKey,
}

impl AppleRsaPublicKey {
    /// The Apple RSA public key modulus (base64, big-endian)
    const MODULUS_B64: &'static str = concat!(
        "59dE8qLieItsH1WgjrcFRKj6eUWqi+bGLOX1HL3U3GhC/j0Qg90u3sG/1CUtwC5vOYvfDmFI6oSFXi5ELabWJmT2dKHzBJKa3k9ok+8t9ucRqMd6DZHJ2YCCLlDRKSKv6kDqnw4UwPdpOMXziC/AMj3Z/lUVX1G7WSHCAWKf1zNS1eLvqr+boEjXuBOitnZ/bDzPHrTOZz0Dew0uowxf/+sG+NCK3eQJVxqcaJ/vEHKIVd2M+5qL71yJQ+87X6oV3eaYvt3zWZYD6z5vYTcrtij2VZ9Zmni/UAaHqn9JdsBWLUEpVviYnhimNVvYFZeCXg/IdTQ+x4IRdiXNv5hEew==",
    );

    /// Standard RSA exponent ("AQAB")
    const EXPONENT: u32 = 65537;

    /// Load the Apple public key
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidPublicKey` if the embedded key is rejected.
    pub fn load() -> Result<Self, CryptoError> {
        let modulus = STANDARD
            .decode(Self::MODULUS_B64)
            .map_err(|_| CryptoError::InvalidPublicKey)?;

        let n = BigUint::from_bytes_be(&modulus);
        let e = BigUint::from(Self::EXPONENT);

        let inner = RsaPublicKey::new(n, e).map_err(|_| CryptoError::InvalidPublicKey)?;

        Ok(Self { inner })
    }

    /// Wrap an arbitrary public key (receivers with their own key pair, tests)
    #[must_use]
    pub fn from_key(inner: RsaPublicKey) -> Self {
        Self { inner }
    }

    /// Encrypt data using RSA-OAEP with SHA-1
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::EncryptionFailed` if the plaintext is too long
    /// for the modulus or the RSA operation fails.
    pub fn encrypt_oaep(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        use ::rsa::traits::PublicKeyParts;

        let max = self.inner.size() - 2 * 20 - 2;
        if plaintext.len() > max {
            return Err(CryptoError::EncryptionFailed(format!(
                "plaintext too long: {} > {max}",
                plaintext.len(),
            )));
        }

        let padding = Oaep::new::<Sha1>();
        self.inner
            .encrypt(&mut rand::thread_rng(), padding, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }
}
