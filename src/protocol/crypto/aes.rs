//! AES-128-CBC payload cipher for RAOP audio frames
//!
//! Every frame is chained from the session IV. A trailing partial block is
//! left in the clear.

use ::aes::Aes128;
use ::aes::cipher::generic_array::GenericArray;
use ::aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use zeroize::Zeroize;

use super::CryptoError;

/// AES block size
pub const BLOCK_SIZE: usize = 16;

/// Per-frame AES-128-CBC cipher
#[derive(Clone)]
pub struct FrameCipher {
    cipher: Aes128,
    iv: [u8; BLOCK_SIZE],
}

impl FrameCipher {
    /// Create a cipher from a 16-byte key and IV
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyLength` if either input is not 16 bytes
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != BLOCK_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: BLOCK_SIZE,
                actual: key.len(),
            });
        }
        let iv: [u8; BLOCK_SIZE] = iv.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: BLOCK_SIZE,
            actual: iv.len(),
        })?;

        Ok(Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
            iv,
        })
    }

    /// Encrypt the full blocks of `frame` in place
    pub fn encrypt_frame(&self, frame: &mut [u8]) {
        let mut chain = self.iv;

        for block in frame.chunks_exact_mut(BLOCK_SIZE) {
            block.iter_mut().zip(chain.iter()).for_each(|(b, c)| *b ^= c);
            self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
            chain.copy_from_slice(block);
        }
    }

    /// Decrypt the full blocks of `frame` in place
    pub fn decrypt_frame(&self, frame: &mut [u8]) {
        let mut chain = self.iv;

        for block in frame.chunks_exact_mut(BLOCK_SIZE) {
            let mut saved = [0u8; BLOCK_SIZE];
            saved.copy_from_slice(block);

            self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
            block.iter_mut().zip(chain.iter()).for_each(|(b, c)| *b ^= c);

            chain = saved;
        }
    }
}

impl std::fmt::Debug for FrameCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCipher").finish_non_exhaustive()
    }
}

impl Drop for FrameCipher {
    fn drop(&mut self) {
        self.iv.zeroize();
    }
}
