//! Shared-secret key material and its printable form.
//!
//! The key is carried between processes as base64 text (typically over the
//! bootstrap SSH channel), so the printable form is part of the external
//! interface.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::core::CryptoError;

/// Session key length in bytes (ChaCha20-Poly1305).
pub const KEY_SIZE: usize = 32;

/// A session key with a base64 text form.
///
/// Zeroized on drop.
#[derive(Clone)]
pub struct Base64Key {
    key: [u8; KEY_SIZE],
}

impl Base64Key {
    /// Generate a fresh random key from the OS entropy source.
    pub fn random() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Restore a key from its printable base64 form.
    pub fn from_printable(text: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD_NO_PAD
            .decode(text.trim_end_matches('='))
            .map_err(|_| CryptoError::KeyDecode)?;
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::KeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        Ok(Self { key })
    }

    /// The base64 text form, for handoff to the peer process.
    pub fn printable(&self) -> String {
        STANDARD_NO_PAD.encode(self.key)
    }

    /// Raw key bytes. Handle with care.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl Drop for Base64Key {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for Base64Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print key material
        f.write_str("Base64Key(..)")
    }
}
