//! AEAD session: seals and opens whole datagrams.
//!
//! Every datagram is `nonce (8 bytes, big-endian) || ciphertext`, where the
//! ciphertext carries a 16-byte Poly1305 tag. The 64-bit nonce is supplied by
//! the caller and must be unique per (key, direction); the cipher nonce is the
//! 64-bit value zero-extended to 96 bits.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};

use super::key::Base64Key;
use crate::core::{CryptoError, AEAD_TAG_SIZE, WIRE_NONCE_SIZE};

/// An AEAD context keyed by a shared secret.
pub struct Session {
    key: Base64Key,
    cipher: ChaCha20Poly1305,
}

impl Session {
    /// Largest datagram the receive path will accept, ciphertext included.
    pub const RECEIVE_MTU: usize = crate::core::RECEIVE_MTU;

    /// Build a session around the given key.
    pub fn new(key: Base64Key) -> Self {
        let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
        Self { key, cipher }
    }

    /// The key this session was built with.
    pub fn key(&self) -> &Base64Key {
        &self.key
    }

    /// Encrypt `plaintext` under `nonce`, producing a wire datagram.
    pub fn encrypt(&self, nonce: u64, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let sealed = self
            .cipher
            .encrypt(&cipher_nonce(nonce), plaintext)
            .map_err(|_| CryptoError::SealFailed)?;

        let mut datagram = Vec::with_capacity(WIRE_NONCE_SIZE + sealed.len());
        datagram.extend_from_slice(&nonce.to_be_bytes());
        datagram.extend_from_slice(&sealed);
        Ok(datagram)
    }

    /// Decrypt a wire datagram, recovering the nonce and plaintext.
    ///
    /// Fails closed: truncated input and tag mismatch are indistinguishable
    /// to the caller.
    pub fn decrypt(&self, datagram: &[u8]) -> Result<(u64, Vec<u8>), CryptoError> {
        if datagram.len() < WIRE_NONCE_SIZE + AEAD_TAG_SIZE {
            return Err(CryptoError::BadAuth);
        }

        let mut raw = [0u8; WIRE_NONCE_SIZE];
        raw.copy_from_slice(&datagram[..WIRE_NONCE_SIZE]);
        let nonce = u64::from_be_bytes(raw);

        let plaintext = self
            .cipher
            .decrypt(&cipher_nonce(nonce), &datagram[WIRE_NONCE_SIZE..])
            .map_err(|_| CryptoError::BadAuth)?;

        Ok((nonce, plaintext))
    }
}

fn cipher_nonce(nonce: u64) -> Nonce {
    let mut bytes = [0u8; 12];
    bytes[4..].copy_from_slice(&nonce.to_be_bytes());
    Nonce::from(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_pair() -> (Session, Session) {
        let key = Base64Key::random();
        (Session::new(key.clone()), Session::new(key))
    }

    #[test]
    fn seal_open_roundtrip() {
        let (alice, bob) = session_pair();

        let datagram = alice.encrypt(42, b"roam free").unwrap();
        let (nonce, plaintext) = bob.decrypt(&datagram).unwrap();

        assert_eq!(nonce, 42);
        assert_eq!(plaintext, b"roam free");
    }

    #[test]
    fn wrong_key_fails_closed() {
        let (alice, _) = session_pair();
        let eve = Session::new(Base64Key::random());

        let datagram = alice.encrypt(7, b"secret").unwrap();
        assert!(matches!(eve.decrypt(&datagram), Err(CryptoError::BadAuth)));
    }

    #[test]
    fn tampered_nonce_fails_closed() {
        let (alice, bob) = session_pair();

        let mut datagram = alice.encrypt(7, b"secret").unwrap();
        datagram[0] ^= 0x80;
        assert!(matches!(bob.decrypt(&datagram), Err(CryptoError::BadAuth)));
    }

    #[test]
    fn truncated_datagram_fails_closed() {
        let (alice, bob) = session_pair();

        let datagram = alice.encrypt(7, b"").unwrap();
        assert!(matches!(
            bob.decrypt(&datagram[..datagram.len() - 1]),
            Err(CryptoError::BadAuth)
        ));
        assert!(matches!(bob.decrypt(&[]), Err(CryptoError::BadAuth)));
    }

    #[test]
    fn empty_payload_is_sealed() {
        let (alice, bob) = session_pair();

        let datagram = alice.encrypt(0, b"").unwrap();
        let (nonce, plaintext) = bob.decrypt(&datagram).unwrap();
        assert_eq!(nonce, 0);
        assert!(plaintext.is_empty());
    }
}
