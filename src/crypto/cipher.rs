//! AES-256-GCM transport cipher used after the Noise handshake completes.
//!
//! Nonces are never random: the IV is `0^4 || counter` (big-endian,
//! 8-byte counter in the low bytes), incremented once per successful
//! operation. A decrypt that fails the AEAD tag is fatal — there is no
//! retry path, so a corrupted or re-ordered frame tears down the
//! session instead of being silently accepted or retried.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CipherError {
    #[error("invalid key")]
    InvalidKey,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed")]
    DecryptionFailed,
}

/// Counter-nonce AES-256-GCM cipher. One instance per direction
/// (send/recv) of a session.
pub struct Cipher {
    key: [u8; 32],
    nonce_counter: u64,
}

impl Cipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            key,
            nonce_counter: 0,
        }
    }

    pub fn encrypt(&mut self, plaintext: &[u8], ad: &[u8]) -> Result<Vec<u8>, CipherError> {
        let nonce = self.next_nonce();
        self.encrypt_with_nonce(plaintext, &nonce, ad)
    }

    pub fn encrypt_with_nonce(
        &self,
        plaintext: &[u8],
        nonce: &[u8; 12],
        ad: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CipherError::InvalidKey)?;
        let nonce = Nonce::from_slice(nonce);
        cipher
            .encrypt(
                nonce,
                aes_gcm::aead::Payload {
                    msg: plaintext,
                    aad: ad,
                },
            )
            .map_err(|_| CipherError::EncryptionFailed)
    }

    /// Decrypt and advance the counter. Fails closed: on a tag
    /// mismatch the counter has already been consumed and the caller
    /// must tear the session down rather than retry.
    pub fn decrypt(&mut self, ciphertext: &[u8], ad: &[u8]) -> Result<Vec<u8>, CipherError> {
        let nonce = self.next_nonce();
        self.decrypt_with_nonce(ciphertext, &nonce, ad)
    }

    pub fn decrypt_with_nonce(
        &self,
        ciphertext: &[u8],
        nonce: &[u8; 12],
        ad: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CipherError::InvalidKey)?;
        let nonce = Nonce::from_slice(nonce);
        cipher
            .decrypt(
                nonce,
                aes_gcm::aead::Payload {
                    msg: ciphertext,
                    aad: ad,
                },
            )
            .map_err(|_| CipherError::DecryptionFailed)
    }

    fn next_nonce(&mut self) -> [u8; 12] {
        let mut nonce = [0u8; 12];
        nonce[4..12].copy_from_slice(&self.nonce_counter.to_be_bytes());
        self.nonce_counter += 1;
        nonce
    }

    pub fn current_counter(&self) -> u64 {
        self.nonce_counter
    }

    pub fn reset_nonce(&mut self) {
        self.nonce_counter = 0;
    }

    pub fn set_nonce(&mut self, counter: u64) {
        self.nonce_counter = counter;
    }

    /// Logs a warning if `observed` skips ahead of the local counter
    /// by more than one. Does not itself reject anything — framing
    /// always trusts its own monotonic counter, this is purely a
    /// diagnostic for detecting dropped frames.
    pub fn check_gap(&self, observed: u64) {
        if observed > self.nonce_counter + 1 {
            log::warn!(
                "transport cipher counter gap: expected {}, observed {}",
                self.nonce_counter,
                observed
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = [0xab; 32];
        let mut cipher = Cipher::new(key);

        let plaintext = b"Hello, WhatsApp!";
        let ad = b"additional data";

        let ciphertext = cipher.encrypt(plaintext, ad).unwrap();
        cipher.reset_nonce();
        let decrypted = cipher.decrypt(&ciphertext, ad).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_wrong_ad_fails() {
        let key = [0xab; 32];
        let mut cipher = Cipher::new(key);

        let plaintext = b"Hello, WhatsApp!";
        let ciphertext = cipher.encrypt(plaintext, b"correct ad").unwrap();

        cipher.reset_nonce();
        let result = cipher.decrypt(&ciphertext, b"wrong ad");

        assert!(result.is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails_closed() {
        let key = [0xab; 32];
        let mut cipher = Cipher::new(key);
        let mut ciphertext = cipher.encrypt(b"payload", b"").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;

        cipher.reset_nonce();
        assert!(cipher.decrypt(&ciphertext, b"").is_err());
    }

    #[test]
    fn test_nonce_increments() {
        let key = [0xab; 32];
        let mut cipher = Cipher::new(key);

        let nonce1 = cipher.next_nonce();
        let nonce2 = cipher.next_nonce();

        assert_ne!(nonce1, nonce2);
    }
}
