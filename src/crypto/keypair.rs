//! Cryptographic key pair utilities for WhatsApp protocol.
//!
//! Provides Curve25519 key pair generation and management for Signal Protocol.

use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

/// A Curve25519 key pair for Signal Protocol operations.
#[derive(Clone)]
pub struct KeyPair {
    /// Public key (32 bytes)
    pub public: [u8; 32],
    /// Private key (32 bytes) 
    pub private: [u8; 32],
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut private = [0u8; 32];
        rng.fill_bytes(&mut private);
        
        // Apply clamping as per Curve25519 spec
        private[0] &= 248;
        private[31] &= 127;
        private[31] |= 64;
        
        Self::from_private_key(private)
    }

    /// Create a key pair from an existing private key.
    pub fn from_private_key(private: [u8; 32]) -> Self {
        let secret = StaticSecret::from(private);
        let public = PublicKey::from(&secret);
        
        Self {
            public: *public.as_bytes(),
            private,
        }
    }

    /// Get the public key as bytes.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public
    }

    /// Get the private key as bytes.
    pub fn private_key(&self) -> &[u8; 32] {
        &self.private
    }

    /// Perform X25519 Diffie-Hellman key agreement.
    pub fn dh(&self, their_public: &[u8; 32]) -> [u8; 32] {
        let secret = StaticSecret::from(self.private);
        let their_key = x25519_dalek::PublicKey::from(*their_public);
        let shared = secret.diffie_hellman(&their_key);
        *shared.as_bytes()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// A pre-key for Signal Protocol.
#[derive(Clone)]
pub struct PreKey {
    /// The key pair
    pub key_pair: KeyPair,
    /// Key ID
    pub key_id: u32,
    /// Signature (if signed pre-key)
    pub signature: Option<[u8; 64]>,
}

impl PreKey {
    /// Generate a new pre-key with the given ID.
    pub fn new(key_id: u32) -> Self {
        Self {
            key_pair: KeyPair::generate(),
            key_id,
            signature: None,
        }
    }

    /// Generate a signed pre-key.
    pub fn new_signed(key_id: u32, identity_key: &KeyPair) -> Self {
        let mut pre_key = Self::new(key_id);
        pre_key.signature = Some(identity_key.sign(&pre_key.key_pair));
        pre_key
    }
}

impl KeyPair {
    /// Derive this key pair's Ed25519 verifying key. Used as the
    /// publicly-advertised counterpart to `sign_message`/`sign` — it
    /// is a different quantity from `public` (the X25519 DH key), the
    /// same way WhatsApp's account signature key is distinct from the
    /// identity key used for key agreement.
    pub fn signing_public(&self) -> [u8; 32] {
        use ed25519_dalek::SigningKey;
        SigningKey::from_bytes(&self.private).verifying_key().to_bytes()
    }

    /// Sign an arbitrary message with this key pair's derived Ed25519
    /// signing key.
    pub fn sign_message(&self, message: &[u8]) -> [u8; 64] {
        use ed25519_dalek::{Signer, SigningKey};
        SigningKey::from_bytes(&self.private).sign(message).to_bytes()
    }

    /// Sign another key pair's public key, DJB-type-prefixed as the
    /// pre-key signing convention expects.
    pub fn sign(&self, key_to_sign: &KeyPair) -> [u8; 64] {
        let mut message = [0u8; 33];
        message[0] = 0x05;
        message[1..].copy_from_slice(&key_to_sign.public);
        self.sign_message(&message)
    }
}

/// Verify a signature produced by `KeyPair::sign_message`/`sign`
/// against the signer's `signing_public()` key.
pub fn verify_message(signing_public: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    let verifying_key = match VerifyingKey::from_bytes(signing_public) {
        Ok(vk) => vk,
        Err(_) => return false,
    };
    let signature = Signature::from_bytes(signature);
    verifying_key.verify(message, &signature).is_ok()
}

/// Verify a pre-key signature produced by `KeyPair::sign`.
pub fn verify_pre_key_signature(
    identity_signing_public: &[u8; 32],
    pre_key_public: &[u8; 32],
    signature: &[u8; 64],
) -> bool {
    let mut message = [0u8; 33];
    message[0] = 0x05;
    message[1..].copy_from_slice(pre_key_public);
    verify_message(identity_signing_public, &message, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pair_generation() {
        let kp = KeyPair::generate();
        assert_ne!(kp.public, [0u8; 32]);
        assert_ne!(kp.private, [0u8; 32]);
    }

    #[test]
    fn test_dh_agreement() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        
        let alice_shared = alice.dh(&bob.public);
        let bob_shared = bob.dh(&alice.public);
        
        assert_eq!(alice_shared, bob_shared);
    }

    #[test]
    fn test_pre_key_generation() {
        let pk = PreKey::new(1);
        assert_eq!(pk.key_id, 1);
        assert!(pk.signature.is_none());
    }

    #[test]
    fn test_sign_and_verify_pre_key() {
        let identity = KeyPair::generate();
        let pre_key = PreKey::new_signed(1, &identity);
        let signature = pre_key.signature.unwrap();

        assert!(verify_pre_key_signature(
            &identity.signing_public(),
            &pre_key.key_pair.public,
            &signature,
        ));
    }

    #[test]
    fn test_tampered_pre_key_signature_rejected() {
        let identity = KeyPair::generate();
        let pre_key = PreKey::new_signed(1, &identity);
        let mut signature = pre_key.signature.unwrap();
        signature[0] ^= 0x01;

        assert!(!verify_pre_key_signature(
            &identity.signing_public(),
            &pre_key.key_pair.public,
            &signature,
        ));
    }
}
