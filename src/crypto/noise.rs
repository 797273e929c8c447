//! Noise_XX_25519_AESGCM_SHA256 handshake state machine.
//!
//! The client is always the initiator: it sends `-> e`, receives
//! `<- e, ee, s, es`, and sends `-> s, se`. The second mix (`es`) uses
//! the initiator's ephemeral private key against the responder's
//! static public key — see `DESIGN.md` resolution 1 for why this is
//! kept rather than "fixed" to use the static key.

use crate::crypto::{Cipher, Hkdf, KeyPair};
pub use crate::error::HandshakeError;
use sha2::{Digest, Sha256};

pub const NOISE_PROTOCOL_NAME: &[u8] = b"Noise_XX_25519_AESGCM_SHA256\0\0\0\0";

pub struct NoiseHandshake {
    local_static: KeyPair,
    local_ephemeral: Option<KeyPair>,
    remote_static: Option<[u8; 32]>,
    remote_ephemeral: Option<[u8; 32]>,
    chaining_key: [u8; 32],
    hash: [u8; 32],
    cipher: Option<Cipher>,
}

impl NoiseHandshake {
    /// Start a new handshake as initiator. `prologue` is the
    /// unencrypted wire prologue (`"WA" || version || dialect`) mixed
    /// into the hash before any handshake messages are sent.
    pub fn start(local_static: KeyPair, prologue: &[u8]) -> Self {
        let mut hs = Self {
            local_static,
            local_ephemeral: None,
            remote_static: None,
            remote_ephemeral: None,
            chaining_key: [0u8; 32],
            hash: [0u8; 32],
            cipher: None,
        };
        hs.initialize(prologue);
        hs
    }

    fn initialize(&mut self, prologue: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(NOISE_PROTOCOL_NAME);
        self.hash = hasher.finalize().into();
        self.chaining_key = self.hash;

        self.mix_hash(prologue);
        self.local_ephemeral = Some(KeyPair::generate());
    }

    pub fn update_hash(&mut self, data: &[u8]) {
        self.mix_hash(data);
    }

    fn mix_hash(&mut self, data: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(self.hash);
        hasher.update(data);
        self.hash = hasher.finalize().into();
    }

    /// `mixIntoKey`: HKDF the chaining key forward with `input` as the
    /// new keying material, install the result as the current cipher
    /// key, and return it.
    pub fn mix_into_key(&mut self, input: &[u8]) -> [u8; 32] {
        let derived = Hkdf::derive(Some(&self.chaining_key), input, b"", 64);
        self.chaining_key.copy_from_slice(&derived[0..32]);
        let mut key = [0u8; 32];
        key.copy_from_slice(&derived[32..64]);
        self.cipher = Some(Cipher::new(key));
        key
    }

    /// `cypher`/encrypt-and-hash: AEAD-encrypt under the current
    /// cipher keyed by the rolling hash as associated data, then mix
    /// the ciphertext into the hash.
    fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let hash = self.hash;
        let cipher = self
            .cipher
            .as_mut()
            .ok_or(HandshakeError::UnexpectedState("no cipher"))?;
        let ciphertext = cipher
            .encrypt(plaintext, &hash)
            .map_err(|_| HandshakeError::EncryptionFailed)?;
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    /// `cypher`/decrypt-and-hash: fails closed on an AEAD tag
    /// mismatch, there is no retry.
    fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let hash = self.hash;
        let cipher = self
            .cipher
            .as_mut()
            .ok_or(HandshakeError::UnexpectedState("no cipher"))?;
        let plaintext = cipher
            .decrypt(ciphertext, &hash)
            .map_err(|_| HandshakeError::DecryptionFailed)?;
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    /// Write the first handshake message (`-> e`).
    pub fn write_message_1(&mut self) -> Vec<u8> {
        let ephemeral_public = self
            .local_ephemeral
            .as_ref()
            .expect("ephemeral key not set")
            .public;
        self.mix_hash(&ephemeral_public);
        ephemeral_public.to_vec()
    }

    /// Read the second handshake message (`<- e, ee, s, es`).
    pub fn read_message_2(&mut self, message: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        if message.len() < 80 {
            return Err(HandshakeError::MessageTooShort);
        }

        let mut remote_e = [0u8; 32];
        remote_e.copy_from_slice(&message[0..32]);
        self.remote_ephemeral = Some(remote_e);
        self.mix_hash(&remote_e);

        let ephemeral = self.local_ephemeral.clone().expect("ephemeral key not set");
        let shared_ee = ephemeral.dh(&remote_e);
        self.mix_into_key(&shared_ee);

        let encrypted_s = &message[32..32 + 48];
        let remote_s = self.decrypt_and_hash(encrypted_s)?;
        if remote_s.len() != 32 {
            return Err(HandshakeError::InvalidKeySize);
        }
        let mut remote_static = [0u8; 32];
        remote_static.copy_from_slice(&remote_s);
        self.remote_static = Some(remote_static);

        // es: keyed by the initiator's ephemeral private key against
        // the responder's static public key. See module doc.
        let shared_es = ephemeral.dh(&remote_static);
        self.mix_into_key(&shared_es);

        let encrypted_payload = &message[80..];
        let payload = self.decrypt_and_hash(encrypted_payload)?;
        Ok(payload)
    }

    /// Write the third handshake message (`-> s, se`).
    pub fn write_message_3(&mut self, payload: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let mut message = Vec::new();

        let local_static_public = self.local_static.public;
        let encrypted_s = self.encrypt_and_hash(&local_static_public)?;
        message.extend_from_slice(&encrypted_s);

        let remote_e = self
            .remote_ephemeral
            .ok_or(HandshakeError::MissingRemoteKey)?;
        let shared_se = self.local_static.dh(&remote_e);
        self.mix_into_key(&shared_se);

        let encrypted_payload = self.encrypt_and_hash(payload)?;
        message.extend_from_slice(&encrypted_payload);

        Ok(message)
    }

    /// `finish`: derive the send/receive transport ciphers. Consumes
    /// the handshake state, it cannot be reused.
    pub fn finish(self) -> (Cipher, Cipher) {
        let derived = Hkdf::derive(Some(&self.chaining_key), &[], b"", 64);

        let mut send_key = [0u8; 32];
        let mut recv_key = [0u8; 32];
        send_key.copy_from_slice(&derived[0..32]);
        recv_key.copy_from_slice(&derived[32..64]);

        (Cipher::new(send_key), Cipher::new(recv_key))
    }

    pub fn remote_static_key(&self) -> Option<&[u8; 32]> {
        self.remote_static.as_ref()
    }

    pub fn handshake_hash(&self) -> [u8; 32] {
        self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_initialization() {
        let kp = KeyPair::generate();
        let hs = NoiseHandshake::start(kp, b"WA\x06\x02");

        assert!(hs.local_ephemeral.is_some());
        assert_ne!(hs.hash, [0u8; 32]);
    }

    #[test]
    fn test_write_message_1() {
        let kp = KeyPair::generate();
        let mut hs = NoiseHandshake::start(kp, b"WA\x06\x02");

        let msg = hs.write_message_1();
        assert_eq!(msg.len(), 32);
    }

    /// Full three-message round trip against a hand-rolled responder,
    /// checking that both sides land on matching send/recv ciphers
    /// and that the counterparty's static key round-trips.
    #[test]
    fn test_full_handshake_round_trip() {
        let prologue = b"WA\x06\x02";
        let initiator_static = KeyPair::generate();
        let responder_static = KeyPair::generate();

        let mut initiator = NoiseHandshake::start(initiator_static.clone(), prologue);
        let msg1 = initiator.write_message_1();

        // Responder state, mirroring read_message_2/write_message_3
        // from the other side of the wire.
        let mut r_hash: [u8; 32] = {
            let mut hasher = Sha256::new();
            hasher.update(NOISE_PROTOCOL_NAME);
            hasher.finalize().into()
        };
        let mut r_ck = r_hash;
        let mix_hash = |h: &mut [u8; 32], data: &[u8]| {
            let mut hasher = Sha256::new();
            hasher.update(*h);
            hasher.update(data);
            *h = hasher.finalize().into();
        };
        mix_hash(&mut r_hash, prologue);

        let responder_ephemeral = KeyPair::generate();
        mix_hash(&mut r_hash, &msg1); // <- e from initiator

        let shared_ee = responder_ephemeral.dh(&msg1.clone().try_into().unwrap());
        let derived = Hkdf::derive(Some(&r_ck), &shared_ee, b"", 64);
        r_ck.copy_from_slice(&derived[0..32]);
        let mut key = [0u8; 32];
        key.copy_from_slice(&derived[32..64]);
        let mut cipher = Cipher::new(key);

        let encrypted_s = cipher.encrypt(&responder_static.public, &r_hash).unwrap();
        mix_hash(&mut r_hash, &encrypted_s);

        let shared_es = responder_ephemeral.dh(&initiator_static.public);
        let derived = Hkdf::derive(Some(&r_ck), &shared_es, b"", 64);
        r_ck.copy_from_slice(&derived[0..32]);
        key.copy_from_slice(&derived[32..64]);
        cipher = Cipher::new(key);

        let responder_payload = b"hello from server";
        let encrypted_payload = cipher.encrypt(responder_payload, &r_hash).unwrap();
        mix_hash(&mut r_hash, &encrypted_payload);

        let mut message2 = Vec::new();
        message2.extend_from_slice(&responder_ephemeral.public);
        message2.extend_from_slice(&encrypted_s);
        message2.extend_from_slice(&encrypted_payload);

        let payload = initiator.read_message_2(&message2).unwrap();
        assert_eq!(payload, responder_payload);
        assert_eq!(initiator.remote_static_key(), Some(&responder_static.public));

        let message3 = initiator.write_message_3(b"hello from client").unwrap();

        // Responder side of message 3.
        let encrypted_s3 = &message3[0..48];
        let s3 = cipher.decrypt(encrypted_s3, &r_hash).unwrap();
        mix_hash(&mut r_hash, encrypted_s3);
        let mut initiator_static_recovered = [0u8; 32];
        initiator_static_recovered.copy_from_slice(&s3);
        assert_eq!(initiator_static_recovered, initiator_static.public);

        let shared_se = responder_ephemeral.dh(&initiator_static_recovered);
        let derived = Hkdf::derive(Some(&r_ck), &shared_se, b"", 64);
        r_ck.copy_from_slice(&derived[0..32]);
        key.copy_from_slice(&derived[32..64]);
        cipher = Cipher::new(key);

        let encrypted_payload3 = &message3[48..];
        let client_payload = cipher.decrypt(encrypted_payload3, &r_hash).unwrap();
        assert_eq!(client_payload, b"hello from client");

        let (i_send, i_recv) = initiator.finish();
        let r_derived = Hkdf::derive(Some(&r_ck), &[], b"", 64);
        let mut r_send_key = [0u8; 32];
        let mut r_recv_key = [0u8; 32];
        r_send_key.copy_from_slice(&r_derived[0..32]);
        r_recv_key.copy_from_slice(&r_derived[32..64]);

        // Initiator's send cipher key equals the responder's recv key
        // and vice versa (verified by round-tripping a frame through
        // each pair rather than comparing private key material).
        let mut i_send = i_send;
        let mut r_recv_cipher = Cipher::new(r_recv_key);
        let ct = i_send.encrypt(b"transport test", b"").unwrap();
        assert_eq!(r_recv_cipher.decrypt(&ct, b"").unwrap(), b"transport test");

        let mut r_send_cipher = Cipher::new(r_send_key);
        let mut i_recv = i_recv;
        let ct2 = r_send_cipher.encrypt(b"reply", b"").unwrap();
        assert_eq!(i_recv.decrypt(&ct2, b"").unwrap(), b"reply");
    }
}
