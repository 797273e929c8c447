//! Cryptographic primitives: key pairs, HKDF, the transport cipher,
//! and the Noise handshake engine built on top of them.

mod cipher;
mod hkdf;
mod keypair;
mod noise;

pub use cipher::{Cipher, CipherError};
pub use hkdf::{derive_noise_keys, Hkdf};
pub use keypair::{verify_message, verify_pre_key_signature, KeyPair, PreKey};
pub use noise::{HandshakeError, NoiseHandshake, NOISE_PROTOCOL_NAME};
