//! Typed errors for every layer of the engine.

use thiserror::Error;

/// Transport-layer failures: framing, the WebSocket itself, or the
/// post-handshake cipher.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(String),
    #[error("frame too short: got {0} bytes")]
    FrameTooShort(usize),
    #[error("frame exceeds maximum length: {0} bytes")]
    FrameTooLong(usize),
    #[error("not connected")]
    NotConnected,
    #[error("cipher not established")]
    CipherNotEstablished,
    #[error(transparent)]
    Cipher(#[from] crate::crypto::CipherError),
}

/// Failures during the Noise `XX` handshake.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("message too short")]
    MessageTooShort,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("invalid key size")]
    InvalidKeySize,
    #[error("missing remote key")]
    MissingRemoteKey,
    #[error("unexpected handshake state: {0}")]
    UnexpectedState(&'static str),
}

/// Malformed or unexpected binary-node wire content.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected end of buffer")]
    UnexpectedEof,
    #[error("unknown tag byte: {0:#04x}")]
    UnknownTag(u8),
    #[error("invalid token index: {0}")]
    InvalidTokenIndex(u8),
    #[error("invalid jid encoding")]
    InvalidJid,
    #[error("invalid nibble/hex packed string")]
    InvalidPackedString,
    #[error("list size {0} inconsistent with attribute count")]
    InvalidListSize(usize),
}

/// Pairing-chain integrity failures. All are fatal and never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PairingError {
    #[error("hmac verification failed")]
    HmacMismatch,
    #[error("account signature verification failed")]
    AccountSignatureInvalid,
    #[error("missing ref from server")]
    MissingRef,
    #[error("unexpected pairing state: {0}")]
    UnexpectedState(&'static str),
    #[error("qr code expired")]
    Expired,
}

/// A `<stream:error>` node received from the server.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("stream error: code {code:?}")]
pub struct StreamError {
    pub code: Option<u32>,
}

/// A terminal `<failure>` node received during or after login.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("login failure: reason {reason:?}")]
pub struct LoginFailure {
    pub reason: Option<u32>,
}

#[derive(Debug, Error)]
#[error("request timed out")]
pub struct RequestTimeout;

/// Media envelope integrity failures.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("mac verification failed")]
    MacMismatch,
    #[error("ciphertext length is not a multiple of the block size")]
    InvalidLength,
    #[error("padding is invalid")]
    InvalidPadding,
}

/// Aggregate error type returned by the engine's public entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Pairing(#[from] PairingError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Login(#[from] LoginFailure),
    #[error(transparent)]
    Timeout(#[from] RequestTimeout),
    #[error(transparent)]
    Media(#[from] MediaError),
}

impl EngineError {
    /// Whether the recovery policy says this error is worth a
    /// reconnect attempt. Only `reason == 401` and `code == 515` are
    /// recoverable; everything else, including every cryptographic
    /// integrity failure, is fatal.
    pub fn is_recoverable(&self) -> bool {
        match self {
            EngineError::Login(LoginFailure { reason: Some(401) }) => true,
            EngineError::Stream(StreamError { code: Some(515) }) => true,
            _ => false,
        }
    }
}
