//! Connection and pairing lifecycle events.
//!
//! The engine's event surface is limited to what the wire-protocol
//! layer itself produces: connection state, QR/pairing-code prompts,
//! and the outcome of the pairing handshake. Decoded application
//! content (chat messages, receipts, presence) is out of scope and is
//! left to a higher-level layer built on top of this engine.

/// Emitted when the WebSocket connects and the Noise handshake
/// completes.
#[derive(Debug, Clone)]
pub struct Connected {
    pub is_reconnect: bool,
}

/// Emitted when the connection drops, for any reason.
#[derive(Debug, Clone)]
pub struct Disconnected {
    pub reason: DisconnectReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectReason {
    LoggedOut,
    Replaced,
    ServerRequested,
    NetworkError(String),
    Unknown,
}

/// Emitted when the server ends the session with a `<failure>` node.
#[derive(Debug, Clone)]
pub struct LoggedOut {
    pub by_user: bool,
    pub reason: Option<String>,
}

/// A QR code to display during pairing; re-emitted as the server
/// rotates `ref` values.
#[derive(Debug, Clone)]
pub struct QRCode {
    pub code: String,
    pub timeout_seconds: u64,
}

/// An alternative phone-entry pairing code.
#[derive(Debug, Clone)]
pub struct PairingCode {
    pub code: String,
}

/// Emitted once pairing has been confirmed by the phone and the
/// companion's identity has been persisted.
#[derive(Debug, Clone)]
pub struct PairSuccess {
    pub device_jid: crate::types::JID,
    pub business_name: Option<String>,
    pub platform: Option<String>,
}

/// All possible events the engine surfaces to a caller.
#[derive(Debug, Clone)]
pub enum Event {
    Connected(Connected),
    Disconnected(Disconnected),
    LoggedOut(LoggedOut),
    QRCode(QRCode),
    PairingCode(PairingCode),
    PairSuccess(PairSuccess),
}
