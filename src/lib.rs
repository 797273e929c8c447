//! Protocol engine for the WhatsApp Web multi-device wire protocol.
//!
//! Ties together the Noise `XX` handshake, the binary node codec, the
//! device-pairing state machine, request/response correlation, and
//! media envelope crypto into a single connection type: `Session`.
//! Application-level concerns (chat history, contact sync, message
//! composition) are left to a layer built on top of this engine.

pub mod binary;
pub mod config;
pub mod crypto;
pub mod error;
pub mod media;
pub mod pairing;
pub mod proto;
pub mod request;
pub mod socket;
pub mod store;
pub mod types;

pub use config::{EngineConfig, ReconnectPolicy};
pub use error::EngineError;
pub use pairing::{PairSuccessPayload, PairingSession, PairingState};
pub use request::RequestTracker;
pub use socket::Session;
pub use store::Device;
pub use types::{Event, JID};
