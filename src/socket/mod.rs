//! WebSocket transport for the protocol engine.
//!
//! `session` owns the live connection: WebSocket framing, the Noise
//! handshake, and the encrypted read/write loop.

pub mod session;

pub use session::{endpoints, Session, MAGIC_LENGTH_DISCONNECT, WA_HEADER};
