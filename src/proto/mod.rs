//! Protobuf message shapes for the handshake and client-payload wire
//! format, generated by hand rather than `prost-build` to keep the
//! crate's source-only, since the `.proto` schema itself is not part
//! of this repository.

mod wa;

pub use wa::*;
