// kvwire-common - Shared reply types, wire codec and errors for kvwire
//
// This crate holds everything both sides of the wire agree on: the reply
// model, the RESP2 frame codec and the client error taxonomy.

pub mod error;
pub mod protocol;
pub mod reply;

// Re-export for convenience
pub use error::*;
pub use protocol::*;
pub use reply::*;
