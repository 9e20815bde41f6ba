//! Memcached Wire Protocols
//!
//! This module implements both faces of the memcached wire contract:
//!
//! - [`ascii`]: the line-oriented text protocol (`set`/`get`/`incr`/...)
//! - [`binary`]: the 24-byte-header binary protocol (opcode dispatch)
//! - [`types`]: binary framing primitives shared by the codec and tests
//!
//! Both codecs read one complete command from a buffered stream, run it
//! against the [`SharedStore`](crate::store::SharedStore), and write a
//! correctly framed response. Which codec handles a command is decided by
//! the connection handler from the first request byte: `0x80` selects
//! binary, anything below selects ASCII.
//!
//! ## Outcome and Errors
//!
//! Every command evaluates to an [`Outcome`] telling the connection loop
//! whether to keep going, or to a [`ProtocolError`]:
//!
//! - [`ProtocolError::Io`]: the socket failed; close without a reply.
//! - [`ProtocolError::Client`]: the client broke the protocol; the error
//!   line has already been written, close after flushing it.

pub mod ascii;
pub mod binary;
pub mod types;

// Re-export commonly used types
pub use types::{Opcode, RequestHeader, ResponseHeader, Status};

use thiserror::Error;

/// What the connection loop should do after a command completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Keep reading commands from this connection.
    Continue,
    /// Flush and close the connection (quit, or a silent close).
    Close,
}

/// Errors that end a connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O error on the socket
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol violation; the client has already been told
    #[error("client error: {0}")]
    Client(String),
}
