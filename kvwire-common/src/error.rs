//! # Error Taxonomy
//!
//! Purpose: Give every failure a caller can observe one enum, split by who is
//! at fault: the transport, the framing, the server, or the caller's topology.
//!
//! ## Design Principles
//! 1. **Reset Awareness**: Errors know whether the connection that produced
//!    them must be discarded (`should_reset_connection`).
//! 2. **Identity Carrying**: Transport and framing errors name the endpoint
//!    (`tcp://host:port`) so aggregate failures are attributable.
//! 3. **Server Errors Are Data**: `-ERR` replies stay an `ErrorReply` until the
//!    client policy decides to raise them.

use std::io;

use thiserror::Error;

use crate::reply::ErrorReply;

/// Result type shared by the client crates.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced to callers of the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network failure while connecting, writing or reading.
    #[error("{message} [{connection}]")]
    Communication {
        /// Identity of the connection, e.g. `tcp://127.0.0.1:6379`.
        connection: String,
        message: String,
        /// OS error code when the transport reported one.
        code: Option<i32>,
        #[source]
        source: Option<io::Error>,
    },
    /// Malformed reply framing; the stream can no longer be trusted.
    #[error("{source} [{connection}]")]
    Protocol {
        connection: String,
        #[source]
        source: DecodeError,
    },
    /// Server returned an error reply and the client raises on errors.
    #[error("{0}")]
    Server(ErrorReply),
    /// Operation is not valid for the configured topology.
    #[error("{0}")]
    NotSupported(String),
    /// Topology is misconfigured (missing master, unknown alias, ...).
    #[error("{0}")]
    Configuration(String),
    /// `connect()` was called on a connection that is already open.
    #[error("connection already established [{0}]")]
    AlreadyConnected(String),
    /// The command id is not registered in the server profile.
    #[error("command '{0}' is not registered in the server profile")]
    UnknownCommand(String),
    /// Connection parameters could not be parsed or are incomplete.
    #[error("invalid connection parameters: {0}")]
    InvalidParameters(String),
    /// Reply type did not match what the caller expected.
    #[error("unexpected response to {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    /// Builds a communication error from an I/O failure.
    pub fn communication(connection: impl Into<String>, message: impl Into<String>, err: io::Error) -> Self {
        ClientError::Communication {
            connection: connection.into(),
            message: message.into(),
            code: err.raw_os_error(),
            source: Some(err),
        }
    }

    /// Maps a codec failure to the caller-facing error for `connection`.
    ///
    /// Short reads and socket errors are transport failures; anything else
    /// means the peer sent bytes that do not form a valid frame.
    pub fn decode(connection: impl Into<String>, err: DecodeError) -> Self {
        match err {
            DecodeError::Io(source) => {
                ClientError::communication(connection, "Error while reading bytes from the server", source)
            }
            DecodeError::ConnectionClosed => ClientError::Communication {
                connection: connection.into(),
                message: "Error while reading line from the server".to_string(),
                code: None,
                source: None,
            },
            source => ClientError::Protocol {
                connection: connection.into(),
                source,
            },
        }
    }

    /// Returns true when the connection that raised this error must be reset.
    pub fn should_reset_connection(&self) -> bool {
        matches!(self, ClientError::Communication { .. } | ClientError::Protocol { .. })
    }

    /// Returns the server error reply, if this is one.
    pub fn server_error(&self) -> Option<&ErrorReply> {
        match self {
            ClientError::Server(reply) => Some(reply),
            _ => None,
        }
    }
}

/// Failures while decoding a RESP2 frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Transport failure underneath the reader.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The reader hit end of stream before a frame started.
    #[error("connection closed by the server")]
    ConnectionClosed,
    /// The type byte does not start any known frame.
    #[error("unknown prefix: '{}'", char::from(*.0))]
    UnknownPrefix(u8),
    /// An integer payload or a length header is not a signed decimal.
    #[error("invalid integer payload")]
    InvalidInteger,
    /// A bulk or array header declared a negative length other than -1.
    #[error("invalid frame length: {0}")]
    InvalidLength(i64),
    /// A line or bulk payload was not followed by CRLF.
    #[error("missing frame terminator")]
    MissingTerminator,
    /// A request frame was not an array of bulk strings.
    #[error("request is not an array of bulk strings")]
    InvalidRequest,
}
