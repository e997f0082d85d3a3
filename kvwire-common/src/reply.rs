//! # Reply Model
//!
//! Raw replies as they come off the wire, before any command-specific
//! parsing. A `Reply` is produced fresh per read and handed straight to the
//! command's parser.

use std::fmt;

use bytes::Bytes;

/// RESP2 reply value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// +OK or +PONG style status lines.
    Status(String),
    /// -ERR ... error lines.
    Error(ErrorReply),
    /// :123 integers.
    Integer(i64),
    /// $... bulk strings.
    Bulk(Bytes),
    /// *... arrays, possibly nested.
    Array(Vec<Reply>),
    /// $-1 and *-1.
    Nil,
}

impl Reply {
    /// Returns true for error replies.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Short type name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Status(_) => "status",
            Reply::Error(_) => "error",
            Reply::Integer(_) => "integer",
            Reply::Bulk(_) => "bulk",
            Reply::Array(_) => "array",
            Reply::Nil => "nil",
        }
    }
}

/// Error reply returned by the server (`-WRONGTYPE Operation against ...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    message: String,
}

impl ErrorReply {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorReply {
            message: message.into(),
        }
    }

    /// Full message text as sent by the server.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Error category: the leading upper-case word (`ERR`, `NOSCRIPT`, ...).
    ///
    /// Returns `None` when the message does not start with one.
    pub fn category(&self) -> Option<&str> {
        let word = self.message.split(' ').next()?;
        if !word.is_empty() && word.bytes().all(|b| b.is_ascii_uppercase()) {
            Some(word)
        } else {
            None
        }
    }
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
