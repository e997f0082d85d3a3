//! Key namespacing applied to commands before dispatch.

use bytes::{BufMut, Bytes, BytesMut};

use crate::command::Command;

/// Prepends a fixed namespace to every key argument of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix {
    prefix: Bytes,
}

impl KeyPrefix {
    pub fn new(prefix: impl Into<Bytes>) -> Self {
        KeyPrefix {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &Bytes {
        &self.prefix
    }

    /// Rewrites the key positions of `command` in place.
    pub fn apply(&self, command: &mut Command) {
        if self.prefix.is_empty() {
            return;
        }
        let positions = command.spec().keys.key_positions(command.arguments());
        if positions.is_empty() {
            return;
        }

        let mut arguments = command.arguments().to_vec();
        for idx in positions {
            let mut key = BytesMut::with_capacity(self.prefix.len() + arguments[idx].len());
            key.put_slice(&self.prefix);
            key.put_slice(&arguments[idx]);
            arguments[idx] = key.freeze();
        }
        command.set_arguments(arguments);
    }
}
