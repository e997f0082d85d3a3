//! # Command Descriptor
//!
//! Purpose: Carry one logical command from the catalogue to the wire: its
//! spec (id, key layout, replication access, reply parser), its arguments
//! and the routing key derived from them.
//!
//! ## Design Principles
//! 1. **Closed Key Layouts**: Where the keys sit inside the argument list is a
//!    `KeyStrategy` variant chosen by table lookup, not a per-command closure.
//! 2. **Lazy Routing Key**: The routing key is computed on first use and
//!    cached; `set_arguments` is the only mutator and it drops the cache.
//! 3. **Shared Specs**: Specs are `Arc`-shared so building a command costs one
//!    argument vector.

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use kvwire_common::{ClientResult, Reply};

use crate::distribution::extract_key_tag;
use crate::value::{ResponseParser, Value};

/// Position of key arguments inside a command's argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// No keys; the command cannot be hashed.
    None,
    /// Single key at index 0 (`GET key`).
    First,
    /// Every argument is a key (`DEL k1 k2`).
    All,
    /// Keys at even indexes (`MSET k1 v1 k2 v2`).
    Interleaved,
    /// Every argument except the last `n` (`BLPOP k1 k2 timeout`).
    SkipLast(usize),
    /// A key count at `count_at` followed by that many keys, optionally
    /// preceded by a key at index 0 (`ZUNIONSTORE dst 2 k1 k2`, `EVAL body 1 k`).
    Counted { count_at: usize, leading: bool },
}

impl KeyStrategy {
    /// Returns the indexes of key arguments in `args`.
    pub fn key_positions(&self, args: &[Bytes]) -> Vec<usize> {
        let len = args.len();
        match *self {
            KeyStrategy::None => Vec::new(),
            KeyStrategy::First => (0..len.min(1)).collect(),
            KeyStrategy::All => (0..len).collect(),
            KeyStrategy::Interleaved => (0..len).step_by(2).collect(),
            KeyStrategy::SkipLast(n) => (0..len.saturating_sub(n)).collect(),
            KeyStrategy::Counted { count_at, leading } => {
                let mut positions = Vec::new();
                if leading && len > 0 {
                    positions.push(0);
                }
                let count = args
                    .get(count_at)
                    .and_then(|raw| std::str::from_utf8(raw).ok())
                    .and_then(|raw| raw.parse::<usize>().ok())
                    .unwrap_or(0);
                let start = count_at + 1;
                positions.extend(start..start.saturating_add(count).min(len));
                positions
            }
        }
    }
}

/// How a command behaves under master/slave replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Safe to serve from a slave.
    Read,
    /// Must run on the master.
    Write,
    /// Not meaningful when talking to a replicated set (INFO, MONITOR, ...).
    Unsupported,
}

/// Static description of a command, as registered in the server profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Upper-case command id as sent on the wire.
    pub id: String,
    pub keys: KeyStrategy,
    pub access: Access,
    pub parser: ResponseParser,
}

impl CommandSpec {
    pub fn new(id: &str, keys: KeyStrategy, access: Access) -> Self {
        CommandSpec {
            id: id.to_ascii_uppercase(),
            keys,
            access,
            parser: ResponseParser::Raw,
        }
    }

    /// Returns a copy using `parser` for replies.
    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }
}

/// A command instance ready to be dispatched.
#[derive(Debug, Clone)]
pub struct Command {
    spec: Arc<CommandSpec>,
    arguments: Vec<Bytes>,
    routing_key: OnceCell<Option<Bytes>>,
    // Script body kept for the EVAL fallback of EVALSHA invocations.
    script: Option<Bytes>,
}

impl Command {
    pub fn new(spec: Arc<CommandSpec>, arguments: Vec<Bytes>) -> Self {
        Command {
            spec,
            arguments,
            routing_key: OnceCell::new(),
            script: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn arguments(&self) -> &[Bytes] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&Bytes> {
        self.arguments.get(index)
    }

    /// Replaces the arguments and invalidates the cached routing key.
    pub fn set_arguments(&mut self, arguments: Vec<Bytes>) {
        self.arguments = arguments;
        self.routing_key = OnceCell::new();
    }

    /// Key arguments in order, as described by the spec's key strategy.
    pub fn keys(&self) -> impl Iterator<Item = &Bytes> {
        self.spec
            .keys
            .key_positions(&self.arguments)
            .into_iter()
            .map(move |idx| &self.arguments[idx])
    }

    /// Returns true when the command declares key arguments at all.
    pub fn is_hashable(&self) -> bool {
        self.spec.keys != KeyStrategy::None
    }

    /// Routing key used to pick a cluster node.
    ///
    /// This is the hash tag shared by every key of the command. `None` when
    /// the command has no keys or its keys carry different tags.
    pub fn routing_key(&self) -> Option<&Bytes> {
        self.routing_key.get_or_init(|| self.compute_routing_key()).as_ref()
    }

    fn compute_routing_key(&self) -> Option<Bytes> {
        let mut keys = self.keys();
        let first = keys.next()?;
        let tag = extract_key_tag(first);
        if keys.all(|key| extract_key_tag(key) == tag) {
            Some(first.slice_ref(tag))
        } else {
            None
        }
    }

    /// Marks this command as a cached-script invocation of `body`.
    pub fn with_script(mut self, body: Bytes) -> Self {
        self.script = Some(body);
        self
    }

    pub fn script_body(&self) -> Option<&Bytes> {
        self.script.as_ref()
    }

    /// Arguments of the equivalent EVAL: the body replaces the digest.
    pub fn eval_arguments(&self) -> Option<Vec<Bytes>> {
        let body = self.script.clone()?;
        let mut arguments = Vec::with_capacity(self.arguments.len());
        arguments.push(body);
        arguments.extend(self.arguments.iter().skip(1).cloned());
        Some(arguments)
    }

    /// Runs the spec's reply parser over a raw reply.
    pub fn parse_response(&self, reply: Reply) -> ClientResult<Value> {
        self.spec.parser.parse(&self.spec.id, reply)
    }
}

/// Renders `ID arg1 arg2`, truncating long arguments.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())?;
        for arg in &self.arguments {
            let text = String::from_utf8_lossy(arg);
            if text.chars().count() > 32 {
                let head: String = text.chars().take(32).collect();
                write!(f, " {head}[...]")?;
            } else {
                write!(f, " {text}")?;
            }
        }
        Ok(())
    }
}
