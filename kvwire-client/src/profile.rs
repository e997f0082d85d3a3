//! # Server Profile
//!
//! Purpose: The command catalogue. Maps a command id to its `CommandSpec`
//! (key layout, replication access, reply parser) and builds `Command`s.
//!
//! ## Design Principles
//! 1. **Table Driven**: One row per command; no per-command types.
//! 2. **Case Insensitive**: Ids are stored upper-case and looked up the same way.
//! 3. **Open for Extension**: `define` registers or overrides a spec.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use kvwire_common::{ClientError, ClientResult};

use crate::command::{Access, Command, CommandSpec, KeyStrategy};
use crate::value::ResponseParser;

use Access::{Read, Unsupported, Write};
use KeyStrategy::{All, First, Interleaved, SkipLast};

const COUNTED_STORE: KeyStrategy = KeyStrategy::Counted { count_at: 1, leading: true };
const COUNTED_SCRIPT: KeyStrategy = KeyStrategy::Counted { count_at: 1, leading: false };

// (id, keys, access, parser)
const DEFAULT_COMMANDS: &[(&str, KeyStrategy, Access, ResponseParser)] = &[
    // connection
    ("AUTH", KeyStrategy::None, Read, ResponseParser::Raw),
    ("ECHO", KeyStrategy::None, Read, ResponseParser::Raw),
    ("PING", KeyStrategy::None, Read, ResponseParser::Raw),
    ("SELECT", KeyStrategy::None, Read, ResponseParser::Raw),
    ("QUIT", KeyStrategy::None, Unsupported, ResponseParser::Raw),
    // keys
    ("EXISTS", First, Read, ResponseParser::Boolean),
    ("DEL", All, Write, ResponseParser::Raw),
    ("TYPE", First, Read, ResponseParser::Raw),
    ("KEYS", KeyStrategy::None, Read, ResponseParser::Raw),
    ("RANDOMKEY", KeyStrategy::None, Read, ResponseParser::Raw),
    ("RENAME", All, Write, ResponseParser::Raw),
    ("RENAMENX", All, Write, ResponseParser::Boolean),
    ("EXPIRE", First, Write, ResponseParser::Boolean),
    ("EXPIREAT", First, Write, ResponseParser::Boolean),
    ("PEXPIRE", First, Write, ResponseParser::Boolean),
    ("PERSIST", First, Write, ResponseParser::Boolean),
    ("TTL", First, Read, ResponseParser::Raw),
    ("PTTL", First, Read, ResponseParser::Raw),
    ("MOVE", First, Write, ResponseParser::Boolean),
    ("SORT", First, Write, ResponseParser::Raw),
    ("DUMP", First, Read, ResponseParser::Raw),
    // strings
    ("GET", First, Read, ResponseParser::Raw),
    ("SET", First, Write, ResponseParser::Raw),
    ("SETNX", First, Write, ResponseParser::Boolean),
    ("SETEX", First, Write, ResponseParser::Raw),
    ("PSETEX", First, Write, ResponseParser::Raw),
    ("GETSET", First, Write, ResponseParser::Raw),
    ("MGET", All, Read, ResponseParser::Raw),
    ("MSET", Interleaved, Write, ResponseParser::Raw),
    ("MSETNX", Interleaved, Write, ResponseParser::Boolean),
    ("APPEND", First, Write, ResponseParser::Raw),
    ("STRLEN", First, Read, ResponseParser::Raw),
    ("GETRANGE", First, Read, ResponseParser::Raw),
    ("SETRANGE", First, Write, ResponseParser::Raw),
    ("GETBIT", First, Read, ResponseParser::Raw),
    ("SETBIT", First, Write, ResponseParser::Raw),
    ("INCR", First, Write, ResponseParser::Raw),
    ("INCRBY", First, Write, ResponseParser::Raw),
    ("INCRBYFLOAT", First, Write, ResponseParser::Float),
    ("DECR", First, Write, ResponseParser::Raw),
    ("DECRBY", First, Write, ResponseParser::Raw),
    // hashes
    ("HGET", First, Read, ResponseParser::Raw),
    ("HSET", First, Write, ResponseParser::Boolean),
    ("HSETNX", First, Write, ResponseParser::Boolean),
    ("HMGET", First, Read, ResponseParser::Raw),
    ("HMSET", First, Write, ResponseParser::Raw),
    ("HDEL", First, Write, ResponseParser::Raw),
    ("HEXISTS", First, Read, ResponseParser::Boolean),
    ("HLEN", First, Read, ResponseParser::Raw),
    ("HKEYS", First, Read, ResponseParser::Raw),
    ("HVALS", First, Read, ResponseParser::Raw),
    ("HGETALL", First, Read, ResponseParser::Map),
    ("HINCRBY", First, Write, ResponseParser::Raw),
    ("HINCRBYFLOAT", First, Write, ResponseParser::Float),
    // lists
    ("LPUSH", First, Write, ResponseParser::Raw),
    ("RPUSH", First, Write, ResponseParser::Raw),
    ("LPUSHX", First, Write, ResponseParser::Raw),
    ("RPUSHX", First, Write, ResponseParser::Raw),
    ("LPOP", First, Write, ResponseParser::Raw),
    ("RPOP", First, Write, ResponseParser::Raw),
    ("LLEN", First, Read, ResponseParser::Raw),
    ("LRANGE", First, Read, ResponseParser::Raw),
    ("LINDEX", First, Read, ResponseParser::Raw),
    ("LSET", First, Write, ResponseParser::Raw),
    ("LREM", First, Write, ResponseParser::Raw),
    ("LTRIM", First, Write, ResponseParser::Raw),
    ("LINSERT", First, Write, ResponseParser::Raw),
    ("RPOPLPUSH", All, Write, ResponseParser::Raw),
    ("BLPOP", SkipLast(1), Write, ResponseParser::Raw),
    ("BRPOP", SkipLast(1), Write, ResponseParser::Raw),
    ("BRPOPLPUSH", SkipLast(1), Write, ResponseParser::Raw),
    // sets
    ("SADD", First, Write, ResponseParser::Raw),
    ("SREM", First, Write, ResponseParser::Raw),
    ("SPOP", First, Write, ResponseParser::Raw),
    ("SMOVE", SkipLast(1), Write, ResponseParser::Boolean),
    ("SCARD", First, Read, ResponseParser::Raw),
    ("SISMEMBER", First, Read, ResponseParser::Boolean),
    ("SMEMBERS", First, Read, ResponseParser::Raw),
    ("SRANDMEMBER", First, Read, ResponseParser::Raw),
    ("SINTER", All, Read, ResponseParser::Raw),
    ("SINTERSTORE", All, Write, ResponseParser::Raw),
    ("SUNION", All, Read, ResponseParser::Raw),
    ("SUNIONSTORE", All, Write, ResponseParser::Raw),
    ("SDIFF", All, Read, ResponseParser::Raw),
    ("SDIFFSTORE", All, Write, ResponseParser::Raw),
    // sorted sets
    ("ZADD", First, Write, ResponseParser::Raw),
    ("ZREM", First, Write, ResponseParser::Raw),
    ("ZINCRBY", First, Write, ResponseParser::Float),
    ("ZCARD", First, Read, ResponseParser::Raw),
    ("ZCOUNT", First, Read, ResponseParser::Raw),
    ("ZSCORE", First, Read, ResponseParser::Float),
    ("ZRANK", First, Read, ResponseParser::Raw),
    ("ZREVRANK", First, Read, ResponseParser::Raw),
    ("ZRANGE", First, Read, ResponseParser::Raw),
    ("ZREVRANGE", First, Read, ResponseParser::Raw),
    ("ZRANGEBYSCORE", First, Read, ResponseParser::Raw),
    ("ZREVRANGEBYSCORE", First, Read, ResponseParser::Raw),
    ("ZREMRANGEBYRANK", First, Write, ResponseParser::Raw),
    ("ZREMRANGEBYSCORE", First, Write, ResponseParser::Raw),
    ("ZUNIONSTORE", COUNTED_STORE, Write, ResponseParser::Raw),
    ("ZINTERSTORE", COUNTED_STORE, Write, ResponseParser::Raw),
    // scripting
    ("EVAL", COUNTED_SCRIPT, Write, ResponseParser::Raw),
    ("EVALSHA", COUNTED_SCRIPT, Write, ResponseParser::Raw),
    ("SCRIPT", KeyStrategy::None, Write, ResponseParser::Raw),
    // pub/sub
    ("PUBLISH", First, Write, ResponseParser::Raw),
    // server
    ("DBSIZE", KeyStrategy::None, Read, ResponseParser::Raw),
    ("FLUSHDB", KeyStrategy::None, Write, ResponseParser::Raw),
    ("FLUSHALL", KeyStrategy::None, Unsupported, ResponseParser::Raw),
    ("INFO", KeyStrategy::None, Unsupported, ResponseParser::Raw),
    ("CONFIG", KeyStrategy::None, Unsupported, ResponseParser::Raw),
    ("MONITOR", KeyStrategy::None, Unsupported, ResponseParser::Raw),
    ("SLAVEOF", KeyStrategy::None, Unsupported, ResponseParser::Raw),
    ("SHUTDOWN", KeyStrategy::None, Unsupported, ResponseParser::Raw),
    ("LASTSAVE", KeyStrategy::None, Read, ResponseParser::Raw),
    ("TIME", KeyStrategy::None, Read, ResponseParser::Raw),
];

/// Command catalogue used by the client to build commands.
#[derive(Debug, Clone)]
pub struct ServerProfile {
    commands: HashMap<String, Arc<CommandSpec>>,
}

impl Default for ServerProfile {
    fn default() -> Self {
        let mut profile = ServerProfile::empty();
        for &(id, keys, access, parser) in DEFAULT_COMMANDS {
            profile.define(CommandSpec::new(id, keys, access).with_parser(parser));
        }
        profile
    }
}

impl ServerProfile {
    /// Profile without any command registered.
    pub fn empty() -> Self {
        ServerProfile {
            commands: HashMap::new(),
        }
    }

    /// Registers `spec`, replacing any spec with the same id.
    pub fn define(&mut self, spec: CommandSpec) {
        self.commands.insert(spec.id.clone(), Arc::new(spec));
    }

    pub fn supports(&self, id: &str) -> bool {
        self.commands.contains_key(&id.to_ascii_uppercase())
    }

    pub fn spec(&self, id: &str) -> Option<Arc<CommandSpec>> {
        self.commands.get(&id.to_ascii_uppercase()).cloned()
    }

    /// Builds a command for `id` with the given arguments.
    pub fn create_command<I, A>(&self, id: &str, arguments: I) -> ClientResult<Command>
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        let spec = self
            .spec(id)
            .ok_or_else(|| ClientError::UnknownCommand(id.to_string()))?;
        Ok(Command::new(spec, arguments.into_iter().map(Into::into).collect()))
    }
}
