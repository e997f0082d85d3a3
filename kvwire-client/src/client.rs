//! # Synchronous Client API
//!
//! Purpose: Single entry point for issuing commands: build them from the
//! catalogue, route them through the configured topology, and turn replies
//! into values or errors according to the client's policy.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Client` hides routing, framing and reply parsing.
//! 2. **Explicit Policy**: Whether server errors raise is a `ClientOptions`
//!    field, not global state.
//! 3. **Fail Fast**: Transport errors propagate after the failed connection
//!    resets; the only silent retry is the `NOSCRIPT` fallback.
//! 4. **Typed Helpers**: Common commands get typed wrappers on top of the
//!    generic `execute`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use tracing::{trace, warn};

use kvwire_common::{ClientError, ClientResult, ErrorReply, Reply};

use crate::cluster::ClusterConnection;
use crate::command::{Command, CommandSpec};
use crate::connection::{Connection, StreamConnection};
use crate::factory::ConnectionFactory;
use crate::parameters::ConnectionParameters;
use crate::prefix::KeyPrefix;
use crate::profile::ServerProfile;
use crate::replication::ReplicationConnection;
use crate::value::Value;

/// Client behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Raise `ClientError::Server` on error replies instead of returning
    /// `Value::Error`.
    pub exceptions: bool,
    /// Namespace prepended to every key.
    pub prefix: Option<String>,
    /// Treat multiple nodes as a master/slave set instead of a cluster.
    pub replication: bool,
    /// Re-send a command once after its connection was lost.
    pub retry_on_connection_loss: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            exceptions: true,
            prefix: None,
            replication: false,
            retry_on_connection_loss: false,
        }
    }
}

/// TTL state returned by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTtl {
    /// Key is missing or already expired.
    Missing,
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

/// Lua script with its server-side digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    body: Bytes,
    sha: String,
}

impl Script {
    /// Wraps a body whose SHA1 digest is already known.
    pub fn new(body: impl Into<Bytes>, sha: impl Into<String>) -> Self {
        Script {
            body: body.into(),
            sha: sha.into(),
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn sha(&self) -> &str {
        &self.sha
    }
}

/// Connection topology chosen from configuration.
#[derive(Debug)]
pub enum Topology {
    Single(StreamConnection),
    Cluster(ClusterConnection),
    Replication(ReplicationConnection),
}

impl Connection for Topology {
    fn connect(&mut self) -> ClientResult<()> {
        match self {
            Topology::Single(conn) => conn.connect(),
            Topology::Cluster(conn) => conn.connect(),
            Topology::Replication(conn) => conn.connect(),
        }
    }

    fn disconnect(&mut self) {
        match self {
            Topology::Single(conn) => conn.disconnect(),
            Topology::Cluster(conn) => conn.disconnect(),
            Topology::Replication(conn) => conn.disconnect(),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Topology::Single(conn) => conn.is_connected(),
            Topology::Cluster(conn) => conn.is_connected(),
            Topology::Replication(conn) => conn.is_connected(),
        }
    }

    fn write_command(&mut self, command: &Command) -> ClientResult<()> {
        match self {
            Topology::Single(conn) => conn.write_command(command),
            Topology::Cluster(conn) => conn.write_command(command),
            Topology::Replication(conn) => conn.write_command(command),
        }
    }

    fn read_response(&mut self, command: &Command) -> ClientResult<Reply> {
        match self {
            Topology::Single(conn) => conn.read_response(command),
            Topology::Cluster(conn) => conn.read_response(command),
            Topology::Replication(conn) => conn.read_response(command),
        }
    }

    fn execute_command(&mut self, command: &Command) -> ClientResult<Reply> {
        match self {
            Topology::Single(conn) => conn.execute_command(command),
            Topology::Cluster(conn) => conn.execute_command(command),
            Topology::Replication(conn) => conn.execute_command(command),
        }
    }

    fn execute_on(&mut self, id: &str, command: &Command) -> ClientResult<Reply> {
        match self {
            Topology::Single(conn) => conn.execute_on(id, command),
            Topology::Cluster(conn) => conn.execute_on(id, command),
            Topology::Replication(conn) => conn.execute_on(id, command),
        }
    }
}

/// Synchronous client over a single connection or an aggregate.
#[derive(Debug)]
pub struct Client<C = Topology> {
    connection: C,
    profile: Arc<ServerProfile>,
    options: ClientOptions,
    prefix: Option<KeyPrefix>,
}

impl Client<Topology> {
    /// Creates a client for one server with default options.
    pub fn new(parameters: ConnectionParameters) -> ClientResult<Self> {
        Self::with_options(vec![parameters], ClientOptions::default())
    }

    /// Creates a client from a `tcp://` or `unix://` URI.
    pub fn from_uri(uri: &str) -> ClientResult<Self> {
        Self::new(uri.parse()?)
    }

    /// Creates a client over `nodes`.
    ///
    /// One node gives a single connection; several nodes give a cluster, or
    /// a master/slave set when `options.replication` is set.
    pub fn with_options(mut nodes: Vec<ConnectionParameters>, options: ClientOptions) -> ClientResult<Self> {
        let profile = Arc::new(ServerProfile::default());
        let factory = ConnectionFactory::new(profile.clone());

        let topology = match nodes.len() {
            0 => {
                return Err(ClientError::InvalidParameters(
                    "at least one connection is required".to_string(),
                ))
            }
            _ if options.replication => Topology::Replication(factory.create_replication(nodes)?),
            1 => Topology::Single(factory.create(nodes.remove(0))?),
            _ => Topology::Cluster(factory.create_cluster(nodes)?),
        };

        Ok(Client::build(topology, profile, options))
    }
}

impl<C: Connection> Client<C> {
    /// Wraps an existing connection.
    pub fn from_connection(connection: C, options: ClientOptions) -> Self {
        Client::build(connection, Arc::new(ServerProfile::default()), options)
    }

    fn build(connection: C, profile: Arc<ServerProfile>, options: ClientOptions) -> Self {
        let prefix = options.prefix.as_deref().filter(|p| !p.is_empty()).map(|p| KeyPrefix::new(p.to_string()));
        Client {
            connection,
            profile,
            options,
            prefix,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn profile(&self) -> &ServerProfile {
        &self.profile
    }

    /// Registers a custom command in this client's catalogue.
    pub fn define_command(&mut self, spec: CommandSpec) {
        Arc::make_mut(&mut self.profile).define(spec);
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn connect(&mut self) -> ClientResult<()> {
        self.connection.connect()
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Builds a command from the catalogue, applying the key prefix.
    pub fn create_command<I, A>(&self, id: &str, arguments: I) -> ClientResult<Command>
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        let mut command = self.profile.create_command(id, arguments)?;
        if let Some(prefix) = &self.prefix {
            prefix.apply(&mut command);
        }
        Ok(command)
    }

    /// Dispatches `command` through the topology and parses its reply.
    pub fn execute(&mut self, command: &Command) -> ClientResult<Value> {
        let reply = self.dispatch(None, command)?;
        self.handle_reply(None, command, reply)
    }

    /// Dispatches `command` to the member named `id`, bypassing routing.
    pub fn execute_on(&mut self, id: &str, command: &Command) -> ClientResult<Value> {
        let reply = self.dispatch(Some(id), command)?;
        self.handle_reply(Some(id), command, reply)
    }

    /// Builds and executes `id` in one step.
    pub fn call<I, A>(&mut self, id: &str, arguments: I) -> ClientResult<Value>
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        let command = self.create_command(id, arguments)?;
        self.execute(&command)
    }

    fn dispatch(&mut self, target: Option<&str>, command: &Command) -> ClientResult<Reply> {
        trace!(command = %command, "dispatch");
        match self.round_trip(target, command) {
            Err(err) if err.should_reset_connection() && self.options.retry_on_connection_loss => {
                warn!(command = %command.id(), error = %err, "retrying after connection loss");
                self.round_trip(target, command)
            }
            result => result,
        }
    }

    fn round_trip(&mut self, target: Option<&str>, command: &Command) -> ClientResult<Reply> {
        match target {
            Some(id) => self.connection.execute_on(id, command),
            None => self.connection.execute_command(command),
        }
    }

    fn handle_reply(&mut self, target: Option<&str>, command: &Command, reply: Reply) -> ClientResult<Value> {
        match reply {
            Reply::Error(err) => {
                if err.category() == Some("NOSCRIPT") {
                    if let Some(arguments) = command.eval_arguments() {
                        trace!(command = %command.id(), "script not cached, falling back to EVAL");
                        let eval = self.profile.create_command("EVAL", arguments)?;
                        let reply = self.dispatch(target, &eval)?;
                        return self.handle_reply(target, &eval, reply);
                    }
                }
                self.on_error(err)
            }
            reply => command.parse_response(reply),
        }
    }

    fn on_error(&self, err: ErrorReply) -> ClientResult<Value> {
        if self.options.exceptions {
            Err(ClientError::Server(err))
        } else {
            Ok(Value::Error(err))
        }
    }

    /// Loads `body` into the server's script cache.
    pub fn load_script(&mut self, body: impl Into<Bytes>) -> ClientResult<Script> {
        let body = body.into();
        let command = self.create_command("SCRIPT", [Bytes::from_static(b"LOAD"), body.clone()])?;
        let sha = match self.execute(&command)? {
            Value::Data(sha) => String::from_utf8(sha.to_vec())
                .map_err(|_| ClientError::UnexpectedResponse("SCRIPT".to_string()))?,
            value => return Err(unexpected("SCRIPT", value)),
        };
        Ok(Script { body, sha })
    }

    /// Runs a cached script, falling back to `EVAL` when the server lost it.
    pub fn eval_script<K, A>(&mut self, script: &Script, keys: &[K], args: &[A]) -> ClientResult<Value>
    where
        K: AsRef<[u8]>,
        A: AsRef<[u8]>,
    {
        let mut arguments = Vec::with_capacity(2 + keys.len() + args.len());
        arguments.push(Bytes::from(script.sha.clone()));
        arguments.push(Bytes::from(keys.len().to_string()));
        arguments.extend(keys.iter().map(|key| copy(key)));
        arguments.extend(args.iter().map(|arg| copy(arg)));

        let command = self
            .create_command("EVALSHA", arguments)?
            .with_script(script.body.clone());
        self.execute(&command)
    }

    /// Pings the server and returns its status text.
    pub fn ping(&mut self) -> ClientResult<String> {
        match self.call("PING", Vec::<Bytes>::new())? {
            Value::Status(status) => Ok(status),
            Value::Data(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            value => Err(unexpected("PING", value)),
        }
    }

    /// Fetches a value by key.
    ///
    /// Returns `Ok(None)` when the key is missing.
    pub fn get(&mut self, key: impl AsRef<[u8]>) -> ClientResult<Option<Bytes>> {
        match self.call("GET", [copy(key)])? {
            Value::Data(data) => Ok(Some(data)),
            Value::Nil => Ok(None),
            value => Err(unexpected("GET", value)),
        }
    }

    /// Sets a value for a key without expiration.
    pub fn set(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> ClientResult<()> {
        match self.call("SET", [copy(key), copy(value)])? {
            Value::Status(_) => Ok(()),
            value => Err(unexpected("SET", value)),
        }
    }

    /// Sets a value and attaches an expiration in seconds.
    pub fn set_with_ttl(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        ttl: Duration,
    ) -> ClientResult<()> {
        let seconds = Bytes::from(ttl.as_secs().max(1).to_string());
        match self.call("SET", [copy(key), copy(value), Bytes::from_static(b"EX"), seconds])? {
            Value::Status(_) => Ok(()),
            value => Err(unexpected("SET", value)),
        }
    }

    /// Deletes keys. Returns how many were removed.
    pub fn del<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> ClientResult<i64> {
        let keys: Vec<Bytes> = keys.iter().map(|key| copy(key)).collect();
        match self.call("DEL", keys)? {
            Value::Int(count) => Ok(count),
            value => Err(unexpected("DEL", value)),
        }
    }

    pub fn exists(&mut self, key: impl AsRef<[u8]>) -> ClientResult<bool> {
        match self.call("EXISTS", [copy(key)])? {
            Value::Bool(exists) => Ok(exists),
            value => Err(unexpected("EXISTS", value)),
        }
    }

    /// Sets a time-to-live on a key. Returns true when the TTL was set.
    pub fn expire(&mut self, key: impl AsRef<[u8]>, ttl: Duration) -> ClientResult<bool> {
        let seconds = Bytes::from(ttl.as_secs().to_string());
        match self.call("EXPIRE", [copy(key), seconds])? {
            Value::Bool(set) => Ok(set),
            value => Err(unexpected("EXPIRE", value)),
        }
    }

    /// Returns TTL status for a key.
    pub fn ttl(&mut self, key: impl AsRef<[u8]>) -> ClientResult<ClientTtl> {
        match self.call("TTL", [copy(key)])? {
            Value::Int(-2) => Ok(ClientTtl::Missing),
            Value::Int(-1) => Ok(ClientTtl::NoExpiry),
            Value::Int(seconds) if seconds >= 0 => Ok(ClientTtl::ExpiresIn(Duration::from_secs(seconds as u64))),
            value => Err(unexpected("TTL", value)),
        }
    }

    pub fn incr(&mut self, key: impl AsRef<[u8]>) -> ClientResult<i64> {
        match self.call("INCR", [copy(key)])? {
            Value::Int(value) => Ok(value),
            value => Err(unexpected("INCR", value)),
        }
    }

    /// Fetches several keys at once; missing keys are `None`.
    pub fn mget<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> ClientResult<Vec<Option<Bytes>>> {
        let keys: Vec<Bytes> = keys.iter().map(|key| copy(key)).collect();
        match self.call("MGET", keys)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Data(data) => Ok(Some(data)),
                    Value::Nil => Ok(None),
                    value => Err(unexpected("MGET", value)),
                })
                .collect(),
            value => Err(unexpected("MGET", value)),
        }
    }

    /// Returns every field of a hash in server order.
    pub fn hgetall(&mut self, key: impl AsRef<[u8]>) -> ClientResult<Vec<(Bytes, Bytes)>> {
        match self.call("HGETALL", [copy(key)])? {
            Value::Map(pairs) => pairs
                .into_iter()
                .map(|(field, value)| match value {
                    Value::Data(data) => Ok((field, data)),
                    value => Err(unexpected("HGETALL", value)),
                })
                .collect(),
            value => Err(unexpected("HGETALL", value)),
        }
    }

    /// Raw `INFO` text, optionally for one section.
    pub fn info(&mut self, section: Option<&str>) -> ClientResult<String> {
        let arguments: Vec<Bytes> = section.map(|s| Bytes::from(s.to_string())).into_iter().collect();
        match self.call("INFO", arguments)? {
            Value::Data(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            value => Err(unexpected("INFO", value)),
        }
    }

    pub fn dbsize(&mut self) -> ClientResult<i64> {
        match self.call("DBSIZE", Vec::<Bytes>::new())? {
            Value::Int(count) => Ok(count),
            value => Err(unexpected("DBSIZE", value)),
        }
    }
}

fn copy(data: impl AsRef<[u8]>) -> Bytes {
    Bytes::copy_from_slice(data.as_ref())
}

/// Typed helpers cannot carry error values, so those always raise.
fn unexpected(id: &str, value: Value) -> ClientError {
    match value {
        Value::Error(err) => ClientError::Server(err),
        _ => ClientError::UnexpectedResponse(id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::connection::testing::MockConnection;

    fn client(replies: Vec<Reply>, options: ClientOptions) -> Client<MockConnection> {
        let mut conn = MockConnection::tcp("127.0.0.1", 6379);
        conn.replies = VecDeque::from(replies);
        Client::from_connection(conn, options)
    }

    fn wrongtype() -> Reply {
        Reply::Error(ErrorReply::new(
            "WRONGTYPE Operation against a key holding the wrong kind of value",
        ))
    }

    #[test]
    fn options_default_to_raising() {
        let options = ClientOptions::default();
        assert!(options.exceptions);
        assert!(!options.retry_on_connection_loss);
        assert!(options.prefix.is_none());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ClientOptions = serde_json::from_str(r#"{"prefix": "app:", "exceptions": false}"#).unwrap();
        assert_eq!(options.prefix.as_deref(), Some("app:"));
        assert!(!options.exceptions);
        assert!(!options.replication);
    }

    #[test]
    fn error_replies_raise_by_default() {
        let mut client = client(vec![wrongtype()], ClientOptions::default());
        let cmd = client.create_command("GET", ["list"]).unwrap();
        let err = client.execute(&cmd).unwrap_err();
        assert_eq!(
            err.server_error().map(|e| e.message()),
            Some("WRONGTYPE Operation against a key holding the wrong kind of value")
        );
        // Server errors leave the connection alone.
        assert!(client.is_connected());
    }

    #[test]
    fn error_replies_can_be_returned() {
        let options = ClientOptions {
            exceptions: false,
            ..Default::default()
        };
        let mut client = client(vec![wrongtype()], options);
        let cmd = client.create_command("GET", ["list"]).unwrap();
        let value = client.execute(&cmd).unwrap();
        assert_eq!(value.as_error().and_then(|e| e.category()), Some("WRONGTYPE"));
    }

    #[test]
    fn replies_go_through_command_parser() {
        let mut client = client(vec![Reply::Integer(1), Reply::Integer(0)], ClientOptions::default());
        assert!(client.exists("foo").unwrap());
        assert!(!client.exists("bar").unwrap());
    }

    #[test]
    fn unknown_commands_fail_before_io() {
        let mut client = client(Vec::new(), ClientOptions::default());
        assert!(matches!(
            client.call("NOPE", Vec::<Bytes>::new()),
            Err(ClientError::UnknownCommand(_))
        ));
        assert!(client.connection().executed.is_empty());
    }

    #[test]
    fn prefix_applies_to_keys() {
        let options = ClientOptions {
            prefix: Some("app:".to_string()),
            ..Default::default()
        };
        let mut client = client(vec![Reply::Status("OK".into())], options);
        client.set("user", "ada").unwrap();
        assert_eq!(client.connection().executed, vec!["SET app:user ada".to_string()]);
    }

    #[test]
    fn noscript_falls_back_to_eval() {
        let replies = vec![
            Reply::Error(ErrorReply::new("NOSCRIPT No matching script. Please use EVAL.")),
            Reply::Integer(7),
        ];
        let mut client = client(replies, ClientOptions::default());
        let script = Script::new("return 7", "deadbeef");

        let value = client.eval_script(&script, &["k"], &["a"]).unwrap();
        assert_eq!(value, Value::Int(7));
        assert_eq!(
            client.connection().executed,
            vec!["EVALSHA deadbeef 1 k a".to_string(), "EVAL return 7 1 k a".to_string()]
        );
    }

    #[test]
    fn noscript_without_body_is_a_plain_error() {
        let replies = vec![Reply::Error(ErrorReply::new("NOSCRIPT No matching script."))];
        let mut client = client(replies, ClientOptions::default());
        let cmd = client.create_command("EVALSHA", ["deadbeef", "0"]).unwrap();
        let err = client.execute(&cmd).unwrap_err();
        assert_eq!(err.server_error().and_then(|e| e.category()), Some("NOSCRIPT"));
        assert_eq!(client.connection().executed.len(), 1);
    }

    #[test]
    fn load_script_returns_digest() {
        let replies = vec![Reply::Bulk(Bytes::from_static(b"e0e1f9fabfc9d4800c877a703b823ac0578ff8db"))];
        let mut client = client(replies, ClientOptions::default());
        let script = client.load_script("return 1").unwrap();
        assert_eq!(script.sha(), "e0e1f9fabfc9d4800c877a703b823ac0578ff8db");
        assert_eq!(script.body(), &Bytes::from_static(b"return 1"));
        assert_eq!(client.connection().executed, vec!["SCRIPT LOAD return 1".to_string()]);
    }

    #[test]
    fn connection_loss_propagates_by_default() {
        let mut client = client(vec![Reply::Bulk(Bytes::from_static(b"v"))], ClientOptions::default());
        client.connection_mut().fail_writes = 1;

        let err = client.get("k").unwrap_err();
        assert!(matches!(err, ClientError::Communication { .. }));
        assert!(!client.is_connected());

        // Next call reconnects.
        assert_eq!(client.get("k").unwrap(), Some(Bytes::from_static(b"v")));
        assert_eq!(client.connection().connects, 2);
    }

    #[test]
    fn connection_loss_retries_when_enabled() {
        let options = ClientOptions {
            retry_on_connection_loss: true,
            ..Default::default()
        };
        let mut client = client(vec![Reply::Bulk(Bytes::from_static(b"v"))], options);
        client.connection_mut().fail_writes = 1;
        assert_eq!(client.get("k").unwrap(), Some(Bytes::from_static(b"v")));
        assert_eq!(client.connection().executed, vec!["GET k".to_string()]);
    }

    #[test]
    fn typed_helpers_decode_replies() {
        let replies = vec![
            Reply::Status("PONG".into()),
            Reply::Nil,
            Reply::Integer(2),
            Reply::Integer(-1),
            Reply::Integer(30),
            Reply::Array(vec![Reply::Bulk(Bytes::from_static(b"1")), Reply::Nil]),
            Reply::Array(vec![
                Reply::Bulk(Bytes::from_static(b"name")),
                Reply::Bulk(Bytes::from_static(b"ada")),
            ]),
            Reply::Integer(42),
        ];
        let mut client = client(replies, ClientOptions::default());

        assert_eq!(client.ping().unwrap(), "PONG");
        assert_eq!(client.get("missing").unwrap(), None);
        assert_eq!(client.del(&["a", "b"]).unwrap(), 2);
        assert_eq!(client.ttl("a").unwrap(), ClientTtl::NoExpiry);
        assert_eq!(client.ttl("b").unwrap(), ClientTtl::ExpiresIn(Duration::from_secs(30)));
        assert_eq!(client.mget(&["a", "b"]).unwrap(), vec![Some(Bytes::from_static(b"1")), None]);
        assert_eq!(
            client.hgetall("h").unwrap(),
            vec![(Bytes::from_static(b"name"), Bytes::from_static(b"ada"))]
        );
        assert_eq!(client.dbsize().unwrap(), 42);
    }

    #[test]
    fn typed_helpers_raise_server_errors_even_when_returning() {
        let options = ClientOptions {
            exceptions: false,
            ..Default::default()
        };
        let mut client = client(vec![wrongtype()], options);
        assert!(matches!(client.incr("list"), Err(ClientError::Server(_))));
    }

    #[test]
    fn execute_on_requires_an_aggregate() {
        let mut client = client(Vec::new(), ClientOptions::default());
        let cmd = client.create_command::<_, Bytes>("PING", []).unwrap();
        assert!(matches!(
            client.execute_on("master", &cmd),
            Err(ClientError::NotSupported(_))
        ));
    }

    #[test]
    fn replicated_client_splits_reads_and_writes() {
        let mut replication = ReplicationConnection::new();
        replication.add(MockConnection::aliased("master", 6379));
        replication.add(MockConnection::aliased("slave", 6380));
        let mut client = Client::from_connection(replication, ClientOptions::default());

        client.get("k").unwrap_or_default();
        client.set("k", "v").unwrap();
        client.get("k").unwrap_or_default();

        let conn = client.connection();
        assert_eq!(conn.slaves()[0].executed, vec!["GET k".to_string()]);
        assert_eq!(
            conn.master().unwrap().executed,
            vec!["SET k v".to_string(), "GET k".to_string()]
        );
    }

    #[test]
    fn define_command_extends_catalogue() {
        let mut client = client(vec![Reply::Integer(3)], ClientOptions::default());
        client.define_command(CommandSpec::new(
            "counter.get",
            crate::command::KeyStrategy::First,
            crate::command::Access::Read,
        ));
        assert_eq!(client.call("COUNTER.GET", ["c"]).unwrap(), Value::Int(3));
    }
}
