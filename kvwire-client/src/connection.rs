//! # Connections
//!
//! Purpose: Own the transport to one server and expose the write/read round
//! trip that the aggregates and the client dispatch through.
//!
//! ## Design Principles
//! 1. **Trait Seam**: `Connection` is what the client talks to; single
//!    connections and aggregates both implement it.
//! 2. **Lazy Transport**: Any I/O opens the socket first when disconnected.
//! 3. **Reset on Failure**: Transport and framing errors drop the socket
//!    before propagating, so the next call reconnects cleanly.
//! 4. **Cache-Friendly Buffers**: Each connection reuses its own encode and
//!    line buffers across calls.

use std::io::{self, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use tracing::{debug, trace, warn};

use kvwire_common::{encode_command, read_reply, ClientError, ClientResult, Reply};

use crate::command::Command;
use crate::parameters::{ConnectionParameters, Scheme};

/// Anything that can carry a command to a server and bring its reply back.
pub trait Connection {
    /// Opens the transport(s). Fails when already connected.
    fn connect(&mut self) -> ClientResult<()>;

    /// Releases the transport(s). Safe to call repeatedly.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    fn write_command(&mut self, command: &Command) -> ClientResult<()>;

    fn read_response(&mut self, command: &Command) -> ClientResult<Reply>;

    /// Writes `command` and reads its raw reply.
    fn execute_command(&mut self, command: &Command) -> ClientResult<Reply> {
        self.write_command(command)?;
        self.read_response(command)
    }

    /// Runs `command` on the member named `id`, bypassing routing.
    fn execute_on(&mut self, id: &str, _command: &Command) -> ClientResult<Reply> {
        Err(ClientError::NotSupported(format!(
            "cannot address connection '{id}' on a single connection"
        )))
    }
}

/// A connection to exactly one server endpoint.
pub trait SingleConnection: Connection {
    fn parameters(&self) -> &ConnectionParameters;

    /// Display identity, `tcp://host:port` or `unix://path`.
    fn identity(&self) -> &str;

    /// Queues a command run after every successful `connect()`.
    fn push_init_command(&mut self, command: Command);

    /// Reads one raw reply from the transport.
    fn read(&mut self) -> ClientResult<Reply>;

    /// Id inside aggregates: the alias when configured, else the identity.
    fn node_id(&self) -> String {
        self.parameters().node_id()
    }
}

#[derive(Debug)]
enum Transport {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Transport::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Transport::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Transport::Unix(stream) => stream.flush(),
        }
    }
}

/// Blocking TCP or Unix socket connection with reusable buffers.
#[derive(Debug)]
pub struct StreamConnection {
    parameters: ConnectionParameters,
    identity: String,
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: Option<BufReader<Transport>>,
    init_commands: Vec<Command>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl StreamConnection {
    /// Creates a disconnected connection; the socket opens on first use.
    pub fn new(parameters: ConnectionParameters) -> Self {
        let identity = parameters.identity();
        StreamConnection {
            parameters,
            identity,
            reader: None,
            init_commands: Vec::new(),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
        }
    }

    /// Commands queued for execution after connect.
    pub fn init_commands(&self) -> &[Command] {
        &self.init_commands
    }

    fn ensure_connected(&mut self) -> ClientResult<()> {
        if self.reader.is_none() {
            self.connect()?;
        }
        Ok(())
    }

    fn not_connected(&self) -> ClientError {
        ClientError::Communication {
            connection: self.identity.clone(),
            message: "connection is not open".to_string(),
            code: None,
            source: None,
        }
    }

    /// Drops the transport when `err` leaves the stream unusable.
    fn reset(&mut self, err: ClientError) -> ClientError {
        if err.should_reset_connection() {
            warn!(connection = %self.identity, error = %err, "resetting connection");
            self.disconnect();
        }
        err
    }

    fn open(&self) -> ClientResult<Transport> {
        match self.parameters.scheme {
            Scheme::Tcp => self.open_tcp(),
            Scheme::Unix => self.open_unix(),
        }
    }

    fn open_tcp(&self) -> ClientResult<Transport> {
        let params = &self.parameters;
        let addrs = (params.host.as_str(), params.port)
            .to_socket_addrs()
            .map_err(|err| self.communication(err))?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = match params.timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    stream
                        .set_read_timeout(params.read_write_timeout)
                        .and_then(|_| stream.set_write_timeout(params.read_write_timeout))
                        .and_then(|_| stream.set_nodelay(params.tcp_nodelay))
                        .map_err(|err| self.communication(err))?;
                    return Ok(Transport::Tcp(stream));
                }
                Err(err) => last_err = Some(err),
            }
        }

        let err = last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "host did not resolve to any address")
        });
        Err(self.communication(err))
    }

    #[cfg(unix)]
    fn open_unix(&self) -> ClientResult<Transport> {
        let path = self.parameters.path.as_deref().unwrap_or_default();
        let stream = UnixStream::connect(path).map_err(|err| self.communication(err))?;
        stream
            .set_read_timeout(self.parameters.read_write_timeout)
            .and_then(|_| stream.set_write_timeout(self.parameters.read_write_timeout))
            .map_err(|err| self.communication(err))?;
        Ok(Transport::Unix(stream))
    }

    #[cfg(not(unix))]
    fn open_unix(&self) -> ClientResult<Transport> {
        Err(ClientError::NotSupported(
            "unix domain sockets are not available on this platform".to_string(),
        ))
    }

    fn communication(&self, err: io::Error) -> ClientError {
        let message = err.to_string();
        ClientError::communication(self.identity.clone(), message, err)
    }

    fn run_init_commands(&mut self) -> ClientResult<()> {
        let commands = std::mem::take(&mut self.init_commands);
        let result = commands.iter().try_for_each(|command| {
            trace!(connection = %self.identity, command = %command, "init command");
            match self.execute_command(command)? {
                Reply::Error(err) => Err(ClientError::Server(err)),
                _ => Ok(()),
            }
        });
        self.init_commands = commands;
        result
    }
}

impl Connection for StreamConnection {
    fn connect(&mut self) -> ClientResult<()> {
        if self.reader.is_some() {
            return Err(ClientError::AlreadyConnected(self.identity.clone()));
        }

        let transport = self.open()?;
        self.reader = Some(BufReader::new(transport));
        debug!(connection = %self.identity, "connected");

        if let Err(err) = self.run_init_commands() {
            self.disconnect();
            return Err(err);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.reader.take().is_some() {
            debug!(connection = %self.identity, "disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    fn write_command(&mut self, command: &Command) -> ClientResult<()> {
        self.ensure_connected()?;

        self.write_buf.clear();
        encode_command(command.id().as_bytes(), command.arguments(), &mut self.write_buf);

        let result = match self.reader.as_mut() {
            Some(reader) => {
                let stream = reader.get_mut();
                stream.write_all(&self.write_buf).and_then(|_| stream.flush())
            }
            None => return Err(self.not_connected()),
        };

        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                let err = ClientError::communication(
                    self.identity.clone(),
                    "Error while writing bytes to the server",
                    err,
                );
                Err(self.reset(err))
            }
        }
    }

    fn read_response(&mut self, _command: &Command) -> ClientResult<Reply> {
        self.read()
    }
}

impl SingleConnection for StreamConnection {
    fn parameters(&self) -> &ConnectionParameters {
        &self.parameters
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn push_init_command(&mut self, command: Command) {
        self.init_commands.push(command);
    }

    fn read(&mut self) -> ClientResult<Reply> {
        self.ensure_connected()?;

        let result = match self.reader.as_mut() {
            Some(reader) => read_reply(reader, &mut self.line_buf),
            None => return Err(self.not_connected()),
        };

        match result {
            Ok(reply) => Ok(reply),
            Err(err) => {
                let err = ClientError::decode(self.identity.clone(), err);
                Err(self.reset(err))
            }
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}


#[cfg(test)]
mod tests {
    use std::io::BufRead;
    use std::net::TcpListener;
    use std::thread;

    use bytes::Bytes;
    use kvwire_common::read_request;

    use super::*;
    use crate::profile::ServerProfile;

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn reply_once(response: &'static [u8]) -> (u16, thread::JoinHandle<Vec<Bytes>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = std::io::BufReader::new(stream.try_clone().unwrap());
            let mut line = Vec::new();
            let (id, mut args) = read_request(&mut reader, &mut line).unwrap();
            let mut writer = stream;
            writer.write_all(response).unwrap();
            args.insert(0, id);
            // Wait for the client to hang up.
            let _ = reader.fill_buf();
            args
        });
        (port, handle)
    }

    #[test]
    fn identity_follows_parameters() {
        let conn = StreamConnection::new(ConnectionParameters::tcp("10.0.0.1", 6380));
        assert_eq!(conn.identity(), "tcp://10.0.0.1:6380");
        assert!(!conn.is_connected());

        let conn = StreamConnection::new(ConnectionParameters::unix("/tmp/kv.sock"));
        assert_eq!(conn.identity(), "unix:///tmp/kv.sock");
    }

    #[test]
    fn failed_connect_stays_disconnected() {
        let mut conn = StreamConnection::new(ConnectionParameters::tcp("127.0.0.1", closed_port()));
        let err = conn.connect().unwrap_err();
        assert!(matches!(err, ClientError::Communication { .. }));
        assert!(err.to_string().ends_with(&format!("[{}]", conn.identity())));
        assert!(!conn.is_connected());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut conn = StreamConnection::new(ConnectionParameters::tcp("127.0.0.1", 1));
        conn.disconnect();
        conn.disconnect();
        assert!(!conn.is_connected());
    }

    #[test]
    fn execute_connects_lazily_and_rejects_double_connect() {
        let (port, server) = reply_once(b"$3\r\nbar\r\n");
        let profile = ServerProfile::default();
        let mut conn = StreamConnection::new(ConnectionParameters::tcp("127.0.0.1", port));

        let cmd = profile.create_command("GET", ["foo"]).unwrap();
        let reply = conn.execute_command(&cmd).unwrap();
        assert_eq!(reply, Reply::Bulk(Bytes::from_static(b"bar")));
        assert!(conn.is_connected());
        assert!(matches!(conn.connect(), Err(ClientError::AlreadyConnected(_))));

        conn.disconnect();
        let received = server.join().unwrap();
        assert_eq!(received, vec![Bytes::from_static(b"GET"), Bytes::from_static(b"foo")]);
    }

    #[test]
    fn malformed_reply_resets_connection() {
        let (port, server) = reply_once(b"?oops\r\n");
        let profile = ServerProfile::default();
        let mut conn = StreamConnection::new(ConnectionParameters::tcp("127.0.0.1", port));

        let cmd = profile.create_command("PING", Vec::<Bytes>::new()).unwrap();
        let err = conn.execute_command(&cmd).unwrap_err();
        assert!(matches!(err, ClientError::Protocol { .. }));
        assert!(err.to_string().contains("unknown prefix: '?'"));
        assert!(!conn.is_connected());
        server.join().unwrap();
    }
}
