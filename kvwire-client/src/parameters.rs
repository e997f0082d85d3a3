//! # Connection Parameters
//!
//! Purpose: Describe one server endpoint as an immutable value object that
//! can be built from a URI (`tcp://host:port/?alias=master`) or from a
//! structured map through serde.
//!
//! ## Design Principles
//! 1. **Explicit Defaults**: `ConnectionParameters::default()` replaces shared
//!    mutable default tables; every connection gets its own copy.
//! 2. **Normalize Once**: Float seconds become `Duration`s at parse time and
//!    non-positive timeouts become `None` (wait indefinitely).
//! 3. **Lenient Input**: URI query values are text and map values may be
//!    numbers, strings or booleans; both go through the same conversion.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use kvwire_common::{ClientError, ClientResult};

/// Default TCP port of the server.
pub const DEFAULT_PORT: u16 = 6379;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: f64 = 5.0;

/// Transport used to reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Tcp,
    Unix,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Tcp => "tcp",
            Scheme::Unix => "unix",
        }
    }
}

impl FromStr for Scheme {
    type Err = ClientError;

    fn from_str(value: &str) -> ClientResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "tcp" | "redis" => Ok(Scheme::Tcp),
            "unix" => Ok(Scheme::Unix),
            other => Err(ClientError::InvalidParameters(format!("unsupported scheme '{other}'"))),
        }
    }
}

/// Parameters for a single server connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawParameters")]
pub struct ConnectionParameters {
    /// Transport scheme.
    pub scheme: Scheme,
    /// Host name or IP address (TCP only).
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Socket path (Unix only).
    pub path: Option<String>,
    /// Connect timeout; `None` leaves it to the OS.
    pub timeout: Option<Duration>,
    /// Read/write timeout; `None` waits indefinitely.
    pub read_write_timeout: Option<Duration>,
    /// Accepted for compatibility; connects are always blocking.
    pub async_connect: bool,
    /// Accepted for compatibility; sockets are released with their owner.
    pub persistent: bool,
    /// Disable Nagle's algorithm on TCP sockets.
    pub tcp_nodelay: bool,
    /// Database selected right after connecting.
    pub database: Option<u32>,
    /// Password sent with AUTH right after connecting.
    pub password: Option<String>,
    /// Node alias inside aggregate connections (`master` marks the master).
    pub alias: Option<String>,
    /// Relative weight on the cluster hash ring.
    pub weight: Option<u32>,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        ConnectionParameters {
            scheme: Scheme::Tcp,
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            path: None,
            timeout: seconds("timeout", DEFAULT_CONNECT_TIMEOUT_SECS).expect("default connect timeout is valid"),
            read_write_timeout: None,
            async_connect: false,
            persistent: false,
            tcp_nodelay: true,
            database: None,
            password: None,
            alias: None,
            weight: None,
        }
    }
}

impl ConnectionParameters {
    /// TCP parameters for `host:port` with defaults for everything else.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        ConnectionParameters {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Unix socket parameters for `path`.
    pub fn unix(path: impl Into<String>) -> Self {
        ConnectionParameters {
            scheme: Scheme::Unix,
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Returns a copy carrying `alias`.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Returns a copy carrying `weight`.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Stable display identity: `tcp://host:port` or `unix://path`.
    pub fn identity(&self) -> String {
        match self.scheme {
            Scheme::Tcp if self.host.contains(':') => format!("tcp://[{}]:{}", self.host, self.port),
            Scheme::Tcp => format!("tcp://{}:{}", self.host, self.port),
            Scheme::Unix => format!("unix://{}", self.path.as_deref().unwrap_or_default()),
        }
    }

    /// Id used inside aggregate connections: the alias when set, else the identity.
    pub fn node_id(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.identity(),
        }
    }

    fn validate(self) -> ClientResult<Self> {
        match self.scheme {
            Scheme::Unix if self.path.as_deref().map_or(true, str::is_empty) => Err(
                ClientError::InvalidParameters("unix connections require a socket path".to_string()),
            ),
            Scheme::Tcp if self.host.is_empty() => Err(ClientError::InvalidParameters(
                "tcp connections require a host".to_string(),
            )),
            _ => Ok(self),
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let defaults = ConnectionParameters::default();
        let mut pairs = Vec::new();
        if self.timeout != defaults.timeout {
            pairs.push(("timeout", format_seconds(self.timeout)));
        }
        if let Some(timeout) = self.read_write_timeout {
            pairs.push(("read_write_timeout", format_seconds(Some(timeout))));
        }
        if self.async_connect {
            pairs.push(("async_connect", "1".to_string()));
        }
        if self.persistent {
            pairs.push(("persistent", "1".to_string()));
        }
        if !self.tcp_nodelay {
            pairs.push(("tcp_nodelay", "0".to_string()));
        }
        if let Some(database) = self.database {
            pairs.push(("database", database.to_string()));
        }
        if let Some(alias) = &self.alias {
            pairs.push(("alias", alias.clone()));
        }
        if let Some(weight) = self.weight {
            pairs.push(("weight", weight.to_string()));
        }
        pairs
    }
}

/// Full URI including every non-default option except the password.
impl fmt::Display for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())?;
        let pairs = self.query_pairs();
        if pairs.is_empty() {
            return Ok(());
        }
        f.write_str(if self.scheme == Scheme::Tcp { "/?" } else { "?" })?;
        for (idx, (key, value)) in pairs.iter().enumerate() {
            if idx > 0 {
                f.write_str("&")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for ConnectionParameters {
    type Err = ClientError;

    /// Parses `tcp://host:port[/?opt=val&...]` or `unix:///path[?opt=val]`.
    fn from_str(uri: &str) -> ClientResult<Self> {
        let invalid = || ClientError::InvalidParameters(format!("invalid URI: {uri}"));
        let (scheme, rest) = uri.split_once("://").ok_or_else(invalid)?;
        let scheme: Scheme = scheme.parse()?;

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };

        let mut raw = RawParameters {
            scheme: Some(scheme),
            ..Default::default()
        };

        match scheme {
            Scheme::Unix => {
                // unix:///tmp/kv.sock and unix://localhost/tmp/kv.sock are both accepted.
                let path = match location.find('/') {
                    Some(idx) => &location[idx..],
                    None => return Err(invalid()),
                };
                raw.path = Some(Flex::Text(path.to_string()));
            }
            Scheme::Tcp => {
                let authority = location.split('/').next().unwrap_or_default();
                let authority = match authority.rsplit_once('@') {
                    Some((userinfo, host)) => {
                        let password = userinfo.split_once(':').map_or(userinfo, |(_, pass)| pass);
                        if !password.is_empty() {
                            raw.password = Some(Flex::Text(password.to_string()));
                        }
                        host
                    }
                    None => authority,
                };
                let (host, port) = split_host_port(authority).ok_or_else(invalid)?;
                if host.is_empty() {
                    return Err(invalid());
                }
                raw.host = Some(Flex::Text(host.to_string()));
                if let Some(port) = port {
                    raw.port = Some(Flex::Text(port.to_string()));
                }
            }
        }

        if let Some(query) = query {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                raw.set(key, Flex::Text(value.to_string()));
            }
        }

        ConnectionParameters::try_from(raw)
    }
}

fn split_host_port(authority: &str) -> Option<(&str, Option<&str>)> {
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        return match tail.strip_prefix(':') {
            Some(port) => Some((host, Some(port))),
            None if tail.is_empty() => Some((host, None)),
            None => None,
        };
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => Some((host, Some(port))),
        None => Some((authority, None)),
    }
}

/// Untyped scalar accepted from URIs and configuration maps.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Flex {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Flex {
    fn into_string(self) -> String {
        match self {
            Flex::Bool(value) => value.to_string(),
            Flex::Int(value) => value.to_string(),
            Flex::Float(value) => value.to_string(),
            Flex::Text(value) => value,
        }
    }

    fn to_f64(&self, name: &str) -> ClientResult<f64> {
        match self {
            Flex::Int(value) => Ok(*value as f64),
            Flex::Float(value) => Ok(*value),
            Flex::Text(value) => value.trim().parse().map_err(|_| bad_value(name, value)),
            Flex::Bool(value) => Err(bad_value(name, &value.to_string())),
        }
    }

    fn to_u64(&self, name: &str) -> ClientResult<u64> {
        match self {
            Flex::Int(value) if *value >= 0 => Ok(*value as u64),
            Flex::Text(value) => value.trim().parse().map_err(|_| bad_value(name, value)),
            other => Err(bad_value(name, &other.clone().into_string())),
        }
    }

    fn to_bool(&self, name: &str) -> ClientResult<bool> {
        match self {
            Flex::Bool(value) => Ok(*value),
            Flex::Int(value) => Ok(*value != 0),
            Flex::Float(value) => Ok(*value != 0.0),
            Flex::Text(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "" | "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(bad_value(name, value)),
            },
        }
    }
}

fn bad_value(name: &str, value: &str) -> ClientError {
    ClientError::InvalidParameters(format!("invalid value '{value}' for '{name}'"))
}

/// Loosely typed parameters as found in URIs and configuration files.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawParameters {
    scheme: Option<Scheme>,
    host: Option<Flex>,
    port: Option<Flex>,
    path: Option<Flex>,
    #[serde(alias = "connection_timeout")]
    timeout: Option<Flex>,
    read_write_timeout: Option<Flex>,
    #[serde(alias = "connection_async")]
    async_connect: Option<Flex>,
    #[serde(alias = "connection_persistent")]
    persistent: Option<Flex>,
    tcp_nodelay: Option<Flex>,
    database: Option<Flex>,
    password: Option<Flex>,
    alias: Option<Flex>,
    weight: Option<Flex>,
}

impl RawParameters {
    fn set(&mut self, key: &str, value: Flex) {
        let slot = match key {
            "host" => &mut self.host,
            "port" => &mut self.port,
            "path" => &mut self.path,
            "timeout" | "connection_timeout" => &mut self.timeout,
            "read_write_timeout" => &mut self.read_write_timeout,
            "async_connect" | "connection_async" => &mut self.async_connect,
            "persistent" | "connection_persistent" => &mut self.persistent,
            "tcp_nodelay" => &mut self.tcp_nodelay,
            "database" => &mut self.database,
            "password" => &mut self.password,
            "alias" => &mut self.alias,
            "weight" => &mut self.weight,
            other => {
                tracing::debug!(parameter = other, "ignoring unknown connection parameter");
                return;
            }
        };
        *slot = Some(value);
    }
}

impl TryFrom<RawParameters> for ConnectionParameters {
    type Error = ClientError;

    fn try_from(raw: RawParameters) -> ClientResult<Self> {
        let mut params = ConnectionParameters::default();
        if let Some(scheme) = raw.scheme {
            params.scheme = scheme;
        }
        if let Some(host) = raw.host {
            params.host = host.into_string();
        }
        if let Some(port) = raw.port {
            let port = port.to_u64("port")?;
            params.port = u16::try_from(port).map_err(|_| bad_value("port", &port.to_string()))?;
        }
        if let Some(path) = raw.path {
            params.path = Some(path.into_string());
        }
        if let Some(timeout) = raw.timeout {
            params.timeout = seconds("timeout", timeout.to_f64("timeout")?)?;
        }
        if let Some(timeout) = raw.read_write_timeout {
            params.read_write_timeout = seconds("read_write_timeout", timeout.to_f64("read_write_timeout")?)?;
        }
        if let Some(flag) = raw.async_connect {
            params.async_connect = flag.to_bool("async_connect")?;
        }
        if let Some(flag) = raw.persistent {
            params.persistent = flag.to_bool("persistent")?;
        }
        if let Some(flag) = raw.tcp_nodelay {
            params.tcp_nodelay = flag.to_bool("tcp_nodelay")?;
        }
        if let Some(database) = raw.database {
            let database = database.to_u64("database")?;
            params.database =
                Some(u32::try_from(database).map_err(|_| bad_value("database", &database.to_string()))?);
        }
        params.password = raw.password.map(Flex::into_string).filter(|p| !p.is_empty());
        params.alias = raw.alias.map(Flex::into_string).filter(|a| !a.is_empty());
        if let Some(weight) = raw.weight {
            let weight = weight.to_u64("weight")?;
            params.weight = Some(u32::try_from(weight).map_err(|_| bad_value("weight", &weight.to_string()))?);
        }
        params.validate()
    }
}

/// Converts float seconds to a timeout; non-positive means "no timeout".
fn seconds(name: &str, value: f64) -> ClientResult<Option<Duration>> {
    if value.is_finite() && value > 0.0 {
        Duration::try_from_secs_f64(value)
            .map(Some)
            .map_err(|_| bad_value(name, &value.to_string()))
    } else {
        Ok(None)
    }
}

fn format_seconds(value: Option<Duration>) -> String {
    match value {
        Some(duration) => duration.as_secs_f64().to_string(),
        None => "0".to_string(),
    }
}
